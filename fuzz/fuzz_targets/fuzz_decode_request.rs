#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = canary_core::decode_request(data) {
        let bytes = canary_core::encode_request(&request).expect("decoded request must encode");
        let again = canary_core::decode_request(&bytes).expect("encoded request must decode");
        assert_eq!(again, request);
    }
});
