#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = canary_core::decode_response(data) {
        // Whatever decodes must encode again, unless a percentage is non-finite.
        let _ = canary_core::encode_response(&response);
    }
});
