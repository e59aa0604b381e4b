#![no_main]
use libfuzzer_sys::fuzz_target;

use canary_core::schema::PayloadKind;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = canary_core::schema::check(&value, "fuzz.json", PayloadKind::Request, true);
        let _ = canary_core::schema::check(&value, "fuzz.json", PayloadKind::Response, true);
    }
});
