#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Opening garbage must fail cleanly, never panic
    let _ = geolocate::Database::from_bytes(data.to_vec());
});
