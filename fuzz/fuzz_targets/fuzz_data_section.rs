#![no_main]
use geolocate::{DataDecoder, PathElement};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First two bytes pick the start offset, the rest is the data section
    let offset = u16::from_be_bytes([data[0], data[1]]) as u32;
    let decoder = DataDecoder::new(&data[2..]);

    let _ = decoder.decode(offset);
    let _ = decoder.decode_shallow(offset);
    let _ = decoder.decode_path(
        offset,
        &[PathElement::Key("location"), PathElement::Key("latitude")],
    );
    let _ = decoder.decode_path(offset, &[PathElement::Index(0), PathElement::Index(1)]);
});
