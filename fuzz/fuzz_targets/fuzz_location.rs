#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    // Treat the input as a database file and probe it with a spread of
    // addresses: lookups on a damaged tree must return errors, not panic
    let db = match geolocate::Database::from_bytes(data.to_vec()) {
        Ok(db) => db,
        Err(_) => return,
    };

    let probes = [
        IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
        IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255)),
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
        IpAddr::V6(Ipv6Addr::new(0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff)),
    ];

    for addr in probes {
        let _ = db.location_ip(addr);
        let _ = db.lookup_record(addr);
    }
});
