//! Fixture writer for integration tests and benchmarks
//!
//! Produces small but structurally valid MMDB files: a binary search tree
//! with 24, 28 or 32-bit records, the 16-byte separator, a data section
//! encoded with the MMDB wire rules and a trailing metadata map.

#![allow(dead_code)]

use geolocate::DataValue;
use std::collections::HashMap;
use std::io::Write;
use std::net::IpAddr;
use tempfile::NamedTempFile;

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Encode one value into `out` using the MMDB data section encoding.
///
/// `DataValue::Pointer(offset)` is written as a pointer, which lets tests
/// build records that share data.
pub fn encode_value(value: &DataValue, out: &mut Vec<u8>) {
    match value {
        DataValue::Pointer(offset) => encode_pointer(*offset, out),
        DataValue::String(s) => {
            write_control(2, s.len(), out);
            out.extend_from_slice(s.as_bytes());
        }
        DataValue::Double(d) => {
            write_control(3, 8, out);
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => {
            write_control(4, b.len(), out);
            out.extend_from_slice(b);
        }
        DataValue::Uint16(n) => write_uint(5, *n as u128, out),
        DataValue::Uint32(n) => write_uint(6, *n as u128, out),
        DataValue::Map(entries) => {
            write_control(7, entries.len(), out);
            for (key, value) in entries {
                encode_value(&DataValue::String(key.clone()), out);
                encode_value(value, out);
            }
        }
        DataValue::Int32(n) => {
            if *n >= 0 {
                write_uint(8, *n as u128, out);
            } else {
                write_control(8, 4, out);
                out.extend_from_slice(&n.to_be_bytes());
            }
        }
        DataValue::Uint64(n) => write_uint(9, *n as u128, out),
        DataValue::Uint128(n) => write_uint(10, *n, out),
        DataValue::Array(items) => {
            write_control(11, items.len(), out);
            for item in items {
                encode_value(item, out);
            }
        }
        DataValue::Bool(b) => write_control(14, *b as usize, out),
        DataValue::Float(f) => {
            write_control(15, 4, out);
            out.extend_from_slice(&f.to_be_bytes());
        }
    }
}

fn write_uint(type_code: u8, value: u128, out: &mut Vec<u8>) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    write_control(type_code, bytes.len() - skip, out);
    out.extend_from_slice(&bytes[skip..]);
}

fn write_control(type_code: u8, size: usize, out: &mut Vec<u8>) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_code <= 7 {
        out.push((type_code << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_code - 7);
    }
    out.extend_from_slice(&extra);
}

fn encode_pointer(offset: u32, out: &mut Vec<u8>) {
    if offset < 2048 {
        out.push(0x20 | (offset >> 8) as u8);
        out.push(offset as u8);
    } else if offset < 2048 + (1 << 19) {
        let v = offset - 2048;
        out.push(0x28 | (v >> 16) as u8);
        out.extend_from_slice(&(v as u16).to_be_bytes());
    } else if offset < 526_336 + (1 << 27) {
        let v = offset - 526_336;
        out.push(0x30 | (v >> 24) as u8);
        out.extend_from_slice(&v.to_be_bytes()[1..]);
    } else {
        out.push(0x38);
        out.extend_from_slice(&offset.to_be_bytes());
    }
}

/// Build a map value from string keys, keeping the given order
pub fn map(entries: Vec<(&str, DataValue)>) -> DataValue {
    DataValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

/// `{"location": {"latitude": lat, "longitude": lon}}`
pub fn location(latitude: f64, longitude: f64) -> DataValue {
    map(vec![(
        "location",
        map(vec![
            ("latitude", DataValue::Double(latitude)),
            ("longitude", DataValue::Double(longitude)),
        ]),
    )])
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Empty,
    Node(u32),
    Data(u32),
}

/// Builder for in-memory MMDB files
pub struct FixtureBuilder {
    ip_version: u16,
    record_size: u16,
    major_version: u16,
    minor_version: u16,
    database_type: String,
    nodes: Vec<[Slot; 2]>,
    data: Vec<u8>,
    dedup: HashMap<Vec<u8>, u32>,
}

impl FixtureBuilder {
    /// New builder for an IPv4 (`4`) or IPv6 (`6`) tree
    pub fn new(ip_version: u16, record_size: u16) -> Self {
        Self {
            ip_version,
            record_size,
            major_version: 2,
            minor_version: 0,
            database_type: "Geolocate-Test".to_string(),
            nodes: vec![[Slot::Empty; 2]],
            data: Vec::new(),
            dedup: HashMap::new(),
        }
    }

    pub fn database_type(mut self, database_type: &str) -> Self {
        self.database_type = database_type.to_string();
        self
    }

    pub fn format_version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Append a value to the data section, returning its offset.
    /// Identical encodings share one offset.
    pub fn add_value(&mut self, value: &DataValue) -> u32 {
        let mut encoded = Vec::new();
        encode_value(value, &mut encoded);
        if let Some(&offset) = self.dedup.get(&encoded) {
            return offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(&encoded);
        self.dedup.insert(encoded, offset);
        offset
    }

    /// Map a CIDR network (e.g. `"1.2.3.0/24"`) to a record.
    ///
    /// In an IPv6 tree IPv4 networks are stored under `::/96`. Networks
    /// must be inserted from least to most specific when they overlap.
    pub fn insert(&mut self, cidr: &str, value: &DataValue) -> &mut Self {
        let offset = self.add_value(value);
        self.insert_offset(cidr, offset)
    }

    /// Map a CIDR network to an already stored data section offset
    pub fn insert_offset(&mut self, cidr: &str, offset: u32) -> &mut Self {
        let (addr, prefix) = cidr.split_once('/').expect("cidr must contain '/'");
        let addr: IpAddr = addr.parse().expect("valid network address");
        let prefix: u8 = prefix.parse().expect("valid prefix length");

        let (bits, prefix, width) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), 4) => (u32::from(v4) as u128, prefix, 32u8),
            (IpAddr::V4(v4), _) => (u32::from(v4) as u128, prefix + 96, 128),
            (IpAddr::V6(_), 4) => panic!("IPv6 network in an IPv4 fixture"),
            (IpAddr::V6(v6), _) => (u128::from(v6), prefix, 128),
        };
        assert!(prefix >= 1, "prefix must be at least 1");

        let mut node = 0usize;
        for depth in 0..prefix {
            let bit = ((bits >> (width - 1 - depth)) & 1) as usize;
            if depth == prefix - 1 {
                self.nodes[node][bit] = Slot::Data(offset);
                break;
            }
            node = match self.nodes[node][bit] {
                Slot::Node(next) => next as usize,
                other => {
                    // Split an existing record (or empty slot) into a subtree
                    let fill = if let Slot::Data(_) = other { other } else { Slot::Empty };
                    self.nodes.push([fill, fill]);
                    let next = self.nodes.len() - 1;
                    self.nodes[node][bit] = Slot::Node(next as u32);
                    next
                }
            };
        }
        self
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Serialize the whole file
    pub fn build(&self) -> Vec<u8> {
        let node_count = self.node_count();
        let record_value = |slot: Slot| -> u32 {
            match slot {
                Slot::Empty => node_count,
                Slot::Node(n) => n,
                Slot::Data(offset) => node_count + 16 + offset,
            }
        };

        let mut out = Vec::new();
        for [left, right] in &self.nodes {
            let (left, right) = (record_value(*left), record_value(*right));
            match self.record_size {
                24 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                28 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.push((((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                32 => {
                    out.extend_from_slice(&left.to_be_bytes());
                    out.extend_from_slice(&right.to_be_bytes());
                }
                other => panic!("unsupported record size {}", other),
            }
        }

        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(METADATA_MARKER);
        encode_value(&self.metadata(), &mut out);
        out
    }

    fn metadata(&self) -> DataValue {
        map(vec![
            ("node_count", DataValue::Uint32(self.node_count())),
            ("record_size", DataValue::Uint16(self.record_size)),
            ("ip_version", DataValue::Uint16(self.ip_version)),
            ("binary_format_major_version", DataValue::Uint16(self.major_version)),
            ("binary_format_minor_version", DataValue::Uint16(self.minor_version)),
            ("build_epoch", DataValue::Uint64(1_700_000_000)),
            ("database_type", DataValue::String(self.database_type.clone())),
            (
                "languages",
                DataValue::Array(vec![DataValue::String("en".to_string())]),
            ),
            (
                "description",
                map(vec![("en", DataValue::String("Geolocate test data".to_string()))]),
            ),
        ])
    }
}

/// City-style fixture used across the integration tests.
///
/// | network          | record                                          |
/// |------------------|-------------------------------------------------|
/// | 1.2.3.4/32       | location 37.386, -122.0838 plus city/country    |
/// | 2.2.2.0/24       | latitude only                                   |
/// | 3.3.3.3/32       | latitude stored as a string                     |
/// | 4.4.4.0/24       | country only, no location map                   |
/// | 5.5.5.5/32       | location reached through a pointer              |
/// | 6.6.6.0/24       | longitude stored as a float                     |
/// | 2001:db8::/32    | location 52.52, 13.405 (IPv6 trees only)        |
pub fn city_builder(ip_version: u16, record_size: u16) -> FixtureBuilder {
    let mut builder = FixtureBuilder::new(ip_version, record_size).database_type("GeoLite2-City");

    let shared = builder.add_value(&map(vec![
        ("latitude", DataValue::Double(51.5074)),
        ("longitude", DataValue::Double(-0.1278)),
    ]));

    builder
        .insert(
            "1.2.3.4/32",
            &map(vec![
                (
                    "city",
                    map(vec![(
                        "names",
                        map(vec![
                            ("en", DataValue::String("Mountain View".to_string())),
                            ("de", DataValue::String("Mountain View".to_string())),
                        ]),
                    )]),
                ),
                (
                    "country",
                    map(vec![("iso_code", DataValue::String("US".to_string()))]),
                ),
                (
                    "location",
                    map(vec![
                        ("accuracy_radius", DataValue::Uint16(1000)),
                        ("latitude", DataValue::Double(37.386)),
                        ("longitude", DataValue::Double(-122.0838)),
                    ]),
                ),
                (
                    "subdivisions",
                    DataValue::Array(vec![map(vec![(
                        "iso_code",
                        DataValue::String("CA".to_string()),
                    )])]),
                ),
            ]),
        )
        .insert(
            "2.2.2.0/24",
            &map(vec![(
                "location",
                map(vec![("latitude", DataValue::Double(48.8582))]),
            )]),
        )
        .insert(
            "3.3.3.3/32",
            &map(vec![(
                "location",
                map(vec![
                    ("latitude", DataValue::String("37.386".to_string())),
                    ("longitude", DataValue::Double(-122.0838)),
                ]),
            )]),
        )
        .insert(
            "4.4.4.0/24",
            &map(vec![(
                "country",
                map(vec![("iso_code", DataValue::String("DE".to_string()))]),
            )]),
        )
        .insert(
            "5.5.5.5/32",
            &map(vec![("location", DataValue::Pointer(shared))]),
        )
        .insert(
            "6.6.6.0/24",
            &map(vec![(
                "location",
                map(vec![
                    ("latitude", DataValue::Double(10.0)),
                    ("longitude", DataValue::Float(20.0)),
                ]),
            )]),
        );

    if ip_version == 6 {
        builder.insert("2001:db8::/32", &location(52.52, 13.405));
    }
    builder
}

/// The city fixture as bytes
pub fn city_database(ip_version: u16, record_size: u16) -> Vec<u8> {
    city_builder(ip_version, record_size).build()
}

/// Write bytes to a temporary `.mmdb` file that lives as long as the handle
pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".mmdb")
        .tempfile()
        .expect("create temp file");
    file.write_all(bytes).expect("write fixture");
    file.flush().expect("flush fixture");
    file
}
