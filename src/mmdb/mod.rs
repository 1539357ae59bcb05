//! MaxMind DB (MMDB) Reader
//!
//! This module provides functionality for reading MaxMind DB files,
//! which are used for GeoIP lookups and other IP-based data lookups.
//!
//! The MMDB format uses a binary search tree for efficient IP address
//! lookups. Data is stored in the MMDB data section format, decoded by
//! `crate::data_section::DataDecoder`.
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types, constants and errors
//! - **format**: Metadata location, decoding and section layout
//! - **tree**: Search tree traversal for IP lookups

pub mod format;
pub mod tree;
pub mod types;

// Re-export key types
pub use format::{find_metadata_marker, read_metadata, Metadata, MmdbHeader};
pub use tree::{Entry, Ipv4Start, SearchTree};
pub use types::{
    IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER,
};
