//! MMDB-specific Type Definitions
//!
//! Format constants, the two header enums (`IpVersion`, `RecordSize`) and
//! the engine-level error type shared by the reader, the search tree and
//! the data decoder.

use crate::data_section::DataType;
use thiserror::Error;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the all-zero separator between the search tree and the data section
pub const DATA_SECTION_SEPARATOR_SIZE: usize = 16;

/// Metadata is guaranteed to live in the last 128KB of the file
pub const METADATA_SEARCH_SIZE: usize = 128 * 1024;

/// The only binary format major version this reader understands
pub const SUPPORTED_FORMAT_MAJOR_VERSION: u16 = 2;

/// MMDB engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MmdbError {
    /// Invalid file format
    #[error("Invalid MMDB format: {0}")]
    InvalidFormat(String),
    /// Metadata marker not found in the tail of the file
    #[error("MMDB metadata marker not found")]
    MetadataNotFound,
    /// Invalid metadata structure
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
    /// Binary format major version other than 2
    #[error("Unsupported binary format version {major}.{minor}")]
    UnsupportedFormatVersion {
        /// `binary_format_major_version`
        major: u16,
        /// `binary_format_minor_version`
        minor: u16,
    },
    /// Internal inconsistency in the tree or data section
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    /// A lookup path segment does not exist or does not match the data shape
    #[error("Lookup path does not match the data")]
    PathNotFound,
    /// The value at the end of a lookup path has an unexpected type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the caller asked for
        expected: DataType,
        /// Type actually stored
        found: DataType,
    },
    /// Invalid IP address
    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),
    /// An IPv6 address was looked up in an IPv4-only database
    #[error("IPv6 address {0} looked up in an IPv4-only database")]
    Ipv6LookupInIpv4Database(String),
}

/// IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 (may include IPv4-mapped addresses)
    V6,
}

impl IpVersion {
    /// Parse the metadata `ip_version` field
    pub fn from_number(version: u64) -> Result<Self, MmdbError> {
        match version {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            _ => Err(MmdbError::InvalidMetadata(format!(
                "Invalid IP version: {}",
                version
            ))),
        }
    }

    /// The number stored in metadata (4 or 6)
    pub fn number(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// Address width in bits
    pub fn bit_count(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Number of bits per record
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Create from bit size
    pub fn from_bits(bits: u64) -> Result<Self, MmdbError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::InvalidMetadata(format!(
                "Invalid record size: {} bits",
                bits
            ))),
        }
    }
}
