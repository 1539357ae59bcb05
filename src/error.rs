//! Error types for the geolocate library
//!
//! [`GeoError`] is what callers see. It keeps "no data for this address"
//! apart from "the database is broken": the not-found kinds are separate
//! variants from [`GeoError::CorruptData`].

use crate::mmdb::MmdbError;
use thiserror::Error;

/// Errors surfaced by [`Database`](crate::Database) operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// The database file could not be opened or read
    #[error("Failed to open database: {0}")]
    FileOpenFailed(String),

    /// No metadata marker in the tail of the file
    #[error("MMDB metadata marker not found")]
    MetadataNotFound,

    /// Binary format major version other than 2
    #[error("Unsupported binary format version {major}.{minor}")]
    UnsupportedFormatVersion {
        /// `binary_format_major_version`
        major: u16,
        /// `binary_format_minor_version`
        minor: u16,
    },

    /// Metadata present but missing fields or inconsistent with the file
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The caller's address string could not be used
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The address is not covered by any record
    #[error("Location not found")]
    LocationNotFound,

    /// The record has no `location.latitude`
    #[error("Latitude not found")]
    LatitudeNotFound,

    /// The record has no `location.longitude`
    #[error("Longitude not found")]
    LongitudeNotFound,

    /// `location.latitude` or `location.longitude` is not a double
    #[error("Invalid location type: {0}")]
    InvalidLocationType(String),

    /// Internal inconsistency in the tree or data section
    #[error("Corrupt database: {0}")]
    CorruptData(String),
}

impl From<MmdbError> for GeoError {
    fn from(err: MmdbError) -> Self {
        match err {
            MmdbError::MetadataNotFound => GeoError::MetadataNotFound,
            MmdbError::UnsupportedFormatVersion { major, minor } => {
                GeoError::UnsupportedFormatVersion { major, minor }
            }
            MmdbError::InvalidMetadata(msg) => GeoError::InvalidMetadata(msg),
            MmdbError::InvalidFormat(msg) => GeoError::InvalidMetadata(msg),
            MmdbError::InvalidIpAddress(msg) => GeoError::InvalidAddress(msg),
            err @ MmdbError::Ipv6LookupInIpv4Database(_) => {
                GeoError::InvalidAddress(err.to_string())
            }
            MmdbError::CorruptData(msg) => GeoError::CorruptData(msg),
            // Path errors only reach here outside the location facade,
            // which maps them per field
            err @ (MmdbError::PathNotFound | MmdbError::TypeMismatch { .. }) => {
                GeoError::CorruptData(err.to_string())
            }
        }
    }
}

impl GeoError {
    /// True for the "no data" kinds, false for broken input or databases
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GeoError::LocationNotFound | GeoError::LatitudeNotFound | GeoError::LongitudeNotFound
        )
    }
}
