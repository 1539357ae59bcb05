//! Geolocate - IP Geolocation from MaxMind DB Files
//!
//! Geolocate resolves IP addresses to latitude/longitude using databases in
//! the MaxMind DB (MMDB) format, such as GeoLite2-City. The reader is written
//! from scratch: it parses the binary format, walks the search tree and
//! decodes the self-describing data section without any native library.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geolocate::{Database, GeoError};
//!
//! let db = Database::open("GeoLite2-City.mmdb")?;
//!
//! match db.location("1.2.3.4") {
//!     Ok(location) => println!("{}, {}", location.latitude, location.longitude),
//!     Err(GeoError::LocationNotFound) => println!("no record"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), GeoError>(())
//! ```
//!
//! # Lower-level access
//!
//! ```rust,no_run
//! use geolocate::{Database, DataType, PathElement};
//!
//! let db = Database::open("GeoLite2-City.mmdb")?;
//! if let Some(entry) = db.lookup("1.2.3.4")? {
//!     let path = [PathElement::Key("country"), PathElement::Key("iso_code")];
//!     let iso = db.decode_path_as(entry.data_offset, &path, DataType::String)?;
//!     println!("/{} -> {:?}", entry.prefix_len, iso);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  MMDB File                           │
//! ├──────────────────────────────────────┤
//! │  1. IP Search Tree (binary trie)     │
//! │  2. 16-byte separator                │
//! │  3. Data Section (deduplicated)      │
//! │  4. Marker + Metadata                │
//! └──────────────────────────────────────┘
//!          ↓ mmap() or read
//! ┌──────────────────────────────────────┐
//! │  Database (immutable, Send + Sync)   │
//! │  lookups borrow, close consumes      │
//! └──────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section decoding
pub mod data_section;
/// Database handle
pub mod database;
/// Error types surfaced to callers
pub mod error;
pub mod location;
/// MMDB format implementation
pub mod mmdb;
pub mod storage;

// Re-exports for Rust consumers

pub use crate::data_section::{DataDecoder, DataType, DataValue, PathElement};
pub use crate::database::{Database, Record};
pub use crate::error::GeoError;
pub use crate::location::Location;
pub use crate::mmdb::{Entry, Metadata, MmdbError};
pub use crate::storage::OpenMode;

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
