//! Database handle
//!
//! [`Database`] owns the loaded bytes and the metadata parsed from them.
//! It is immutable after open: lookups and decodes only read, so a single
//! handle can serve any number of threads (wrap it in an `Arc`). Closing
//! consumes the handle, which the borrow checker only allows once no
//! lookup still borrows it.

use crate::data_section::{DataDecoder, DataType, DataValue, PathElement};
use crate::error::GeoError;
use crate::mmdb::{
    read_metadata, Entry, IpVersion, Ipv4Start, Metadata, MmdbError, MmdbHeader, SearchTree,
};
use crate::storage::{OpenMode, Storage};
use log::{debug, trace, warn};
use std::net::IpAddr;
use std::path::Path;

/// A decoded record together with where it matched
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Network covered by the record
    pub network: IpAddr,
    /// Prefix length of `network`
    pub prefix_len: u8,
    /// The full decoded record, usually a map
    pub data: DataValue,
}

/// An open MaxMind DB file
///
/// # Examples
///
/// ```no_run
/// use geolocate::Database;
///
/// let db = Database::open("GeoLite2-City.mmdb")?;
/// let location = db.location("1.2.3.4")?;
/// println!("{}, {}", location.latitude, location.longitude);
/// db.close();
/// # Ok::<(), geolocate::GeoError>(())
/// ```
#[derive(Debug)]
pub struct Database {
    data: Storage,
    metadata: Metadata,
    header: MmdbHeader,
    ipv4_start: Ipv4Start,
}

impl Database {
    /// Open a database file using memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GeoError> {
        Self::open_with(path, OpenMode::Mmap)
    }

    /// Open a database file with an explicit load mode
    pub fn open_with<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self, GeoError> {
        let path = path.as_ref();
        let storage = Storage::open(path, mode).map_err(|e| {
            GeoError::FileOpenFailed(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let db = Self::from_storage(storage)?;
        debug!(
            "Opened {} ({}, {} bytes): {} nodes, {}-bit records, IPv{}, type '{}'",
            path.display(),
            mode,
            db.size(),
            db.header.node_count,
            db.header.record_size.bits(),
            db.header.ip_version.number(),
            db.metadata.database_type
        );
        Ok(db)
    }

    /// Create database from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, GeoError> {
        Self::from_storage(Storage::Owned(data))
    }

    fn from_storage(storage: Storage) -> Result<Self, GeoError> {
        let (metadata, header) = read_metadata(storage.as_slice())?;

        if metadata.binary_format_minor_version != 0 {
            warn!(
                "Database uses binary format {}.{}; reading it as 2.0",
                metadata.binary_format_major_version, metadata.binary_format_minor_version
            );
        }

        let ipv4_start = SearchTree::new(storage.as_slice(), &header)?.ipv4_start();

        Ok(Self {
            data: storage,
            metadata,
            header,
            ipv4_start,
        })
    }

    /// Close the database, unmapping or freeing its buffer.
    ///
    /// Equivalent to dropping the handle.
    pub fn close(self) {
        debug!("Closing database ({} bytes)", self.size());
    }

    /// Decoded metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Section layout derived from the metadata
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// Total file size in bytes
    pub fn size(&self) -> usize {
        self.data.size()
    }

    /// How the file was loaded
    pub fn mode(&self) -> OpenMode {
        self.data.mode()
    }

    /// True if the search tree covers IPv6 addresses
    pub fn is_ipv6(&self) -> bool {
        self.header.ip_version == IpVersion::V6
    }

    /// Raw bytes of the whole file
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Look up an address given as text
    ///
    /// Malformed input fails with [`MmdbError::InvalidIpAddress`] before any
    /// tree traversal.
    pub fn lookup(&self, ip: &str) -> Result<Option<Entry>, MmdbError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| MmdbError::InvalidIpAddress(ip.to_string()))?;
        self.lookup_ip(addr)
    }

    /// Look up an IP address in the search tree
    ///
    /// Returns `Ok(None)` if no record covers the address.
    pub fn lookup_ip(&self, addr: IpAddr) -> Result<Option<Entry>, MmdbError> {
        let entry = self.tree().lookup(addr)?;
        trace!("lookup {} -> {:?}", addr, entry);
        Ok(entry)
    }

    /// Look up an IP address and decode its whole record
    pub fn lookup_record(&self, addr: IpAddr) -> Result<Option<Record>, MmdbError> {
        let entry = match self.lookup_ip(addr)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        Ok(Some(Record {
            network: entry.network(addr),
            prefix_len: entry.prefix_len,
            data: self.decode(entry.data_offset)?,
        }))
    }

    /// Decode the value at a data section offset
    pub fn decode(&self, offset: u32) -> Result<DataValue, MmdbError> {
        self.decoder().decode(offset)
    }

    /// Follow a path of map keys and array indices from a data section
    /// offset and decode the value found there
    pub fn decode_path(
        &self,
        offset: u32,
        path: &[PathElement<'_>],
    ) -> Result<DataValue, MmdbError> {
        self.decoder().decode_path(offset, path)
    }

    /// Like [`decode_path`](Self::decode_path) but requires the terminal
    /// value to be of type `expected`
    pub fn decode_path_as(
        &self,
        offset: u32,
        path: &[PathElement<'_>],
        expected: DataType,
    ) -> Result<DataValue, MmdbError> {
        self.decoder().decode_path_as(offset, path, expected)
    }

    /// Decoder over the data section
    pub fn decoder(&self) -> DataDecoder<'_> {
        let section = self
            .data
            .get_slice(
                self.header.data_section_start,
                self.header.data_section_size(),
            )
            .unwrap_or_default();
        DataDecoder::new(section)
    }

    fn tree(&self) -> SearchTree<'_> {
        SearchTree::with_ipv4_start(self.data.as_slice(), &self.header, self.ipv4_start)
    }
}
