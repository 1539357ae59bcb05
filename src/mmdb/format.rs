//! MMDB Binary Format Parsing
//!
//! This module handles locating and decoding the metadata section and
//! deriving the section layout from it.
//!
//! Layout of a file:
//!
//! ```text
//! [search tree: node_count * node_bytes]
//! [16 zero bytes]
//! [data section]
//! [\xAB\xCD\xEFMaxMind.com][metadata map]
//! ```
//!
//! Design:
//! - Find metadata marker (backward slice search over the last 128KB)
//! - Decode the metadata map once at open time into [`Metadata`]
//! - Derive the immutable [`MmdbHeader`] used by tree traversal and decoding

use super::types::{
    IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER,
    METADATA_SEARCH_SIZE, SUPPORTED_FORMAT_MAJOR_VERSION,
};
use crate::data_section::{DataDecoder, DataValue};
use memchr::memmem;

/// Decoded metadata map
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version of the tree (4 or 6)
    pub ip_version: IpVersion,
    /// Binary format major version (always 2 once validated)
    pub binary_format_major_version: u16,
    /// Binary format minor version
    pub binary_format_minor_version: u16,
    /// Build time as seconds since the Unix epoch
    pub build_epoch: u64,
    /// Free-form database type, e.g. "GeoLite2-City"
    pub database_type: String,
    /// Locale codes the database may carry names for
    pub languages: Vec<String>,
    /// Description per language, in stored order
    pub description: Vec<(String, String)>,
}

impl Metadata {
    /// Decode and validate the metadata map that follows the marker
    pub fn from_value(value: &DataValue) -> Result<Self, MmdbError> {
        if !matches!(value, DataValue::Map(_)) {
            return Err(MmdbError::InvalidMetadata(
                "Metadata is not a map".to_string(),
            ));
        }

        let major = extract_u16(value, "binary_format_major_version")?;
        let minor = extract_u16(value, "binary_format_minor_version")?;
        if major != SUPPORTED_FORMAT_MAJOR_VERSION {
            return Err(MmdbError::UnsupportedFormatVersion { major, minor });
        }

        let node_count = extract_uint(value, "node_count")?;
        let node_count = u32::try_from(node_count).map_err(|_| {
            MmdbError::InvalidMetadata(format!("node_count {} does not fit in 32 bits", node_count))
        })?;
        let record_size = RecordSize::from_bits(extract_uint(value, "record_size")?)?;
        let ip_version = IpVersion::from_number(extract_uint(value, "ip_version")?)?;

        let build_epoch = extract_uint(value, "build_epoch").unwrap_or(0);
        let database_type = value
            .get("database_type")
            .and_then(DataValue::as_str)
            .unwrap_or_default()
            .to_string();

        let languages = match value.get("languages") {
            Some(DataValue::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let description = match value.get("description") {
            Some(DataValue::Map(entries)) => entries
                .iter()
                .filter_map(|(lang, text)| text.as_str().map(|t| (lang.clone(), t.to_string())))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Metadata {
            node_count,
            record_size,
            ip_version,
            binary_format_major_version: major,
            binary_format_minor_version: minor,
            build_epoch,
            database_type,
            languages,
            description,
        })
    }
}

/// Section layout derived from metadata
///
/// Everything needed to walk the tree and to find the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// Absolute offset of the first data section byte
    pub data_section_start: usize,
    /// Absolute offset of the metadata marker (end of the data section)
    pub metadata_start: usize,
}

impl MmdbHeader {
    /// Derive the layout and check that it fits the file
    pub fn new(metadata: &Metadata, metadata_start: usize) -> Result<Self, MmdbError> {
        let tree_size = metadata.record_size.node_bytes() * metadata.node_count as usize;
        let data_section_start = tree_size + DATA_SECTION_SEPARATOR_SIZE;

        if data_section_start > metadata_start {
            return Err(MmdbError::InvalidFormat(format!(
                "Search tree of {} bytes does not fit before metadata at offset {}",
                tree_size, metadata_start
            )));
        }

        Ok(MmdbHeader {
            node_count: metadata.node_count,
            record_size: metadata.record_size,
            ip_version: metadata.ip_version,
            tree_size,
            data_section_start,
            metadata_start,
        })
    }

    /// Size of the data section in bytes
    pub fn data_section_size(&self) -> usize {
        self.metadata_start - self.data_section_start
    }
}

/// Locate, decode and validate the metadata of a file
///
/// Returns the decoded metadata together with the derived layout.
pub fn read_metadata(data: &[u8]) -> Result<(Metadata, MmdbHeader), MmdbError> {
    let marker_offset = find_metadata_marker(data)?;
    let metadata_offset = marker_offset + METADATA_MARKER.len();

    // Pointers inside the metadata are relative to the metadata section
    let decoder = DataDecoder::new(&data[metadata_offset..]);
    let value = decoder.decode(0).map_err(|e| {
        MmdbError::InvalidMetadata(format!("Failed to decode metadata: {}", e))
    })?;

    let metadata = Metadata::from_value(&value)?;
    let header = MmdbHeader::new(&metadata, marker_offset)?;

    Ok((metadata, header))
}

/// Find the metadata marker in an MMDB file (zero allocation)
///
/// The marker "\xAB\xCD\xEFMaxMind.com" appears somewhere in the last 128KB
/// of the file and the metadata comes right after it. The search runs
/// backward so the LAST marker wins if the data section happens to contain
/// the same byte sequence.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize, MmdbError> {
    let search_start = data.len().saturating_sub(METADATA_SEARCH_SIZE);

    memmem::rfind(&data[search_start..], METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or(MmdbError::MetadataNotFound)
}

fn extract_u16(map: &DataValue, key: &str) -> Result<u16, MmdbError> {
    let value = extract_uint(map, key)?;
    u16::try_from(value).map_err(|_| {
        MmdbError::InvalidMetadata(format!("Field '{}' value {} exceeds 16 bits", key, value))
    })
}

fn extract_uint(map: &DataValue, key: &str) -> Result<u64, MmdbError> {
    match map.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            MmdbError::InvalidMetadata(format!("Field '{}' is not an unsigned integer", key))
        }),
        None => Err(MmdbError::InvalidMetadata(format!(
            "Required field '{}' not found",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint_entry(key: &str, value: u16) -> Vec<u8> {
        let mut out = vec![0x40 | key.len() as u8];
        out.extend_from_slice(key.as_bytes());
        out.push(0xA2);
        out.extend_from_slice(&value.to_be_bytes());
        out
    }

    /// Minimal metadata map with the five required fields
    fn metadata_bytes(node_count: u16, record_size: u16, ip_version: u16, major: u16) -> Vec<u8> {
        let mut out = vec![0xE5];
        out.extend(uint_entry("node_count", node_count));
        out.extend(uint_entry("record_size", record_size));
        out.extend(uint_entry("ip_version", ip_version));
        out.extend(uint_entry("binary_format_major_version", major));
        out.extend(uint_entry("binary_format_minor_version", 0));
        out
    }

    fn file_with(tree_and_data: usize, metadata: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; tree_and_data];
        data.extend_from_slice(METADATA_MARKER);
        data.extend_from_slice(metadata);
        data
    }

    #[test]
    fn test_find_metadata_marker() {
        let data = file_with(100, &metadata_bytes(1, 24, 4, 2));
        assert_eq!(find_metadata_marker(&data).unwrap(), 100);
    }

    #[test]
    fn test_last_marker_wins() {
        let mut data = vec![0u8; 10];
        data.extend_from_slice(METADATA_MARKER);
        data.extend_from_slice(&[0u8; 40]);
        let second = data.len();
        data.extend_from_slice(METADATA_MARKER);
        data.extend(metadata_bytes(1, 24, 4, 2));

        assert_eq!(find_metadata_marker(&data).unwrap(), second);
    }

    #[test]
    fn test_marker_outside_search_window() {
        let mut data = METADATA_MARKER.to_vec();
        data.extend(vec![0u8; METADATA_SEARCH_SIZE + 1]);
        assert_eq!(find_metadata_marker(&data), Err(MmdbError::MetadataNotFound));
    }

    #[test]
    fn test_metadata_not_found() {
        assert_eq!(
            find_metadata_marker(b"not a valid mmdb file"),
            Err(MmdbError::MetadataNotFound)
        );
        assert_eq!(find_metadata_marker(b""), Err(MmdbError::MetadataNotFound));
    }

    #[test]
    fn test_read_metadata_layout() {
        // 2 nodes * 6 bytes + 16 separator + 10 bytes of data
        let data = file_with(12 + 16 + 10, &metadata_bytes(2, 24, 6, 2));
        let (metadata, header) = read_metadata(&data).unwrap();

        assert_eq!(metadata.node_count, 2);
        assert_eq!(metadata.record_size, RecordSize::Bits24);
        assert_eq!(metadata.ip_version, IpVersion::V6);
        assert_eq!(metadata.binary_format_major_version, 2);
        assert!(metadata.database_type.is_empty());

        assert_eq!(header.tree_size, 12);
        assert_eq!(header.data_section_start, 28);
        assert_eq!(header.metadata_start, 38);
        assert_eq!(header.data_section_size(), 10);
    }

    #[test]
    fn test_unsupported_major_version() {
        let data = file_with(64, &metadata_bytes(1, 24, 4, 3));
        assert_eq!(
            read_metadata(&data),
            Err(MmdbError::UnsupportedFormatVersion { major: 3, minor: 0 })
        );
    }

    #[test]
    fn test_tree_larger_than_file() {
        let data = file_with(20, &metadata_bytes(1000, 32, 4, 2));
        assert!(matches!(read_metadata(&data), Err(MmdbError::InvalidFormat(_))));
    }

    #[test]
    fn test_invalid_record_size() {
        let data = file_with(64, &metadata_bytes(1, 20, 4, 2));
        assert!(matches!(read_metadata(&data), Err(MmdbError::InvalidMetadata(_))));
    }

    #[test]
    fn test_metadata_not_a_map() {
        let mut metadata = vec![0x42];
        metadata.extend_from_slice(b"hi");
        let data = file_with(10, &metadata);
        assert!(matches!(read_metadata(&data), Err(MmdbError::InvalidMetadata(_))));
    }

    #[test]
    fn test_oversized_format_version() {
        // 65538 would read as 2 if narrowed to 16 bits
        let versions = |major: u32, minor: u32| {
            DataValue::Map(vec![
                ("node_count".to_string(), DataValue::Uint32(1)),
                ("record_size".to_string(), DataValue::Uint16(24)),
                ("ip_version".to_string(), DataValue::Uint16(4)),
                (
                    "binary_format_major_version".to_string(),
                    DataValue::Uint32(major),
                ),
                (
                    "binary_format_minor_version".to_string(),
                    DataValue::Uint32(minor),
                ),
            ])
        };

        assert!(matches!(
            Metadata::from_value(&versions(65_538, 0)),
            Err(MmdbError::InvalidMetadata(_))
        ));
        assert!(matches!(
            Metadata::from_value(&versions(2, 65_536)),
            Err(MmdbError::InvalidMetadata(_))
        ));
        assert_eq!(
            Metadata::from_value(&versions(2, 1))
                .unwrap()
                .binary_format_minor_version,
            1
        );
    }
}
