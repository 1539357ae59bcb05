//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups.
//! The tree uses a compact binary representation where each node contains
//! two records (left and right) that point to either:
//! - Another node (continue traversal)
//! - A data section offset (found)
//! - A "not found" marker (equal to the node count)

use super::format::MmdbHeader;
use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A matched record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Offset into the data section (relative to data section start)
    pub data_offset: u32,
    /// Number of address bits consumed before reaching the record.
    ///
    /// For IPv4 addresses this counts IPv4 bits even in an IPv6 tree.
    pub prefix_len: u8,
}

impl Entry {
    /// The network the matched record covers, i.e. `ip` masked to
    /// `prefix_len` bits.
    pub fn network(&self, ip: IpAddr) -> IpAddr {
        match ip {
            IpAddr::V4(addr) => {
                let prefix = self.prefix_len.min(32) as u32;
                let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(u32::from(addr) & mask))
            }
            IpAddr::V6(addr) => {
                let prefix = self.prefix_len.min(128) as u32;
                let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(u128::from(addr) & mask))
            }
        }
    }
}

/// Where IPv4 lookups begin
///
/// In an IPv6 tree IPv4 addresses live under `::/96`, so their walk starts
/// at the node reached after 96 zero bits. `node` may already be a terminal
/// record if the tree ends above that depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Start {
    /// Node (or terminal record) at which IPv4 bits start
    pub node: u32,
    /// Tree depth of that node
    pub depth: u8,
}

/// Search tree for IP address lookups
///
/// Holds only borrowed data, so building one per lookup is free. Reads are
/// bounds-checked against the tree section.
pub struct SearchTree<'a> {
    /// The tree section of the file
    tree: &'a [u8],
    /// Parsed header information
    header: &'a MmdbHeader,
    ipv4_start: Ipv4Start,
}

impl<'a> SearchTree<'a> {
    /// Create a search tree and locate the IPv4 start node
    pub fn new(data: &'a [u8], header: &'a MmdbHeader) -> Result<Self, MmdbError> {
        let mut tree = Self::with_ipv4_start(data, header, Ipv4Start { node: 0, depth: 0 });
        tree.ipv4_start = tree.find_ipv4_start_node()?;
        Ok(tree)
    }

    /// Create a search tree with a previously computed IPv4 start node
    pub fn with_ipv4_start(data: &'a [u8], header: &'a MmdbHeader, ipv4_start: Ipv4Start) -> Self {
        let tree = &data[..header.tree_size.min(data.len())];
        Self {
            tree,
            header,
            ipv4_start,
        }
    }

    /// The IPv4 start node this tree uses
    pub fn ipv4_start(&self) -> Ipv4Start {
        self.ipv4_start
    }

    /// Look up an IP address
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<Entry>, MmdbError> {
        match ip {
            IpAddr::V4(addr) => self.lookup_v4(addr),
            IpAddr::V6(addr) => self.lookup_v6(addr),
        }
    }

    /// Look up an IPv4 address
    pub fn lookup_v4(&self, addr: Ipv4Addr) -> Result<Option<Entry>, MmdbError> {
        self.walk(u32::from(addr) as u128, IpVersion::V4, self.ipv4_start.node)
    }

    /// Look up an IPv6 address
    pub fn lookup_v6(&self, addr: Ipv6Addr) -> Result<Option<Entry>, MmdbError> {
        if self.header.ip_version == IpVersion::V4 {
            return Err(MmdbError::Ipv6LookupInIpv4Database(addr.to_string()));
        }
        self.walk(u128::from(addr), IpVersion::V6, 0)
    }

    /// Walk the address bits of `bits`, most significant first
    fn walk(
        &self,
        bits: u128,
        version: IpVersion,
        start: u32,
    ) -> Result<Option<Entry>, MmdbError> {
        let bit_count = version.bit_count();
        let node_count = self.header.node_count;
        let mut node = start;
        let mut consumed = 0u8;

        while consumed < bit_count && node < node_count {
            let bit = ((bits >> (bit_count - 1 - consumed)) & 1) as u8;
            node = self.read_record(node, bit)?;
            consumed += 1;
        }

        if node <= node_count {
            // Either the empty marker or bits ran out on an internal node
            return Ok(None);
        }

        Ok(Some(Entry {
            data_offset: self.calculate_data_offset(node)?,
            prefix_len: consumed,
        }))
    }

    /// Read a record from a node
    ///
    /// Each node contains two records. `side` determines which:
    /// - 0 = left record (for IP bit 0)
    /// - 1 = right record (for IP bit 1)
    pub fn read_record(&self, node: u32, side: u8) -> Result<u32, MmdbError> {
        if node >= self.header.node_count {
            return Err(MmdbError::CorruptData(format!(
                "Node index {} exceeds node count {}",
                node, self.header.node_count
            )));
        }

        let node_bytes = self.header.record_size.node_bytes();
        let node_offset = node as usize * node_bytes;
        let bytes = self
            .tree
            .get(node_offset..node_offset + node_bytes)
            .ok_or_else(|| {
                MmdbError::CorruptData(format!(
                    "Node {} at offset {} exceeds tree size {}",
                    node,
                    node_offset,
                    self.tree.len()
                ))
            })?;

        Ok(match (self.header.record_size, side) {
            (RecordSize::Bits24, 0) => be_uint(&bytes[0..3]),
            (RecordSize::Bits24, _) => be_uint(&bytes[3..6]),
            // Middle byte holds the high nibble of each record:
            // [left 24 bits][left hi | right hi][right 24 bits]
            (RecordSize::Bits28, 0) => (((bytes[3] >> 4) as u32) << 24) | be_uint(&bytes[0..3]),
            (RecordSize::Bits28, _) => (((bytes[3] & 0x0F) as u32) << 24) | be_uint(&bytes[4..7]),
            (RecordSize::Bits32, 0) => be_uint(&bytes[0..4]),
            (RecordSize::Bits32, _) => be_uint(&bytes[4..8]),
        })
    }

    /// Calculate data section offset from record value
    ///
    /// - Record value > node_count means it points to data
    /// - data_offset = (record_value - node_count) - 16
    /// - The 16 is the data section separator size
    fn calculate_data_offset(&self, record: u32) -> Result<u32, MmdbError> {
        let offset = (record as u64)
            .checked_sub(self.header.node_count as u64 + DATA_SECTION_SEPARATOR_SIZE as u64)
            .ok_or_else(|| {
                MmdbError::CorruptData(format!(
                    "Record {} points into the data section separator (node_count = {})",
                    record, self.header.node_count
                ))
            })?;

        if offset >= self.header.data_section_size() as u64 {
            return Err(MmdbError::CorruptData(format!(
                "Record {} points past the data section ({} bytes)",
                record,
                self.header.data_section_size()
            )));
        }

        Ok(offset as u32)
    }

    /// Find the IPv4 start node in an IPv6 tree
    ///
    /// IPv4 addresses in IPv6 trees live under the ::/96 prefix. Walk 96
    /// zero bits to find where the IPv4 address space begins.
    fn find_ipv4_start_node(&self) -> Result<Ipv4Start, MmdbError> {
        let mut start = Ipv4Start { node: 0, depth: 0 };
        if self.header.ip_version == IpVersion::V4 {
            return Ok(start);
        }

        while start.depth < 96 && start.node < self.header.node_count {
            start.node = self.read_record(start.node, 0)?;
            start.depth += 1;
        }

        Ok(start)
    }
}

fn be_uint(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}
