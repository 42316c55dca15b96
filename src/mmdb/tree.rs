//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups.
//! The tree uses a compact binary representation where each node contains
//! two records (left for bit 0, right for bit 1) that point to either:
//! - Another node (record < node_count, continue traversal)
//! - The empty marker (record == node_count, no data)
//! - The data section (record > node_count, found)

use super::format::MmdbHeader;
use super::types::RecordSize;
use crate::data_section::DATA_SECTION_SEPARATOR_SIZE;
use crate::endian::{read_u24_be, read_u32_be, read_u8};
use crate::error::{MmdbError, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::trace;

/// Where a search left the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieHit {
    /// Offset into the data section (separator included); 0 means no data
    pub data_offset: u32,
    /// Number of address bits consumed, i.e. the matched network's prefix length
    pub prefix_len: u8,
}

impl TrieHit {
    /// True if the address has data associated with it
    pub fn is_found(&self) -> bool {
        self.data_offset != 0
    }
}

/// Search tree for IP address lookups
pub struct SearchTree<'a> {
    /// The search tree bytes (`node_count * node_bytes`)
    tree: &'a [u8],
    /// Parsed header information
    header: &'a MmdbHeader,
}

impl<'a> SearchTree<'a> {
    /// Create a new search tree over the start of the database file
    pub fn new(data: &'a [u8], header: &'a MmdbHeader) -> Self {
        let tree = data.get(..header.tree_size).unwrap_or(&[]);
        Self { tree, header }
    }

    /// Look up an IP address
    pub fn lookup(&self, ip: IpAddr) -> Result<TrieHit> {
        match ip {
            IpAddr::V4(addr) => self.lookup_v4(addr),
            IpAddr::V6(addr) => self.lookup_v6(addr),
        }
    }

    /// Look up an IPv4 address
    ///
    /// In a 128-bit tree this walks the IPv4-compatible `::a.b.c.d` subtree.
    pub fn lookup_v4(&self, addr: Ipv4Addr) -> Result<TrieHit> {
        self.walk(u32::from(addr) as u128)
    }

    /// Look up an IPv6 address
    ///
    /// In a 32-bit tree only the low 32 bits of the address are walked;
    /// IPv4-mapped addresses are not translated.
    pub fn lookup_v6(&self, addr: Ipv6Addr) -> Result<TrieHit> {
        self.walk(u128::from(addr))
    }

    /// Walk the low `address_bits` bits of `address`, most significant first
    pub fn walk(&self, address: u128) -> Result<TrieHit> {
        let bits = self.header.address_bits();
        let node_count = self.header.node_count;
        let mut node = 0u32;

        for depth in (0..bits).rev() {
            let bit = ((address >> depth) & 1) as u8;
            let record = self.read_record(node, bit)?;

            if record >= node_count {
                let hit = TrieHit {
                    data_offset: record - node_count,
                    prefix_len: bits - depth,
                };
                self.check_data_offset(hit.data_offset, record)?;
                trace!(
                    node,
                    record,
                    data_offset = hit.data_offset,
                    prefix_len = hit.prefix_len,
                    "search left the tree"
                );
                return Ok(hit);
            }
            node = record;
        }

        Err(MmdbError::corrupt(format!(
            "search exhausted {} address bits without leaving the tree",
            bits
        )))
    }

    /// Read a record from a node
    ///
    /// Each node contains two records. `side` determines which:
    /// - 0 = left record (for IP bit 0)
    /// - 1 = right record (for IP bit 1)
    fn read_record(&self, node: u32, side: u8) -> Result<u32> {
        let node_offset = node as usize * self.header.record_size.node_bytes();
        match self.header.record_size {
            RecordSize::Bits24 => read_u24_be(self.tree, node_offset + side as usize * 3),
            RecordSize::Bits28 => self.read_28bit_record(node_offset, side),
            RecordSize::Bits32 => read_u32_be(self.tree, node_offset + side as usize * 4),
        }
    }

    /// Read a 28-bit record (3.5 bytes per record, 7 bytes per node)
    ///
    /// Layout: [Left low 24 bits][Middle byte][Right low 24 bits]
    /// The middle byte's high nibble is the left record's top 4 bits, its
    /// low nibble the right record's top 4 bits.
    fn read_28bit_record(&self, node_offset: usize, side: u8) -> Result<u32> {
        if side == 0 {
            let low = read_u24_be(self.tree, node_offset)?;
            let middle = read_u8(self.tree, node_offset + 3)? as u32;
            Ok(low | ((middle & 0xf0) << 20))
        } else {
            Ok(read_u32_be(self.tree, node_offset + 3)? & 0x0fff_ffff)
        }
    }

    /// Reject records that point into the separator or past the data section
    fn check_data_offset(&self, data_offset: u32, record: u32) -> Result<()> {
        let data_len = self
            .header
            .data_section_end
            .saturating_sub(self.header.tree_size);
        if data_offset != 0
            && (data_offset < DATA_SECTION_SEPARATOR_SIZE || data_offset as usize >= data_len)
        {
            return Err(MmdbError::corrupt(format!(
                "record {} points to data offset {} outside the data section ({} bytes)",
                record, data_offset, data_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmdb::types::IpVersion;

    fn header(node_count: u32, record_size: RecordSize, ip_version: IpVersion) -> MmdbHeader {
        let tree_size = node_count as usize * record_size.node_bytes();
        MmdbHeader {
            node_count,
            record_size,
            ip_version,
            tree_size,
            format_major: 2,
            format_minor: 0,
            metadata_start: tree_size + 1000,
            data_section_end: tree_size + 1000,
        }
    }

    #[test]
    fn test_read_24bit_record() {
        // Node 0: left=1, right=2; node 1: left=0x123456, right=0xabcdef
        let data = [
            0x00, 0x00, 0x01, 0x00, 0x00, 0x02, 0x12, 0x34, 0x56, 0xab, 0xcd, 0xef,
        ];
        let header = header(2, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);

        assert_eq!(tree.read_record(0, 0).unwrap(), 1);
        assert_eq!(tree.read_record(0, 1).unwrap(), 2);
        assert_eq!(tree.read_record(1, 0).unwrap(), 0x12_3456);
        assert_eq!(tree.read_record(1, 1).unwrap(), 0xab_cdef);
    }

    #[test]
    fn test_read_28bit_record() {
        // Node 0: left=0x1000001, right=0x2000002
        // Node 1: left=0xfabcdef, right=0x5123456
        let data = [
            0x00, 0x00, 0x01, 0x12, 0x00, 0x00, 0x02, //
            0xab, 0xcd, 0xef, 0xf5, 0x12, 0x34, 0x56,
        ];
        let header = header(2, RecordSize::Bits28, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);

        assert_eq!(tree.read_record(0, 0).unwrap(), 0x100_0001);
        assert_eq!(tree.read_record(0, 1).unwrap(), 0x200_0002);
        assert_eq!(tree.read_record(1, 0).unwrap(), 0xfab_cdef);
        assert_eq!(tree.read_record(1, 1).unwrap(), 0x512_3456);
    }

    #[test]
    fn test_read_32bit_record() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0xff, 0xff, 0xff, 0xfe, //
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0,
        ];
        let header = header(2, RecordSize::Bits32, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);

        assert_eq!(tree.read_record(0, 0).unwrap(), 1);
        assert_eq!(tree.read_record(0, 1).unwrap(), 0xffff_fffe);
        assert_eq!(tree.read_record(1, 0).unwrap(), 0x1234_5678);
        assert_eq!(tree.read_record(1, 1).unwrap(), 0x9abc_def0);
    }

    #[test]
    fn test_walk_reports_prefix_and_offset() {
        // node_count = 2
        // node 0: bit 0 -> node 1, bit 1 -> empty (2)
        // node 1: bit 0 -> data 2 + 20, bit 1 -> data 2 + 40
        let data = [0, 0, 1, 0, 0, 2, 0, 0, 22, 0, 0, 42];
        let header = header(2, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);

        let hit = tree.lookup_v4(Ipv4Addr::new(0, 0, 0, 0)).unwrap();
        assert_eq!(
            hit,
            TrieHit {
                data_offset: 20,
                prefix_len: 2
            }
        );

        let hit = tree.lookup_v4(Ipv4Addr::new(64, 0, 0, 1)).unwrap();
        assert_eq!(hit.data_offset, 40);
        assert_eq!(hit.prefix_len, 2);

        let miss = tree.lookup_v4(Ipv4Addr::new(128, 0, 0, 1)).unwrap();
        assert!(!miss.is_found());
        assert_eq!(miss.prefix_len, 1);
    }

    #[test]
    fn test_v6_address_in_v4_tree_uses_low_bits() {
        let data = [0, 0, 1, 0, 0, 2, 0, 0, 22, 0, 0, 42];
        let header = header(2, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);

        let v6: Ipv6Addr = "::64.0.0.1".parse().unwrap();
        assert_eq!(tree.lookup_v6(v6).unwrap().data_offset, 40);
    }

    #[test]
    fn test_v4_address_in_v6_tree_walks_leading_zero_bits() {
        // Chain of 96 zero-bit nodes, then one node splitting on the first IPv4 bit.
        let node_count = 97u32;
        let mut data = Vec::new();
        for i in 0..96u32 {
            data.extend_from_slice(&(i + 1).to_be_bytes()[1..]);
            data.extend_from_slice(&node_count.to_be_bytes()[1..]);
        }
        data.extend_from_slice(&(node_count + 16).to_be_bytes()[1..]);
        data.extend_from_slice(&(node_count + 32).to_be_bytes()[1..]);
        let header = header(node_count, RecordSize::Bits24, IpVersion::V6);
        let tree = SearchTree::new(&data, &header);

        let hit = tree.lookup(IpAddr::V4(Ipv4Addr::new(200, 1, 1, 1))).unwrap();
        assert_eq!(hit.data_offset, 32);
        assert_eq!(hit.prefix_len, 97);

        let miss = tree.lookup("2001:db8::1".parse().unwrap()).unwrap();
        assert_eq!(miss.data_offset, 0);
        assert_eq!(miss.prefix_len, 3);
    }

    #[test]
    fn test_walk_exhausting_bits_is_corrupt() {
        // Every record points back to node 0
        let data = [0u8; 6];
        let header = header(1, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);
        assert!(matches!(
            tree.lookup_v4(Ipv4Addr::new(1, 2, 3, 4)),
            Err(MmdbError::CorruptDatabase(_))
        ));
    }

    #[test]
    fn test_record_into_separator_is_corrupt() {
        // node_count 1, left record = 1 + 5 (inside the 16-byte separator)
        let data = [0, 0, 6, 0, 0, 1];
        let header = header(1, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);
        assert!(tree.lookup_v4(Ipv4Addr::new(1, 0, 0, 0)).is_err());
        assert!(!tree.lookup_v4(Ipv4Addr::new(128, 0, 0, 0)).unwrap().is_found());
    }

    #[test]
    fn test_truncated_tree_is_corrupt() {
        // Header claims two nodes, buffer only holds one
        let data = [0, 0, 1, 0, 0, 1];
        let header = header(2, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &header);
        assert!(matches!(
            tree.lookup_v4(Ipv4Addr::new(0, 0, 0, 0)),
            Err(MmdbError::CorruptDatabase(_))
        ));
    }
}
