//! MMDB-specific Type Definitions
//!
//! Layout constants and the two small enums that describe the search tree.

use crate::error::{MmdbError, Result};
use serde::Serialize;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// The metadata marker must appear within this many bytes of the end of file
pub const METADATA_SEARCH_SIZE: usize = 4096;

/// IP version of the search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IpVersion {
    /// 32-bit tree
    V4,
    /// 128-bit tree (may include IPv4 subtrees)
    V6,
}

impl IpVersion {
    /// Interpret the metadata `ip_version` field.
    ///
    /// Anything other than 4 is treated as a 128-bit tree.
    pub fn from_metadata(value: u64) -> Self {
        if value == 4 {
            IpVersion::V4
        } else {
            IpVersion::V6
        }
    }

    /// Search depth: number of address bits walked
    pub fn address_bits(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes: `bits * 2 / 8`
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Record size in bits
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Create from bit size
    pub fn from_bits(bits: u64) -> Result<Self> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::invalid(format!(
                "invalid record size: {} bits",
                bits
            ))),
        }
    }
}
