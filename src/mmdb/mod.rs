//! MaxMind DB (MMDB) layout
//!
//! An MMDB file is three regions back to back:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  1. Search tree (node_count nodes)   │
//! │  2. Data section                     │
//! │     16-byte zero separator first     │
//! │  3. Metadata marker + metadata map   │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Architecture
//!
//! - **types**: layout constants, record size and IP version
//! - **format**: marker search, header and metadata extraction
//! - **tree**: search tree traversal for IP lookups
//!
//! Values in both the data section and the metadata map are decoded by
//! `crate::data_section::DataDecoder`.

pub mod format;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, Metadata, MmdbHeader};
pub use tree::{SearchTree, TrieHit};
pub use types::{IpVersion, RecordSize, METADATA_MARKER, METADATA_SEARCH_SIZE};
