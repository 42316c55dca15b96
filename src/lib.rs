//! tinymmdb - Read-only MaxMind DB lookups
//!
//! tinymmdb opens MaxMind DB (`.mmdb`) files, such as the GeoIP2 and
//! GeoLite2 databases, and answers IP address lookups against them. Lookups
//! walk the search tree directly in the mapped file and decode only the
//! values asked for.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tinymmdb::Database;
//!
//! let db = Database::open("/usr/local/share/GeoIP2/GeoIP2-City.mmdb")?;
//!
//! let result = db.lookup_str("24.24.24.24")?;
//! if let Some(entry) = result.entry() {
//!     // One value by key path
//!     if let Some(country) = entry.get_value(&["country", "iso_code"])? {
//!         println!("country: {}", country.as_str().unwrap_or("?"));
//!     }
//!
//!     // The whole record
//!     let tree = entry.get_tree()?;
//!     println!("{}", tinymmdb::export::to_json(&tree)?);
//! } else {
//!     println!("not found");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Database (mmap or owned buffer)     │
//! ├──────────────────────────────────────┤
//! │  mmdb::tree   address -> offset      │
//! │  path         key path -> value      │
//! │  materialize  offset -> value tree   │
//! │  data_section one value at offset    │
//! │  endian       big-endian primitives  │
//! └──────────────────────────────────────┘
//! ```
//!
//! Strings and byte arrays are returned as slices of the database buffer and
//! live as long as the [`Database`].

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section value decoding
pub mod data_section;
/// Database handle and lookup API
pub mod database;
/// Big-endian primitive readers
pub mod endian;
/// Error types
pub mod error;
/// JSON and text export of materialized values
pub mod export;
/// Whole-subtree expansion
pub mod materialize;
/// MMDB file layout: header, metadata and search tree
pub mod mmdb;
/// Key-path navigation
pub mod path;

pub use crate::data_section::{DataType, Decoded, Value};
pub use crate::database::{Database, DatabaseOptions, Entry, LookupResult, OpenMode};
pub use crate::error::{MmdbError, Result};
pub use crate::mmdb::{IpVersion, Metadata, RecordSize};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library version, as reported by `tinymmdb --version`
pub fn version() -> &'static str {
    VERSION
}
