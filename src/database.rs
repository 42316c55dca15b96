//! Database handle and lookup API
//!
//! A [`Database`] owns the file contents, either memory-mapped or read into
//! memory, plus the layout parsed from its metadata at open time. Lookups
//! walk the search tree and hand back a [`LookupResult`]; the data behind a
//! found address is read through an [`Entry`], either one value at a key
//! path or the whole subtree.
//!
//! Nothing is cached between lookups and the handle is never mutated after
//! construction, so a `Database` can be shared across threads freely.

use crate::data_section::{DataDecoder, Decoded};
use crate::error::{MmdbError, Result};
use crate::materialize::{materialize, DEFAULT_MAX_DEPTH};
use crate::mmdb::{Metadata, MmdbHeader, SearchTree, TrieHit};
use crate::path;
use memmap2::Mmap;
use std::fs::File;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use tracing::debug;

/// How the database file is brought into memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    /// Map the file read-only; pages are loaded on demand
    #[default]
    Mmap,
    /// Read the whole file into an owned buffer
    Memory,
}

/// Options for opening a database
///
/// # Examples
///
/// ```no_run
/// use tinymmdb::{Database, OpenMode};
///
/// let db = Database::options()
///     .mode(OpenMode::Memory)
///     .max_depth(64)
///     .open("GeoIP2-City.mmdb")?;
/// # Ok::<(), tinymmdb::MmdbError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    mode: OpenMode,
    max_depth: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            mode: OpenMode::Mmap,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DatabaseOptions {
    /// Default options: memory-mapped, nesting bound of 512
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose between mapping the file and reading it into memory
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Deepest map/array nesting accepted by [`Entry::get_tree`]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Open the database at `path` with these options
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Database> {
        let path = path.as_ref();
        let storage = match self.mode {
            OpenMode::Mmap => {
                let file = File::open(path).map_err(|e| {
                    MmdbError::OpenFile(format!("{}: {}", path.display(), e))
                })?;
                // SAFETY: the mapping is read-only and every access is bounds-checked
                // against its length; the file must not be truncated while open.
                let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                    MmdbError::invalid(format!("failed to map {}: {}", path.display(), e))
                })?;
                DatabaseStorage::Mmap(mmap)
            }
            OpenMode::Memory => DatabaseStorage::Owned(std::fs::read(path).map_err(|e| {
                MmdbError::OpenFile(format!("{}: {}", path.display(), e))
            })?),
        };
        debug!(path = %path.display(), mode = ?self.mode, "opening database");
        Database::from_storage(storage, self.max_depth)
    }
}

/// Storage for database data - either owned or memory-mapped
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// An open, read-only MaxMind DB database
///
/// # Examples
///
/// ```no_run
/// use tinymmdb::Database;
///
/// let db = Database::open("/usr/local/share/GeoIP2/GeoIP2-City.mmdb")?;
/// let result = db.lookup_str("24.24.24.24")?;
/// if let Some(entry) = result.entry() {
///     if let Some(code) = entry.get_value(&["country", "iso_code"])? {
///         println!("{} (/{})", code.as_str().unwrap_or("?"), result.prefix_len());
///     }
/// }
/// # Ok::<(), tinymmdb::MmdbError>(())
/// ```
pub struct Database {
    data: DatabaseStorage,
    header: MmdbHeader,
    metadata: Metadata,
    max_depth: usize,
}

impl Database {
    /// Open a database file using memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        DatabaseOptions::default().open(path)
    }

    /// Start building options for [`DatabaseOptions::open`]
    pub fn options() -> DatabaseOptions {
        DatabaseOptions::default()
    }

    /// Create a database from an in-memory image of a database file
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(DatabaseStorage::Owned(data), DEFAULT_MAX_DEPTH)
    }

    fn from_storage(storage: DatabaseStorage, max_depth: usize) -> Result<Self> {
        let data = storage.as_slice();
        let header = MmdbHeader::from_file(data)?;
        let metadata = Metadata::read(data, &header)?;
        debug!(
            bytes = data.len(),
            database_type = metadata.database_type.as_deref().unwrap_or(""),
            "database ready"
        );

        Ok(Self {
            data: storage,
            header,
            metadata,
            max_depth,
        })
    }

    /// Release the database
    ///
    /// Equivalent to dropping it. Borrowed lookup results cannot outlive the
    /// handle, so nothing can observe the released mapping.
    pub fn close(self) {
        drop(self);
    }

    /// Layout parameters parsed at open time
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// Decoded metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Entry for the raw metadata map, for dumping or path queries
    pub fn metadata_entry(&self) -> Entry<'_> {
        Entry {
            decoder: self.header.metadata_decoder(self.data.as_slice()),
            offset: 0,
            max_depth: self.max_depth,
        }
    }

    /// Look up an IP address
    pub fn lookup(&self, addr: IpAddr) -> Result<LookupResult<'_>> {
        let hit = self.tree().lookup(addr)?;
        Ok(self.result(hit))
    }

    /// Look up an IPv4 address
    pub fn lookup_v4(&self, addr: Ipv4Addr) -> Result<LookupResult<'_>> {
        let hit = self.tree().lookup_v4(addr)?;
        Ok(self.result(hit))
    }

    /// Look up an IPv6 address
    pub fn lookup_v6(&self, addr: Ipv6Addr) -> Result<LookupResult<'_>> {
        let hit = self.tree().lookup_v6(addr)?;
        Ok(self.result(hit))
    }

    /// Parse a literal IPv4 or IPv6 address and look it up
    pub fn lookup_str(&self, addr: &str) -> Result<LookupResult<'_>> {
        let ip: IpAddr = addr
            .trim()
            .parse()
            .map_err(|_| MmdbError::InvalidAddress(addr.to_string()))?;
        self.lookup(ip)
    }

    fn tree(&self) -> SearchTree<'_> {
        SearchTree::new(self.data.as_slice(), &self.header)
    }

    fn result(&self, hit: TrieHit) -> LookupResult<'_> {
        LookupResult {
            hit,
            decoder: self.header.data_decoder(self.data.as_slice()),
            max_depth: self.max_depth,
        }
    }
}

/// Outcome of a lookup: the matched prefix and, if found, its data
#[derive(Debug, Clone, Copy)]
pub struct LookupResult<'db> {
    hit: TrieHit,
    decoder: DataDecoder<'db>,
    max_depth: usize,
}

impl<'db> LookupResult<'db> {
    /// True if data is associated with the address
    pub fn is_found(&self) -> bool {
        self.hit.is_found()
    }

    /// Offset of the data in the data section; 0 when not found
    pub fn data_offset(&self) -> u32 {
        self.hit.data_offset
    }

    /// Prefix length of the network the address belongs to
    pub fn prefix_len(&self) -> u8 {
        self.hit.prefix_len
    }

    /// Entry for the address's data, `None` when not found
    pub fn entry(&self) -> Option<Entry<'db>> {
        self.is_found().then(|| Entry {
            decoder: self.decoder,
            offset: self.hit.data_offset,
            max_depth: self.max_depth,
        })
    }
}

/// A value in a database, by offset
///
/// Cheap to copy; borrows the database.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'db> {
    decoder: DataDecoder<'db>,
    offset: u32,
    max_depth: usize,
}

impl<'db> Entry<'db> {
    /// Offset of the value this entry refers to
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Value at a key path below this entry, `None` if the path does not exist
    ///
    /// Map keys match exactly; array positions are given as decimal strings.
    pub fn get_value<S: AsRef<str>>(&self, path: &[S]) -> Result<Option<Decoded<'db>>> {
        path::get_value(&self.decoder, self.offset, path)
    }

    /// Every value below this entry in preorder
    pub fn get_tree(&self) -> Result<Vec<Decoded<'db>>> {
        materialize(&self.decoder, self.offset, self.max_depth)
    }

    /// Re-root at a value previously returned from this entry
    ///
    /// Useful to run several path queries against one nested map.
    pub fn at(&self, value: &Decoded<'db>) -> Entry<'db> {
        Entry {
            offset: value.offset,
            ..*self
        }
    }
}
