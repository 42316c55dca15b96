/// Error types for the tinymmdb library
use std::collections::TryReserveError;
use std::fmt;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, MmdbError>;

/// Main error type for opening and reading databases
///
/// "Not found" is never an error: lookups and path queries report it as
/// `Ok(None)` or a zero data offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmdbError {
    /// The database file could not be opened
    OpenFile(String),

    /// Not a MaxMind DB: marker missing, mapping failed or metadata malformed
    InvalidDatabase(String),

    /// The binary format major version is not 2
    UnsupportedFormat {
        /// `binary_format_major_version` found in the metadata
        major: u32,
        /// `binary_format_minor_version` found in the metadata
        minor: u32,
    },

    /// The search tree or data section contains an invalid reference or encoding
    CorruptDatabase(String),

    /// Allocation failed while materializing a value tree
    OutOfMemory(String),

    /// A lookup string is not a literal IPv4 or IPv6 address
    InvalidAddress(String),
}

impl MmdbError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        MmdbError::CorruptDatabase(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MmdbError::InvalidDatabase(msg.into())
    }
}

impl fmt::Display for MmdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmdbError::OpenFile(msg) => write!(f, "Cannot open database: {}", msg),
            MmdbError::InvalidDatabase(msg) => write!(f, "Invalid database: {}", msg),
            MmdbError::UnsupportedFormat { major, minor } => write!(
                f,
                "Unsupported database format version {}.{} (expected 2.x)",
                major, minor
            ),
            MmdbError::CorruptDatabase(msg) => write!(f, "Corrupt database: {}", msg),
            MmdbError::OutOfMemory(msg) => write!(f, "Out of memory: {}", msg),
            MmdbError::InvalidAddress(addr) => write!(f, "Invalid IP address: {}", addr),
        }
    }
}

impl std::error::Error for MmdbError {}

impl From<std::io::Error> for MmdbError {
    fn from(err: std::io::Error) -> Self {
        MmdbError::OpenFile(err.to_string())
    }
}

impl From<TryReserveError> for MmdbError {
    fn from(err: TryReserveError) -> Self {
        MmdbError::OutOfMemory(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = MmdbError::UnsupportedFormat { major: 3, minor: 1 };
        assert_eq!(
            err.to_string(),
            "Unsupported database format version 3.1 (expected 2.x)"
        );

        let err = MmdbError::corrupt("offset 99 out of bounds");
        assert_eq!(err.to_string(), "Corrupt database: offset 99 out of bounds");
    }

    #[test]
    fn test_io_error_maps_to_open_file() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: MmdbError = io.into();
        assert!(matches!(err, MmdbError::OpenFile(_)));
    }
}
