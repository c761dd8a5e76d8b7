//! Error types for database access.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by database and directory operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// The database file does not exist or cannot be stat'd.
    #[error("database file not found: {}", path.display())]
    FileNotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// An I/O operation on the backing file failed.
    #[error("{op} failed on {}: {source}", path.display())]
    Io {
        /// Operation being performed.
        op: &'static str,
        /// Backing file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Name lookup miss.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A directory entry with this name already exists.
    #[error("duplicate object name: {0}")]
    Duplicate(String),

    /// Mutation attempted on a read-only database.
    #[error("{op}: database is read-only")]
    ReadOnly {
        /// Operation that was rejected.
        op: &'static str,
    },

    /// Object name is not acceptable for the directory.
    #[error("invalid object name {name:?}: {reason}")]
    InvalidName {
        /// Offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The on-disk record at `offset` could not be parsed.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt {
        /// Byte offset of the record.
        offset: u64,
        /// Description of the problem.
        reason: String,
    },

    /// The entry is a placeholder with no on-disk record.
    #[error("object {0} has no database record")]
    Phony(String),

    /// The directory key no longer refers to a live entry.
    #[error("stale directory entry")]
    StaleEntry,

    /// A previous scan failed; the handle must be closed.
    #[error("database handle is unusable after a failed scan")]
    Unusable,
}

/// Errors raised while decoding a record body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Ran out of bytes.
    #[error("body truncated: need {need} bytes at {at}, have {have}")]
    Truncated {
        /// Bytes requested.
        need: usize,
        /// Read position.
        at: usize,
        /// Total body length.
        have: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("string field at {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    /// Bytes left over after the last field.
    #[error("{0} trailing bytes after body")]
    Trailing(usize),

    /// A field holds a value outside its domain.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;
