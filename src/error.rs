//! Error types for the bptstore storage engine
//!
//! Absent keys and duplicate inserts are ordinary return values, never errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Record or pool file I/O failed
    #[error("table I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Table header could not be encoded into the prelude
    #[error("header serialization failed: {0}")]
    Serialization(String),

    /// A node operation broke its fixed geometry
    #[error("node layout violated: {0}")]
    Index(String),

    /// Slot bytes that do not decode as the expected type
    #[error("undecodable slot data: {0}")]
    InvalidData(String),

    /// Bad configuration, or a table opened with the wrong shape
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Persisted state contradicts itself (bad magic, broken tree invariant)
    #[error("table corrupted: {0}")]
    Corruption(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
