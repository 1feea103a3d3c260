//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive tool failed ({status}): {stderr}")]
    Archive { status: String, stderr: String },

    #[error("meta.json is {size} bytes, limit is {max}")]
    MetaTooLarge { size: u64, max: u64 },

    #[error("meta.json is corrupt: {0}")]
    MetaCorrupt(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Map an I/O error, turning `NotFound` into [`StorageError::NotFound`] for `what`.
    pub(crate) fn from_io(err: std::io::Error, what: impl Into<String>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(what.into()),
            std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(what.into()),
            _ => StorageError::Io(err),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
