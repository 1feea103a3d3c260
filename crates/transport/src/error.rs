//! Transport error types.

use depot_core::PackageId;
use depot_metadata::MetadataError;
use depot_storage::StorageError;
use std::sync::Arc;
use thiserror::Error;

/// Transfer errors.
///
/// Cloneable: one terminal error is delivered to every attached reader.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The package is already available locally; read the blob directly.
    #[error("package {0} is already local")]
    AlreadyLocal(PackageId),

    /// No cluster node is known to hold the package.
    #[error("no node holds package {0}")]
    NoHolder(PackageId),

    /// The peer request failed or returned a non-success status.
    #[error("fetch from {node} failed: {reason}")]
    PeerFetchFailed { node: String, reason: String },

    /// Local disk failure.
    #[error("local I/O error: {0}")]
    LocalIo(Arc<std::io::Error>),

    /// Metadata or membership store failure.
    #[error("store error: {0}")]
    Metadata(Arc<MetadataError>),

    /// The HTTP client could not be built.
    #[error("client configuration error: {0}")]
    Client(String),

    /// The transport no longer accepts new transfers.
    #[error("transport is shutting down")]
    ShuttingDown,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::LocalIo(Arc::new(err))
    }
}

impl From<StorageError> for TransportError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => TransportError::LocalIo(Arc::new(e)),
            StorageError::NotFound(what) => TransportError::LocalIo(Arc::new(
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("blob not found: {what}")),
            )),
            other => TransportError::LocalIo(Arc::new(std::io::Error::other(other.to_string()))),
        }
    }
}

impl From<MetadataError> for TransportError {
    fn from(err: MetadataError) -> Self {
        TransportError::Metadata(Arc::new(err))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;
