//! Package entity errors.

use depot_core::PackageId;
use depot_metadata::MetadataError;
use depot_storage::StorageError;
use depot_transport::TransportError;
use thiserror::Error;

/// Errors from package lookup, import and transport.
#[derive(Debug, Error)]
pub enum PackageError {
    /// No local metadata for the package.
    #[error("package not found: {0}")]
    NotFound(PackageId),

    /// Stored metadata could not be parsed. Not repaired automatically.
    #[error("metadata of package {id} is corrupt: {reason}")]
    MetadataCorrupt { id: PackageId, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for package operations.
pub type PackageResult<T> = std::result::Result<T, PackageError>;
