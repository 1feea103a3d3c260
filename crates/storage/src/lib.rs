//! Local blob storage for the depot package store.
//!
//! This crate provides:
//! - The on-disk layout of package blobs and their staging directories
//! - File lifecycle operations used by imports and peer transfers
//! - Calls to the external archive tool
//! - Reading and rewriting the `meta.json` embedded in every package

pub mod archive;
pub mod blob;
pub mod error;
pub mod meta_file;

pub use archive::ArchiveTool;
pub use blob::{BlobStore, ByteStream};
pub use error::{StorageError, StorageResult};
pub use meta_file::{MetaObject, load_meta, rewrite_meta};

use depot_core::config::StorageConfig;

/// Create a blob store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<BlobStore> {
    config.validate().map_err(StorageError::Config)?;
    BlobStore::new(&config.root).await
}
