//! Package metadata repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use depot_core::PackageId;

/// Repository for per-package metadata records (`PACKAGE@<id>`).
///
/// Expired records read as absent.
#[async_trait]
pub trait PackageRepo: Send + Sync {
    /// Get the serialized metadata of a package.
    async fn get_package_meta(&self, id: &PackageId) -> MetadataResult<Option<String>>;

    /// Store the serialized metadata of a package. A live record keeps its expiry.
    async fn put_package_meta(&self, id: &PackageId, meta_json: &str) -> MetadataResult<()>;

    /// Check whether a live metadata record exists.
    async fn package_exists(&self, id: &PackageId) -> MetadataResult<bool>;

    /// Set the record to expire at `expires_at` (unix seconds).
    ///
    /// Returns false if no live record exists.
    async fn expire_package_at(&self, id: &PackageId, expires_at: i64) -> MetadataResult<bool>;

    /// Delete the metadata record. Returns false if there was nothing to delete.
    async fn delete_package(&self, id: &PackageId) -> MetadataResult<bool>;
}
