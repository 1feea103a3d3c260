//! Cluster membership repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use depot_core::PackageId;

/// Repository for the set of node addresses holding each package (`PKG_NODE@<id>`).
///
/// An expiry applies to the whole set. An expired set reads as empty.
#[async_trait]
pub trait MembershipRepo: Send + Sync {
    /// Add `node` to the set of holders.
    async fn add_package_node(&self, id: &PackageId, node: &str) -> MetadataResult<()>;

    /// Remove `node` from the set of holders. Returns false if it was not a member.
    async fn remove_package_node(&self, id: &PackageId, node: &str) -> MetadataResult<bool>;

    /// Pick one holder uniformly at random.
    async fn random_package_node(&self, id: &PackageId) -> MetadataResult<Option<String>>;

    /// Set the whole set to expire at `expires_at` (unix seconds).
    ///
    /// Returns false if the set is empty.
    async fn expire_package_nodes_at(&self, id: &PackageId, expires_at: i64)
    -> MetadataResult<bool>;

    /// List all holders, sorted.
    async fn list_package_nodes(&self, id: &PackageId) -> MetadataResult<Vec<String>>;
}
