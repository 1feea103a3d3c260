//! Database models and key naming for the store schema.

use depot_core::PackageId;
use sqlx::FromRow;

/// Key prefix of a package's metadata record.
pub const PACKAGE_KEY_PREFIX: &str = "PACKAGE@";

/// Key prefix of the set of nodes holding a package.
pub const PKG_NODE_KEY_PREFIX: &str = "PKG_NODE@";

/// Key of the metadata record for `id` (`PACKAGE@<id>`).
pub fn package_key(id: &PackageId) -> String {
    format!("{PACKAGE_KEY_PREFIX}{id}")
}

/// Key of the membership set for `id` (`PKG_NODE@<id>`).
pub fn package_nodes_key(id: &PackageId) -> String {
    format!("{PKG_NODE_KEY_PREFIX}{id}")
}

/// Package metadata record.
#[derive(Debug, Clone, FromRow)]
pub struct PackageMetaRow {
    pub key: String,
    /// Serialized `PackageMeta` JSON.
    pub meta: String,
    /// Unix timestamp at which the record stops being visible.
    pub expires_at: Option<i64>,
}

/// One member of a package's node set.
#[derive(Debug, Clone, FromRow)]
pub struct PackageNodeRow {
    pub key: String,
    pub node: String,
}
