//! Recording packages as available on this node.

use super::error::{PackageError, PackageResult};
use async_trait::async_trait;
use depot_core::{PackageId, PackageMeta};
use depot_metadata::{MembershipRepo, MetadataStore, PackageRepo};
use depot_storage::{ArchiveTool, BlobStore, load_meta};
use depot_transport::{CompletionHook, HookError};
use std::path::Path;
use std::sync::Arc;

/// Persist `meta` for `id` and add `node` to its holders, both expiring at
/// `meta.expires_at`.
pub(crate) async fn persist(
    metadata: &dyn MetadataStore,
    membership: &dyn MetadataStore,
    node: &str,
    id: &PackageId,
    meta: &PackageMeta,
) -> PackageResult<()> {
    let json = meta.to_json().map_err(|e| PackageError::MetadataCorrupt {
        id: id.clone(),
        reason: e.to_string(),
    })?;

    metadata.put_package_meta(id, &json).await?;
    metadata.expire_package_at(id, meta.expires_at).await?;
    membership.add_package_node(id, node).await?;
    membership.expire_package_nodes_at(id, meta.expires_at).await?;

    tracing::debug!(
        package_id = %id,
        node = %node,
        expires_at = meta.expires_at,
        "Package registered"
    );
    Ok(())
}

/// Completion hook that registers a fetched blob as local.
///
/// The blob is unpacked to its staging directory only to read the stamped
/// `meta.json`; the archive itself is kept as fetched.
pub struct LocalRegistration {
    blobs: BlobStore,
    archive: ArchiveTool,
    metadata: Arc<dyn MetadataStore>,
    membership: Arc<dyn MetadataStore>,
    node_addr: String,
    meta_max_size: u64,
}

impl LocalRegistration {
    pub fn new(
        blobs: BlobStore,
        archive: ArchiveTool,
        metadata: Arc<dyn MetadataStore>,
        membership: Arc<dyn MetadataStore>,
        node_addr: impl Into<String>,
        meta_max_size: u64,
    ) -> Self {
        Self {
            blobs,
            archive,
            metadata,
            membership,
            node_addr: node_addr.into(),
            meta_max_size,
        }
    }

    async fn register(&self, id: &PackageId, blob_path: &Path, staging: &Path) -> PackageResult<()> {
        self.archive.decompress(blob_path, staging).await?;
        let raw = load_meta(staging, self.meta_max_size).await?;
        let meta: PackageMeta = serde_json::from_value(serde_json::Value::Object(raw)).map_err(
            |e| PackageError::MetadataCorrupt {
                id: id.clone(),
                reason: e.to_string(),
            },
        )?;
        if meta.expires_at <= 0 {
            return Err(PackageError::MetadataCorrupt {
                id: id.clone(),
                reason: "meta.json carries no expiry".to_string(),
            });
        }

        persist(
            self.metadata.as_ref(),
            self.membership.as_ref(),
            &self.node_addr,
            id,
            &meta,
        )
        .await
    }
}

#[async_trait]
impl CompletionHook for LocalRegistration {
    async fn on_complete(&self, id: &PackageId, blob_path: &Path) -> Result<(), HookError> {
        // A directory left by a crashed registration would block this one.
        self.blobs.remove_staging(id).await?;
        let staging = self.blobs.create_staging(id).await?;

        let result = self.register(id, blob_path, &staging).await;
        if let Err(e) = self.blobs.remove_staging(id).await {
            tracing::warn!(package_id = %id, error = %e, "Failed to remove staging directory");
        }

        result?;
        crate::metrics::PACKAGES_REGISTERED.inc();
        tracing::info!(package_id = %id, "Transferred package registered locally");
        Ok(())
    }
}
