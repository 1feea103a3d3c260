//! Package entity: local lookup, import, export and peer transport.
//!
//! A [`Package`] is the handle request handlers use. It carries the stored
//! metadata and a shared [`PackageEnv`] with every store connection.

mod error;
mod registration;

pub use error::{PackageError, PackageResult};
pub use registration::LocalRegistration;

use depot_core::config::AppConfig;
use depot_core::{PackageId, PackageMeta, unix_now};
use depot_metadata::{MembershipRepo, MetadataStore, PackageRepo};
use depot_storage::{ArchiveTool, BlobStore, StorageError, load_meta, rewrite_meta};
use depot_transport::{CompletionHook, PackageReader, PeerClient, Transport, TransportResult};
use std::path::Path;
use std::sync::Arc;

/// Store connections and settings shared by every package handle.
pub struct PackageEnv {
    pub blobs: BlobStore,
    pub archive: ArchiveTool,
    /// Node-local metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Cluster-wide membership store.
    pub membership: Arc<dyn MetadataStore>,
    pub transport: Transport,
    /// Address recorded for this node in membership sets.
    pub node_addr: String,
    pub meta_max_size: u64,
    pub default_ttl_secs: u64,
}

impl PackageEnv {
    /// Wire up the archive tool, peer client and transport from configuration.
    ///
    /// Completed transfers are registered locally unless
    /// `transport.register_completed` is off.
    pub fn new(
        config: &AppConfig,
        blobs: BlobStore,
        metadata: Arc<dyn MetadataStore>,
        membership: Arc<dyn MetadataStore>,
    ) -> PackageResult<Self> {
        let archive = ArchiveTool::new(&config.storage.tar_path);
        let node_addr = config.server.advertised_addr().to_string();
        let peers = PeerClient::new(config.server.api_key.clone(), &config.transport)?;

        let hook: Option<Arc<dyn CompletionHook>> = if config.transport.register_completed {
            Some(Arc::new(LocalRegistration::new(
                blobs.clone(),
                archive.clone(),
                metadata.clone(),
                membership.clone(),
                node_addr.clone(),
                config.storage.meta_max_size,
            )))
        } else {
            tracing::warn!("Completed transfers will not be registered locally");
            None
        };

        let transport = Transport::new(
            blobs.clone(),
            metadata.clone(),
            membership.clone(),
            peers,
            config.transport.clone(),
            hook,
        );

        Ok(Self {
            blobs,
            archive,
            metadata,
            membership,
            transport,
            node_addr,
            meta_max_size: config.storage.meta_max_size,
            default_ttl_secs: config.package.default_ttl_secs,
        })
    }
}

/// A package known by id, with the metadata stored for it.
#[derive(Clone)]
pub struct Package {
    id: PackageId,
    /// Principal that imported the package; empty until import.
    pub owner_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    env: Arc<PackageEnv>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Package {
    /// Handle with no metadata yet: empty owner, zero timestamps.
    pub fn create(id: PackageId, env: Arc<PackageEnv>) -> Self {
        Self {
            id,
            owner_id: String::new(),
            created_at: 0,
            expires_at: 0,
            env,
        }
    }

    /// Load the package from the local metadata store.
    pub async fn get(id: PackageId, env: Arc<PackageEnv>) -> PackageResult<Self> {
        let json = env
            .metadata
            .get_package_meta(&id)
            .await?
            .ok_or_else(|| PackageError::NotFound(id.clone()))?;

        let meta = PackageMeta::from_json(&json).map_err(|e| PackageError::MetadataCorrupt {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        let mut package = Self::create(id, env);
        package.apply(meta);
        Ok(package)
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    /// Current metadata as stored.
    pub fn meta(&self) -> PackageMeta {
        PackageMeta {
            owner_id: self.owner_id.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    fn apply(&mut self, meta: PackageMeta) {
        self.owner_id = meta.owner_id;
        self.created_at = meta.created_at;
        self.expires_at = meta.expires_at;
    }

    /// Import an uploaded archive as this package, owned by `owner_id`.
    ///
    /// The archive is unpacked to the staging directory, its `meta.json` is
    /// stamped and repacked into the blob, then the metadata and this node's
    /// membership are recorded. The staging directory is always removed;
    /// on failure the blob is removed too and the handle is left unchanged.
    pub async fn import(&mut self, archive_path: &Path, owner_id: &str) -> PackageResult<()> {
        let env = self.env.clone();
        let staging = env.blobs.create_staging(&self.id).await?;

        let result = self.import_staged(archive_path, &staging, owner_id).await;

        if let Err(e) = env.blobs.remove_staging(&self.id).await {
            tracing::warn!(package_id = %self.id, error = %e, "Failed to remove staging directory");
        }

        match result {
            Ok(meta) => {
                tracing::info!(
                    package_id = %self.id,
                    owner_id = %meta.owner_id,
                    expires_at = meta.expires_at,
                    "Package imported"
                );
                self.apply(meta);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(package_id = %self.id, error = %err, "Package import failed");
                if let Err(e) = env.blobs.remove_blob(&self.id).await {
                    tracing::error!(package_id = %self.id, error = %e, "Failed to remove blob");
                }
                Err(err)
            }
        }
    }

    async fn import_staged(
        &self,
        archive_path: &Path,
        staging: &Path,
        owner_id: &str,
    ) -> PackageResult<PackageMeta> {
        let env = &self.env;
        env.archive.decompress(archive_path, staging).await?;

        let raw = load_meta(staging, env.meta_max_size)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    StorageError::MetaCorrupt("archive has no meta.json".to_string())
                }
                other => other,
            })?;
        let created_at = unix_now();
        let expires_at = match raw.get("expires_at").and_then(serde_json::Value::as_i64) {
            Some(ts) if ts > 0 => ts,
            _ => created_at.saturating_add(env.default_ttl_secs as i64),
        };
        let meta = PackageMeta {
            owner_id: owner_id.to_string(),
            created_at,
            expires_at,
        };

        rewrite_meta(staging, env.meta_max_size, &self.id, &meta).await?;
        env.archive
            .compress(staging, &env.blobs.blob_path(&self.id))
            .await?;

        registration::persist(
            env.metadata.as_ref(),
            env.membership.as_ref(),
            &env.node_addr,
            &self.id,
            &meta,
        )
        .await?;

        Ok(meta)
    }

    /// Path the blob is served under, relative to the storage root.
    pub fn export_path(&self) -> String {
        self.id.export_path()
    }

    /// Get a streaming reader on the package fetched from a peer.
    pub async fn transport(&self) -> TransportResult<PackageReader> {
        self.env.transport.acquire(&self.id).await
    }
}

/// Forget the package on this node: drop its metadata and remove this node
/// from its holders. Best effort; failures are only logged.
pub async fn clean(id: &PackageId, env: &PackageEnv) {
    if let Err(e) = env.metadata.delete_package(id).await {
        tracing::warn!(package_id = %id, error = %e, "Failed to delete package metadata");
    }
    if let Err(e) = env.membership.remove_package_node(id, &env.node_addr).await {
        tracing::warn!(package_id = %id, error = %e, "Failed to remove package holder");
    }
    tracing::info!(package_id = %id, "Package cleaned");
}
