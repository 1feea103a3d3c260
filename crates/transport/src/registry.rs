//! Process-wide table of in-flight transfers.

use crate::error::{TransportError, TransportResult};
use crate::peer::PeerClient;
use crate::port::TransferPort;
use crate::reader::PackageReader;
use crate::worker;
use async_trait::async_trait;
use depot_core::PackageId;
use depot_core::config::TransportConfig;
use depot_metadata::{MembershipRepo, MetadataStore, PackageRepo};
use depot_storage::BlobStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

/// Error returned by a [`CompletionHook`].
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Runs after a transfer completed, before its port leaves the registry.
///
/// Used to record the fetched blob as locally available, so the next
/// `acquire` for the same package is answered with `AlreadyLocal`.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    /// Called with the complete blob at `blob_path`.
    async fn on_complete(&self, id: &PackageId, blob_path: &Path) -> Result<(), HookError>;
}

/// Registry state shared with workers.
pub(crate) struct Shared {
    /// One lock for the whole table.
    pub(crate) ports: Mutex<Registry>,
    pub(crate) blobs: BlobStore,
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) membership: Arc<dyn MetadataStore>,
    pub(crate) peers: PeerClient,
    pub(crate) config: TransportConfig,
    pub(crate) hook: Option<Arc<dyn CompletionHook>>,
    pub(crate) tasks: TaskTracker,
}

#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) ports: HashMap<PackageId, Arc<TransferPort>>,
    pub(crate) closed: bool,
}

impl Shared {
    /// Pick a random holder of `id`.
    pub(crate) async fn select_peer(&self, id: &PackageId) -> TransportResult<String> {
        self.membership
            .random_package_node(id)
            .await?
            .ok_or_else(|| TransportError::NoHolder(id.clone()))
    }

    /// Remove `port` from the table, deleting its blob if asked, in one critical section.
    pub(crate) async fn retire(&self, port: &Arc<TransferPort>, remove_blob: bool) {
        let mut registry = self.ports.lock().await;
        let id = port.package_id();
        if registry
            .ports
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, port))
        {
            registry.ports.remove(id);
        }
        if remove_blob && let Err(e) = self.blobs.remove_blob(id).await {
            tracing::error!(package_id = %id, error = %e, "Failed to remove blob");
        }
        tracing::debug!(package_id = %id, remove_blob, "Transfer retired");
    }
}

/// Coalesces concurrent requests for missing packages into one peer fetch
/// per package, and hands out streaming readers on the growing blob.
#[derive(Clone)]
pub struct Transport {
    shared: Arc<Shared>,
}

impl Transport {
    /// Create a transport.
    ///
    /// `metadata` answers whether a package is local; `membership` names
    /// the nodes holding it.
    pub fn new(
        blobs: BlobStore,
        metadata: Arc<dyn MetadataStore>,
        membership: Arc<dyn MetadataStore>,
        peers: PeerClient,
        config: TransportConfig,
        hook: Option<Arc<dyn CompletionHook>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                ports: Mutex::new(Registry::default()),
                blobs,
                metadata,
                membership,
                peers,
                config,
                hook,
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Get a reader on `id`, starting a peer fetch unless one is running.
    ///
    /// Fails with [`TransportError::AlreadyLocal`] if the package is local
    /// and with [`TransportError::NoHolder`] if no node holds it.
    pub async fn acquire(&self, id: &PackageId) -> TransportResult<PackageReader> {
        let shared = &self.shared;
        let mut registry = shared.ports.lock().await;

        if let Some(port) = registry.ports.get(id).cloned() {
            let file = shared.blobs.open_read(id).await?;
            drop(registry);
            tracing::debug!(
                package_id = %id,
                written = port.written_size(),
                "Reader attached to running transfer"
            );
            return Ok(PackageReader::new(file, port));
        }

        if registry.closed {
            return Err(TransportError::ShuttingDown);
        }
        if shared.metadata.package_exists(id).await? {
            return Err(TransportError::AlreadyLocal(id.clone()));
        }
        let node = shared.select_peer(id).await?;

        shared.blobs.create_empty(id).await?;
        let port = Arc::new(TransferPort::new(id.clone(), shared.blobs.blob_path(id)));
        let file = match shared.blobs.open_read(id).await {
            Ok(file) => file,
            Err(e) => {
                let _ = shared.blobs.remove_blob(id).await;
                return Err(e.into());
            }
        };
        registry.ports.insert(id.clone(), port.clone());
        drop(registry);

        tracing::info!(package_id = %id, node = %node, "Transfer started");
        shared
            .tasks
            .spawn(worker::run(shared.clone(), port.clone(), node));

        Ok(PackageReader::new(file, port))
    }

    /// Number of transfers in the table.
    pub async fn active_transfers(&self) -> usize {
        self.shared.ports.lock().await.ports.len()
    }

    /// Whether a transfer for `id` is in the table.
    pub async fn is_transferring(&self, id: &PackageId) -> bool {
        self.shared.ports.lock().await.ports.contains_key(id)
    }

    /// Wait until every spawned worker has exited.
    pub async fn wait_idle(&self) {
        let tasks = &self.shared.tasks;
        tasks.close();
        tasks.wait().await;
        if !self.shared.ports.lock().await.closed {
            tasks.reopen();
        }
    }

    /// Stop accepting new transfers and wait for running ones to finish.
    ///
    /// Readers may still attach to transfers that are running.
    pub async fn shutdown(&self) {
        let running = {
            let mut registry = self.shared.ports.lock().await;
            registry.closed = true;
            registry.ports.len()
        };
        tracing::info!(running, "Transport shutting down");
        self.shared.tasks.close();
        self.shared.tasks.wait().await;
    }
}
