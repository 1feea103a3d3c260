//! Local node fixtures.

use depot_core::PackageId;
use depot_core::config::TransportConfig;
use depot_metadata::{MembershipRepo, MetadataStore, SqliteStore};
use depot_storage::BlobStore;
use depot_transport::{CompletionHook, PeerClient, Transport};
use std::net::TcpListener;
use std::sync::Arc;
use tempfile::TempDir;

/// API key shared by every test node and peer.
pub const API_KEY: &str = "test-key";

/// Whether tests may open listening sockets.
#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Parse a package id.
#[allow(dead_code)]
pub fn pkg(id: &str) -> PackageId {
    PackageId::new(id).expect("valid package id")
}

/// Path of the peer transfer endpoint for `id`.
#[allow(dead_code)]
pub fn transfer_path(id: &str) -> String {
    format!("/capi/{API_KEY}/tran_pkg/{id}")
}

/// Deterministic test data.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;
    for chunk in data.chunks_mut(8) {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let bytes = state.to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
    data
}

/// A node with its own blob store, metadata store and membership view.
#[allow(dead_code)]
pub struct TestNode {
    pub transport: Transport,
    pub blobs: BlobStore,
    pub metadata: Arc<dyn MetadataStore>,
    pub membership: Arc<dyn MetadataStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestNode {
    /// Node with default transport settings and no completion hook.
    pub async fn new() -> Self {
        Self::with_config(TransportConfig::default(), None).await
    }

    /// Node with custom transport settings and hook.
    pub async fn with_config(
        config: TransportConfig,
        hook: Option<Arc<dyn CompletionHook>>,
    ) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let blobs = BlobStore::new(temp_dir.path().join("storage"))
            .await
            .expect("Failed to create blob store");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"))
                .await
                .expect("Failed to create metadata store"),
        );
        let membership: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("membership.db"))
                .await
                .expect("Failed to create membership store"),
        );
        let peers = PeerClient::new(API_KEY, &config).expect("Failed to build peer client");
        let transport = Transport::new(
            blobs.clone(),
            metadata.clone(),
            membership.clone(),
            peers,
            config,
            hook,
        );

        Self {
            transport,
            blobs,
            metadata,
            membership,
            _temp_dir: temp_dir,
        }
    }

    /// Record `node` as a holder of `id`.
    pub async fn add_holder(&self, id: &PackageId, node: &str) {
        self.membership
            .add_package_node(id, node)
            .await
            .expect("Failed to add holder");
    }
}
