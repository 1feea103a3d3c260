//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use depot_core::PackageId;
use depot_core::config::AppConfig;
use depot_metadata::{MetadataStore, PackageRepo};
use depot_server::{AppState, create_router};
use depot_storage::BlobStore;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// API key of every test server.
#[allow(dead_code)]
pub const API_KEY: &str = "test-key";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::for_testing(temp_dir.path());
        modifier(&mut config);

        let blobs = BlobStore::new(&config.storage.root)
            .await
            .expect("Failed to create blob store");
        let metadata = depot_metadata::from_config(&config.metadata)
            .await
            .expect("Failed to create metadata store");
        let membership = depot_metadata::from_config(&config.membership)
            .await
            .expect("Failed to create membership store");

        depot_server::metrics::register_metrics();
        let state = AppState::new(config, blobs, metadata, membership)
            .expect("Failed to create application state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Start a server listening on localhost that shares `membership_db`
    /// and advertises its real address.
    pub async fn start_node(membership_db: &Path, register_completed: bool) -> (Self, SocketAddr) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let membership_db = membership_db.to_path_buf();
        let server = Self::with_config(move |config| {
            config.server.node_addr = Some(addr.to_string());
            config.membership = depot_core::config::StoreConfig::Sqlite {
                path: membership_db,
            };
            config.transport.register_completed = register_completed;
        })
        .await;

        let router = server.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server failed");
        });

        (server, addr)
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.packages.metadata.clone()
    }

    pub fn membership(&self) -> Arc<dyn MetadataStore> {
        self.state.packages.membership.clone()
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.state.packages.blobs
    }

    pub fn temp_path(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Store `data` as a local package blob with live metadata.
    pub async fn seed_local(&self, id: &PackageId, data: &[u8]) {
        std::fs::write(self.blobs().blob_path(id), data).expect("Failed to write blob");
        self.metadata()
            .put_package_meta(
                id,
                r#"{"owner_id":"seed","created_at":1700000000,"expires_at":4102444800}"#,
            )
            .await
            .expect("Failed to store metadata");
    }

    /// Send a request and return status plus raw body.
    pub async fn request(&self, method: &str, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body_bytes.to_vec())
    }

    /// Send a request and parse the body as JSON (`Null` when empty).
    pub async fn json_request(&self, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let (status, body) = self.request(method, uri, body).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

/// Path of an API endpoint under this server's key.
#[allow(dead_code)]
pub fn capi(path: &str) -> String {
    format!("/capi/{API_KEY}{path}")
}
