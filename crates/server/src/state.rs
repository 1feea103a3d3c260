//! Application state shared across handlers.

use crate::package::{PackageEnv, PackageResult};
use depot_core::config::AppConfig;
use depot_metadata::MetadataStore;
use depot_storage::BlobStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Stores, archive tool and transport used by package handles.
    pub packages: Arc<PackageEnv>,
}

impl AppState {
    /// Create the state, wiring the transport from `config`.
    pub fn new(
        config: AppConfig,
        blobs: BlobStore,
        metadata: Arc<dyn MetadataStore>,
        membership: Arc<dyn MetadataStore>,
    ) -> PackageResult<Self> {
        let packages = PackageEnv::new(&config, blobs, metadata, membership)?;
        Ok(Self {
            config: Arc::new(config),
            packages: Arc::new(packages),
        })
    }

    /// Whether `key` is this node's API key.
    pub fn api_key_matches(&self, key: &str) -> bool {
        self.config.server.api_key == key
    }
}
