//! Metadata and membership stores for the depot package store.
//!
//! Two logical stores share one interface:
//! - The node-local metadata store holds `PACKAGE@<id>` records
//! - The cluster-wide membership store holds `PKG_NODE@<id>` sets
//!
//! Both behave like a key/value store with per-key expiry.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use repos::{MembershipRepo, PackageRepo};
pub use store::{MetadataStore, SqliteStore};

use depot_core::config::StoreConfig;
use std::sync::Arc;

/// Create a store from configuration.
pub async fn from_config(config: &StoreConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
