//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Address other nodes use to reach this one. Recorded in the
    /// membership store; defaults to `bind`.
    #[serde(default)]
    pub node_addr: Option<String>,
    /// Key expected in `/capi/<api-key>/...` paths.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_api_key() -> String {
    "depot".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            node_addr: None,
            api_key: default_api_key(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Address advertised to the cluster.
    pub fn advertised_addr(&self) -> &str {
        self.node_addr.as_deref().unwrap_or(&self.bind)
    }

    /// Validate server configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("server.api_key cannot be empty".to_string());
        }
        if self.api_key.contains('/') {
            return Err("server.api_key cannot contain '/'".to_string());
        }
        if self.advertised_addr().is_empty() {
            return Err("server.node_addr cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Blob storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root; blobs live under `<root>/package/`.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// External archive tool used to pack and unpack packages.
    #[serde(default = "default_tar_path")]
    pub tar_path: PathBuf,
    /// Maximum size of an embedded `meta.json` in bytes.
    #[serde(default = "default_meta_max_size")]
    pub meta_max_size: u64,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/storage")
}

fn default_tar_path() -> PathBuf {
    PathBuf::from("tar")
}

fn default_meta_max_size() -> u64 {
    crate::DEFAULT_META_MAX_SIZE
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            tar_path: default_tar_path(),
            meta_max_size: default_meta_max_size(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.meta_max_size == 0 {
            return Err("storage.meta_max_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Key/value store backend configuration.
///
/// Used for both the node-local metadata store and the cluster-wide
/// membership store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// SQLite database file.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl StoreConfig {
    fn sqlite(path: &str) -> Self {
        Self::Sqlite {
            path: PathBuf::from(path),
        }
    }

    /// Default node-local metadata store.
    pub fn default_metadata() -> Self {
        Self::sqlite("./data/metadata.db")
    }

    /// Default membership store.
    pub fn default_membership() -> Self {
        Self::sqlite("./data/membership.db")
    }
}

/// Peer transport configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Bytes read from a peer response per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// TCP connect timeout for peer requests in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Extra attempts after a failed peer selection or fetch start (default: 0).
    /// Each attempt re-runs random peer selection.
    #[serde(default)]
    pub peer_retries: u32,
    /// Initial delay between attempts in milliseconds; doubled per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Register completed transfers as locally available (default: true).
    #[serde(default = "default_register_completed")]
    pub register_completed: bool,
}

fn default_chunk_size() -> usize {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_register_completed() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            peer_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            register_completed: default_register_completed(),
        }
    }
}

impl TransportConfig {
    /// Peer connect timeout as a Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    /// Validate transport configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("transport.chunk_size must be greater than 0".to_string());
        }
        if self.connect_timeout_secs == 0 {
            return Err("transport.connect_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Package lifecycle configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Lifetime given to imported packages whose `meta.json` has no expiry.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Interval between sweeps that purge expired store entries.
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 3600 // 7 days
}

fn default_expiry_sweep_interval_secs() -> u64 {
    300 // 5 minutes
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
        }
    }
}

impl PackageConfig {
    /// Get the expiry sweep interval as a Duration.
    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }

    /// Validate package configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_secs > i64::MAX as u64 {
            return Err(format!(
                "package.default_ttl_secs {} exceeds maximum value {}",
                self.default_ttl_secs,
                i64::MAX
            ));
        }
        // tokio::time::interval panics on a zero period
        if self.expiry_sweep_interval_secs == 0 {
            return Err("package.expiry_sweep_interval_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Node-local metadata store.
    #[serde(default = "StoreConfig::default_metadata")]
    pub metadata: StoreConfig,
    /// Cluster-wide membership store.
    #[serde(default = "StoreConfig::default_membership")]
    pub membership: StoreConfig,
    /// Peer transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Package lifecycle configuration.
    #[serde(default)]
    pub package: PackageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            metadata: StoreConfig::default_metadata(),
            membership: StoreConfig::default_membership(),
            transport: TransportConfig::default(),
            package: PackageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.transport.validate()?;
        self.package.validate()?;
        Ok(())
    }

    /// Configuration for tests, with every path under `dir`.
    pub fn for_testing(dir: &Path) -> Self {
        Self {
            server: ServerConfig {
                api_key: "test-key".to_string(),
                ..Default::default()
            },
            storage: StorageConfig {
                root: dir.join("storage"),
                ..Default::default()
            },
            metadata: StoreConfig::Sqlite {
                path: dir.join("metadata.db"),
            },
            membership: StoreConfig::Sqlite {
                path: dir.join("membership.db"),
            },
            transport: TransportConfig::default(),
            package: PackageConfig::default(),
        }
    }
}
