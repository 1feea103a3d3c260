//! Depot node binary.

use anyhow::{Context, Result};
use clap::Parser;
use depot_core::config::AppConfig;
use depot_core::unix_now;
use depot_metadata::MetadataStore;
use depot_server::{AppState, create_router};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Depot - a distributed package store node
#[derive(Parser, Debug)]
#[command(name = "depotd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "DEPOT_CONFIG",
        default_value = "config/depot.toml"
    )]
    config: String,
}

/// Purge expired rows from both stores every `interval`.
fn spawn_expiry_sweep(
    metadata: Arc<dyn MetadataStore>,
    membership: Arc<dyn MetadataStore>,
    interval: Duration,
) {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Expiry sweep enabled");
        loop {
            tokio::time::sleep(interval).await;
            let now = unix_now();

            for (name, store) in [("metadata", &metadata), ("membership", &membership)] {
                match store.purge_expired(now).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(store = name, purged, "Expired entries purged"),
                    Err(e) => {
                        tracing::error!(store = name, error = %e, "Failed to purge expired entries")
                    }
                }
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("Depot v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    // Check for DEPOT_ environment variables (excluding DEPOT_CONFIG which is just the path)
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("DEPOT_") && key != "DEPOT_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: depotd --config /path/to/depot.toml\n  \
             2. Environment variables: DEPOT_SERVER__BIND=0.0.0.0:8080 \
             DEPOT_SERVER__API_KEY=YOUR_KEY_HERE depotd\n\n\
             See config/depot.example.toml for example configuration.\n\
             Set DEPOT_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("DEPOT_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Register Prometheus metrics
    depot_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Initialize blob storage
    let blobs = depot_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    blobs
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(root = %blobs.root().display(), "Blob storage initialized");

    let archive = depot_storage::ArchiveTool::new(&config.storage.tar_path);
    if !archive.is_available().await {
        tracing::warn!(
            tar_path = %config.storage.tar_path.display(),
            "Archive tool not runnable; imports and transfer registration will fail"
        );
    }

    // Initialize key/value stores
    let metadata = depot_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("Metadata store initialized");

    let membership = depot_metadata::from_config(&config.membership)
        .await
        .context("failed to initialize membership store")?;
    membership
        .health_check()
        .await
        .context("membership store health check failed")?;
    tracing::info!("Membership store initialized");

    spawn_expiry_sweep(
        metadata.clone(),
        membership.clone(),
        config.package.expiry_sweep_interval(),
    );

    // Create application state
    let state = AppState::new(config.clone(), blobs, metadata, membership)
        .context("failed to initialize transport")?;
    tracing::info!(
        node_addr = %state.packages.node_addr,
        register_completed = config.transport.register_completed,
        "Transport initialized"
    );
    let transport = state.packages.transport.clone();

    // Create router
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Running transfers finish so their readers are not cut off.
    transport.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
