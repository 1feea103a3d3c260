//! Prometheus metrics for the depot node.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! It must be network-restricted to the scrapers.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Import metrics
pub static PACKAGES_IMPORTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_packages_imported_total",
        "Total number of packages imported from uploads",
    )
    .expect("metric creation failed")
});

pub static PACKAGE_IMPORT_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_package_import_failures_total",
        "Total number of failed package imports",
    )
    .expect("metric creation failed")
});

pub static PACKAGE_IMPORT_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "depot_package_import_duration_seconds",
            "Time taken to unpack, stamp, repack and register an upload",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("metric creation failed")
});

// Read metrics
pub static LOCAL_READS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_local_reads_total",
        "Total number of client reads served from a local blob",
    )
    .expect("metric creation failed")
});

pub static TRANSPORT_READS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_transport_reads_total",
        "Total number of client reads served from a peer transfer",
    )
    .expect("metric creation failed")
});

pub static TRANSPORT_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "depot_transport_errors_total",
            "Total transfer acquisition errors by error type",
        ),
        &["error_type"],
    )
    .expect("metric creation failed")
});

pub static PACKAGES_REGISTERED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_transferred_packages_registered_total",
        "Total number of transferred packages registered as local",
    )
    .expect("metric creation failed")
});

// Peer endpoint
pub static PEER_SERVES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_peer_serves_total",
        "Total number of blobs served to other nodes",
    )
    .expect("metric creation failed")
});

// Current state gauges
pub static ACTIVE_TRANSFERS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "depot_active_transfers",
        "Current number of in-flight peer transfers",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests may build any number of routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(PACKAGES_IMPORTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGE_IMPORT_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGE_IMPORT_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(LOCAL_READS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TRANSPORT_READS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TRANSPORT_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGES_REGISTERED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PEER_SERVES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACTIVE_TRANSFERS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    ACTIVE_TRANSFERS.set(state.packages.transport.active_transfers().await as i64);

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a failed transfer acquisition by type.
pub fn record_transport_error(error_type: &str) {
    TRANSPORT_ERRORS.with_label_values(&[error_type]).inc();
}
