//! Depot package store node.
//!
//! This crate provides the node itself:
//! - The package entity (lookup, import, export, peer transport, clean)
//! - Registration of packages fetched from peers
//! - The `/capi/{api_key}` HTTP API and the peer transfer endpoint
//! - Prometheus metrics

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod package;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use package::{Package, PackageEnv, PackageError, PackageResult};
pub use routes::create_router;
pub use state::AppState;
