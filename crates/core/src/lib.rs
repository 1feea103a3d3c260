//! Core domain types and shared logic for the depot package store.
//!
//! This crate defines the data model shared by every other crate:
//! - Package identifiers and their on-disk naming
//! - Package metadata as persisted in the metadata store
//! - Node configuration

pub mod config;
pub mod error;
pub mod package;

pub use error::{Error, Result};
pub use package::{PackageId, PackageMeta, unix_now};

/// Size of one transfer chunk: 64 KiB
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound for an embedded `meta.json`: 64 KiB
pub const DEFAULT_META_MAX_SIZE: u64 = 64 * 1024;

/// Name of the metadata file embedded in every package archive.
pub const META_FILE_NAME: &str = "meta.json";
