//! Package identifiers and metadata.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use time::OffsetDateTime;

/// Maximum length of a package id.
const MAX_ID_LEN: usize = 128;

/// Identity key of a package blob.
///
/// Ids are restricted to `[A-Za-z0-9_-]` so every path derived from them
/// stays inside the storage root.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    /// Create from a string, validating format.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_ID_LEN {
            return Err(crate::Error::InvalidPackageId(format!(
                "package id must be 1..={MAX_ID_LEN} chars, got {}",
                id.len()
            )));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(crate::Error::InvalidPackageId(format!(
                "invalid character in package id: {c:?}"
            )));
        }
        Ok(Self(id))
    }

    /// Generate a fresh id: the hex SHA-256 of a random UUID.
    pub fn generate() -> Self {
        let token = uuid::Uuid::new_v4().to_string();
        Self(hex::encode(Sha256::digest(token.as_bytes())))
    }

    /// Get the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the compressed blob (`<id>.tar.xz`).
    pub fn blob_file_name(&self) -> String {
        format!("{}.tar.xz", self.0)
    }

    /// Externally servable path of the blob, relative to the storage root.
    pub fn export_path(&self) -> String {
        format!("/package/{}", self.blob_file_name())
    }
}

impl TryFrom<String> for PackageId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

impl std::str::FromStr for PackageId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageId({self})")
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata persisted for every locally available package.
///
/// `owner_id` stays empty and both timestamps stay 0 until the package is
/// imported.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMeta {
    /// Principal that imported the package.
    #[serde(default)]
    pub owner_id: String,
    /// Unix timestamp of the import.
    #[serde(default)]
    pub created_at: i64,
    /// Unix timestamp after which the package expires.
    #[serde(default)]
    pub expires_at: i64,
}

impl PackageMeta {
    /// Serialize to the JSON stored in the metadata store.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Parse the JSON stored in the metadata store.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Whether the package has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at > 0 && self.expires_at <= now
    }
}

/// Current unix timestamp in seconds.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
