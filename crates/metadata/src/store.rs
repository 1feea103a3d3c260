//! Metadata store trait and the SQLite implementation.

use crate::error::MetadataResult;
use crate::repos::{MembershipRepo, PackageRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
///
/// The same trait backs both the node-local metadata store and the
/// cluster-wide membership store; each is opened from its own config.
#[async_trait]
pub trait MetadataStore: PackageRepo + MembershipRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Physically delete records whose expiry is at or before `now`.
    ///
    /// Returns the number of rows removed.
    async fn purge_expired(&self, now: i64) -> MetadataResult<u64>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and migrate it.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // Single connection: SQLite serializes writers anyway.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "Opened SQLite store");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> MetadataResult<u64> {
        let mut tx = self.pool.begin().await?;

        let metas = sqlx::query(
            "DELETE FROM package_meta WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let nodes = sqlx::query(
            "DELETE FROM package_nodes WHERE key IN \
             (SELECT key FROM node_set_expiry WHERE expires_at <= ?)",
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM node_set_expiry WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(metas + nodes)
    }
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use depot_core::{PackageId, unix_now};

    /// Predicate on `package_meta` rows that are still visible at `?`.
    const META_LIVE: &str = "(expires_at IS NULL OR expires_at > ?)";

    /// Predicate on `package_nodes` rows whose set has not expired at `?`.
    const NODES_LIVE: &str = "NOT EXISTS (SELECT 1 FROM node_set_expiry e \
         WHERE e.key = package_nodes.key AND e.expires_at <= ?)";

    #[async_trait]
    impl PackageRepo for SqliteStore {
        async fn get_package_meta(&self, id: &PackageId) -> MetadataResult<Option<String>> {
            let row = sqlx::query_as::<_, PackageMetaRow>(&format!(
                "SELECT key, meta, expires_at FROM package_meta WHERE key = ? AND {META_LIVE}"
            ))
            .bind(package_key(id))
            .bind(unix_now())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(|r| r.meta))
        }

        async fn put_package_meta(&self, id: &PackageId, meta_json: &str) -> MetadataResult<()> {
            // An expired record is gone, so the new one starts without expiry.
            sqlx::query(
                r#"
                INSERT INTO package_meta (key, meta, expires_at) VALUES (?, ?, NULL)
                ON CONFLICT(key) DO UPDATE SET
                    meta = excluded.meta,
                    expires_at = CASE
                        WHEN package_meta.expires_at IS NOT NULL AND package_meta.expires_at <= ?
                        THEN NULL
                        ELSE package_meta.expires_at
                    END
                "#,
            )
            .bind(package_key(id))
            .bind(meta_json)
            .bind(unix_now())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn package_exists(&self, id: &PackageId) -> MetadataResult<bool> {
            let exists: bool = sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM package_meta WHERE key = ? AND {META_LIVE})"
            ))
            .bind(package_key(id))
            .bind(unix_now())
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        }

        async fn expire_package_at(
            &self,
            id: &PackageId,
            expires_at: i64,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(&format!(
                "UPDATE package_meta SET expires_at = ? WHERE key = ? AND {META_LIVE}"
            ))
            .bind(expires_at)
            .bind(package_key(id))
            .bind(unix_now())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn delete_package(&self, id: &PackageId) -> MetadataResult<bool> {
            let result = sqlx::query(&format!(
                "DELETE FROM package_meta WHERE key = ? AND {META_LIVE}"
            ))
            .bind(package_key(id))
            .bind(unix_now())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl MembershipRepo for SqliteStore {
        async fn add_package_node(&self, id: &PackageId, node: &str) -> MetadataResult<()> {
            let key = package_nodes_key(id);
            let now = unix_now();
            let mut tx = self.pool.begin().await?;

            // Adding to an expired set starts a new, unexpiring set.
            let expired: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM node_set_expiry WHERE key = ? AND expires_at <= ?)",
            )
            .bind(&key)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            if expired {
                sqlx::query("DELETE FROM package_nodes WHERE key = ?")
                    .bind(&key)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM node_set_expiry WHERE key = ?")
                    .bind(&key)
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query("INSERT OR IGNORE INTO package_nodes (key, node) VALUES (?, ?)")
                .bind(&key)
                .bind(node)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn remove_package_node(&self, id: &PackageId, node: &str) -> MetadataResult<bool> {
            let key = package_nodes_key(id);
            let mut tx = self.pool.begin().await?;

            let removed = sqlx::query(&format!(
                "DELETE FROM package_nodes WHERE key = ? AND node = ? AND {NODES_LIVE}"
            ))
            .bind(&key)
            .bind(node)
            .bind(unix_now())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            // An emptied set disappears together with its expiry.
            let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM package_nodes WHERE key = ?")
                .bind(&key)
                .fetch_one(&mut *tx)
                .await?;
            if remaining == 0 {
                sqlx::query("DELETE FROM node_set_expiry WHERE key = ?")
                    .bind(&key)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(removed > 0)
        }

        async fn random_package_node(&self, id: &PackageId) -> MetadataResult<Option<String>> {
            let node: Option<String> = sqlx::query_scalar(&format!(
                "SELECT node FROM package_nodes WHERE key = ? AND {NODES_LIVE} \
                 ORDER BY RANDOM() LIMIT 1"
            ))
            .bind(package_nodes_key(id))
            .bind(unix_now())
            .fetch_optional(&self.pool)
            .await?;
            Ok(node)
        }

        async fn expire_package_nodes_at(
            &self,
            id: &PackageId,
            expires_at: i64,
        ) -> MetadataResult<bool> {
            let key = package_nodes_key(id);
            let mut tx = self.pool.begin().await?;

            let live: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM package_nodes WHERE key = ? AND {NODES_LIVE}"
            ))
            .bind(&key)
            .bind(unix_now())
            .fetch_one(&mut *tx)
            .await?;
            if live == 0 {
                return Ok(false);
            }

            sqlx::query(
                "INSERT INTO node_set_expiry (key, expires_at) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET expires_at = excluded.expires_at",
            )
            .bind(&key)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(true)
        }

        async fn list_package_nodes(&self, id: &PackageId) -> MetadataResult<Vec<String>> {
            let rows = sqlx::query_as::<_, PackageNodeRow>(&format!(
                "SELECT key, node FROM package_nodes WHERE key = ? AND {NODES_LIVE} ORDER BY node"
            ))
            .bind(package_nodes_key(id))
            .bind(unix_now())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|r| r.node).collect())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Package metadata records (PACKAGE@<id>)
CREATE TABLE IF NOT EXISTS package_meta (
    key TEXT PRIMARY KEY,
    meta TEXT NOT NULL,
    expires_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_package_meta_expires ON package_meta(expires_at);

-- Holders of each package (PKG_NODE@<id>)
CREATE TABLE IF NOT EXISTS package_nodes (
    key TEXT NOT NULL,
    node TEXT NOT NULL,
    PRIMARY KEY (key, node)
);

-- Whole-set expiry for package_nodes
CREATE TABLE IF NOT EXISTS node_set_expiry (
    key TEXT PRIMARY KEY,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_node_set_expiry_expires ON node_set_expiry(expires_at);
"#;
