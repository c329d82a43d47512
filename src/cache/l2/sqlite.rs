//! SQLite-backed L2 store.
//!
//! One table, primary key on `key`, indexes on `expires_at` (pruning) and `ttl_tier` (stats).
//! Statements run on the blocking pool; the connection sits behind a mutex.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::backend::L2Backend;
use super::error::{L2CacheError, L2CacheResult};
use super::types::L2Record;
use crate::cache::entry::TtlTier;

/// Name of the durable cache table.
pub const L2_TABLE_NAME: &str = "search_cache_l2";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS search_cache_l2 (
    key              TEXT PRIMARY KEY NOT NULL,
    payload          TEXT NOT NULL,
    total_count      INTEGER NOT NULL,
    created_at       INTEGER NOT NULL,
    expires_at       INTEGER NOT NULL,
    hit_count        INTEGER NOT NULL DEFAULT 0,
    last_accessed_at INTEGER NOT NULL,
    ttl_tier         TEXT NOT NULL DEFAULT 'standard'
);
CREATE INDEX IF NOT EXISTS idx_search_cache_l2_expires_at ON search_cache_l2(expires_at);
CREATE INDEX IF NOT EXISTS idx_search_cache_l2_ttl_tier ON search_cache_l2(ttl_tier);
";

/// Durable cache tier stored in a SQLite table.
#[derive(Clone)]
pub struct SqliteL2Store {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteL2Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteL2Store")
            .field("conn", &"<sqlite>")
            .finish()
    }
}

impl SqliteL2Store {
    /// Opens (or creates) the store in the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> L2CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| L2CacheError::Unavailable {
                reason: format!("failed to create {}: {}", parent.display(), e),
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> L2CacheResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> L2CacheResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> L2CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> L2CacheResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| L2CacheError::TaskJoin {
            reason: e.to_string(),
        })?
    }

    /// Runs a raw statement, for tests that need to corrupt rows.
    #[cfg(test)]
    pub(crate) async fn raw_execute(&self, sql: &'static str) -> L2CacheResult<usize> {
        self.with_conn(move |conn| Ok(conn.execute(sql, [])?)).await
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<L2Record> {
    let tier: String = row.get(7)?;
    let ttl_tier = tier.parse::<TtlTier>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(e),
        )
    })?;

    Ok(L2Record {
        key: row.get(0)?,
        payload: row.get(1)?,
        total_count: from_sql_int(row.get(2)?),
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
        hit_count: from_sql_int(row.get(5)?),
        last_accessed_at: row.get(6)?,
        ttl_tier,
    })
}

impl L2Backend for SqliteL2Store {
    async fn get(&self, key: &str, now: i64) -> L2CacheResult<Option<L2Record>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    "SELECT key, payload, total_count, created_at, expires_at,
                            hit_count, last_accessed_at, ttl_tier
                     FROM search_cache_l2
                     WHERE key = ?1 AND expires_at > ?2",
                    params![key, now],
                    map_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn set(&self, record: L2Record) -> L2CacheResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO search_cache_l2
                 (key, payload, total_count, created_at, expires_at,
                  hit_count, last_accessed_at, ttl_tier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.key,
                    record.payload,
                    to_sql_int(record.total_count),
                    record.created_at,
                    record.expires_at,
                    to_sql_int(record.hit_count),
                    record.last_accessed_at,
                    record.ttl_tier.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> L2CacheResult<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM search_cache_l2 WHERE key = ?1", params![key])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn delete_expired(&self, now: i64) -> L2CacheResult<u64> {
        let removed = self
            .with_conn(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM search_cache_l2 WHERE expires_at <= ?1",
                    params![now],
                )?;
                Ok(removed as u64)
            })
            .await?;
        debug!(removed, "Pruned expired L2 rows");
        Ok(removed)
    }

    async fn count_by_tier(&self, tier: TtlTier, now: i64) -> L2CacheResult<u64> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM search_cache_l2 WHERE ttl_tier = ?1 AND expires_at > ?2",
                params![tier.as_str(), now],
                |row| row.get(0),
            )?;
            Ok(from_sql_int(count))
        })
        .await
    }

    async fn clear(&self) -> L2CacheResult<u64> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM search_cache_l2", [])?;
            Ok(removed as u64)
        })
        .await
    }
}
