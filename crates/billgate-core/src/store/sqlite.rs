//! SqliteStore: file-backed key-value store.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{expires_at_millis, is_expired, KeyValueStore, StoreStats, NEVER_EXPIRES};
use crate::error::{StoreError, StoreResult};

const BACKEND: &str = "sqlite";

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inquiry_cache (
    cache_key  TEXT PRIMARY KEY,
    data       BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_inquiry_cache_expires_at ON inquiry_cache(expires_at);
"#;

/// SQLite-backed store. `expires_at` is unix milliseconds, `0` for never.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open a file-backed store, creating the schema if needed.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> StoreResult<()> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute("PRAGMA journal_mode = WAL", []);
        let _ = conn.execute("PRAGMA busy_timeout = 5000", []);
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Backend {
            backend: BACKEND,
            message: "connection mutex poisoned".to_string(),
        })
    }

    /// Read a live entry as of `now`. An expired entry is removed and
    /// reported as missing.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> StoreResult<Vec<u8>> {
        let conn = self.lock()?;
        let row: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT data, expires_at FROM inquiry_cache WHERE cache_key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((data, expires_at)) if !is_expired(expires_at, now.timestamp_millis()) => {
                Ok(data)
            }
            Some(_) => {
                conn.execute("DELETE FROM inquiry_cache WHERE cache_key = ?1", [key])?;
                tracing::debug!(key, "expired cache entry removed on read");
                Err(StoreError::NotFound {
                    key: key.to_string(),
                })
            }
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    pub fn set_at(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO inquiry_cache (cache_key, data, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(cache_key) DO UPDATE SET
                data = excluded.data,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
            params![
                key,
                value,
                now.timestamp_millis(),
                expires_at_millis(now, ttl)
            ],
        )?;
        Ok(())
    }

    pub fn delete_expired_at(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM inquiry_cache WHERE expires_at != ?1 AND expires_at <= ?2",
            params![NEVER_EXPIRES, now.timestamp_millis()],
        )?;
        Ok(removed as u64)
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> StoreResult<StoreStats> {
        let conn = self.lock()?;
        let (total, expired): (i64, i64) = conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN expires_at != ?1 AND expires_at <= ?2 THEN 1 ELSE 0 END), 0)
            FROM inquiry_cache
            "#,
            params![NEVER_EXPIRES, now.timestamp_millis()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total = total.max(0) as u64;
        let expired = expired.max(0) as u64;
        Ok(StoreStats {
            total,
            expired,
            active: total.saturating_sub(expired),
        })
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM inquiry_cache WHERE cache_key = ?1", [key])?;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM inquiry_cache", [])?;
        Ok(())
    }

    fn check(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.get_at(key, Utc::now())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.set_at(key, value, ttl, Utc::now())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.delete_key(key)
    }

    async fn clear_all(&self) -> StoreResult<()> {
        self.clear()
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        self.delete_expired_at(Utc::now())
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.stats_at(Utc::now())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
