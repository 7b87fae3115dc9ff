//! Key-value storage behind the inquiry cache.
//!
//! Two interchangeable backends implement [`KeyValueStore`]: an embedded
//! SQLite file and a Redis server. Values are opaque bytes; expiry is
//! per entry and a zero TTL means the entry never expires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::StoreResult;

pub mod redis;
pub mod sqlite;

pub use self::redis::RedisStore;
pub use self::sqlite::SqliteStore;

/// Stored `expires_at` value for entries without a TTL.
pub const NEVER_EXPIRES: i64 = 0;

/// Storage contract shared by all cache backends.
///
/// `get` on a missing or expired key yields [`StoreError::NotFound`].
///
/// [`StoreError::NotFound`]: crate::error::StoreError::NotFound
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Insert or replace. `Duration::ZERO` stores without expiry.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Remove every entry this store owns.
    async fn clear_all(&self) -> StoreResult<()>;

    /// Drop expired entries and return how many were removed.
    async fn delete_expired(&self) -> StoreResult<u64>;

    async fn stats(&self) -> StoreResult<StoreStats>;

    async fn ping(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// Entry counts reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub expired: u64,
    pub active: u64,
}

/// Absolute expiry in unix milliseconds for an entry written at `now`.
pub fn expires_at_millis(now: DateTime<Utc>, ttl: Duration) -> i64 {
    if ttl.is_zero() {
        return NEVER_EXPIRES;
    }
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1);
    now.timestamp_millis().saturating_add(ttl_ms)
}

pub fn is_expired(expires_at: i64, now_ms: i64) -> bool {
    expires_at != NEVER_EXPIRES && expires_at <= now_ms
}

/// Open the backend selected by `config`.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config {
        StoreConfig::Sqlite { path } => {
            tracing::debug!(path = %path.display(), "opening sqlite cache store");
            Arc::new(SqliteStore::open(path)?)
        }
        StoreConfig::Redis { url, prefix } => {
            tracing::debug!(prefix = %prefix, "connecting redis cache store");
            Arc::new(RedisStore::connect(url, prefix.clone()).await?)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_zero_ttl_never_expires() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let expires = expires_at_millis(now, Duration::ZERO);
        assert_eq!(expires, NEVER_EXPIRES);
        assert!(!is_expired(expires, i64::MAX));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let expires = expires_at_millis(now, Duration::from_secs(5));
        assert_eq!(expires, 1_700_000_005_000);
        assert!(!is_expired(expires, 1_700_000_004_999));
        assert!(is_expired(expires, 1_700_000_005_000));
    }

    #[tokio::test]
    async fn test_open_store_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::Sqlite {
            path: dir.path().join("cache.db"),
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        store.ping().await.unwrap();
    }
}
