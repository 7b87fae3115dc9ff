//! RedisStore: networked key-value store.
//!
//! Expiry is delegated to the server, so `delete_expired` has nothing to do
//! and `stats` never reports expired entries.

use std::time::Duration;

use ::redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use async_trait::async_trait;

use super::{KeyValueStore, StoreStats};
use crate::error::{StoreError, StoreResult};

const BACKEND: &str = "redis";

/// Redis-backed store. Every key is namespaced under `prefix`.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> StoreResult<Self> {
        let client = Client::open(url).map_err(|e| StoreError::Backend {
            backend: BACKEND,
            message: format!("client error: {}", e),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend {
                backend: BACKEND,
                message: format!("connection error: {}", e),
            })?;

        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn own_keys(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.prefix);
        let keys: Vec<String> = conn.keys(&pattern).await?;
        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.prefixed_key(key)).await?;
        value.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let prefixed = self.prefixed_key(key);

        if ttl.is_zero() {
            let _: () = conn.set(&prefixed, value).await?;
        } else {
            let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            let _: () = conn.pset_ex(&prefixed, value, ms).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(self.prefixed_key(key)).await?;
        Ok(())
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let keys = self.own_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(&keys).await?;
        tracing::debug!(deleted, prefix = %self.prefix, "redis cache cleared");
        Ok(())
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        Ok(0)
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let total = self.own_keys().await?.len() as u64;
        Ok(StoreStats {
            total,
            expired: 0,
            active: total,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(StoreError::Backend {
                backend: BACKEND,
                message: format!("unexpected PING reply: {}", pong),
            });
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    //! Needs a live server: `BILLGATE_TEST_REDIS_URL=redis://127.0.0.1:6379
    //! cargo test -- --ignored`.

    use super::*;

    async fn store(prefix: &str) -> RedisStore {
        let url = std::env::var("BILLGATE_TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let store = RedisStore::connect(&url, prefix).await.unwrap();
        store.clear_all().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_set_get_delete() {
        let store = store("billgate-test-basic:").await;
        store.set("k", b"v", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), b"v");

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap_err().is_not_found());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_ttl_expires() {
        let store = store("billgate-test-ttl:").await;
        store
            .set("k", b"v", Duration::from_millis(100))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(store.get("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_clear_all_is_namespaced() {
        let ours = store("billgate-test-ns-a:").await;
        let theirs = store("billgate-test-ns-b:").await;
        ours.set("k", b"1", Duration::ZERO).await.unwrap();
        theirs.set("k", b"2", Duration::ZERO).await.unwrap();

        ours.clear_all().await.unwrap();
        assert!(ours.get("k").await.unwrap_err().is_not_found());
        assert_eq!(theirs.get("k").await.unwrap(), b"2");
        assert_eq!(theirs.stats().await.unwrap().active, 1);
        theirs.clear_all().await.unwrap();
    }
}
