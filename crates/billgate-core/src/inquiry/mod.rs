//! Cache-aside electricity subscriber inquiry.
//!
//! Lookups are served from the [`KeyValueStore`] when a fresh entry exists
//! and go to the upstream otherwise. Only RC `"00"` replies are cached.
//!
//! Two concurrent misses for the same customer both go upstream and both
//! write the entry; the last write wins. Entries are idempotent for a
//! given customer so this only costs an extra upstream call.
//!
//! A call with an empty customer number is rejected before any counter
//! moves, so it never shows up in [`InquiryStatsSnapshot::total_requests`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::client::UpstreamClient;
use crate::config::InquiryCacheConfig;
use crate::error::InquiryError;
use crate::store::{KeyValueStore, StoreStats};
use crate::types::{require, PlnInquiryData, PlnInquiryResponse, RC_SUCCESS};

mod stats;

pub use stats::{InquiryStats, InquiryStatsSnapshot};

const SUCCESS_DATA_MESSAGE: &str = "Transaksi Sukses";
const SUCCESS_MESSAGE: &str = "PLN inquiry completed successfully";
const CACHED_MESSAGE: &str = "PLN inquiry completed successfully (cached)";

/// Stored form of a successful inquiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedInquiry {
    pub data: PlnInquiryData,
    pub cached_at: DateTime<Utc>,
    /// `None` never expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedInquiry {
    fn new(data: PlnInquiryData, config: &InquiryCacheConfig, now: DateTime<Utc>) -> Self {
        let ttl = config.ttl();
        let expires_at = if ttl.is_zero() {
            None
        } else {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
        };
        Self {
            data,
            cached_at: now,
            expires_at,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    /// Rebuild a response for the caller. The stored `ref_id` belongs to an
    /// earlier request and is replaced.
    fn into_response(self, ref_id: &str) -> PlnInquiryResponse {
        let mut data = self.data;
        data.ref_id = ref_id.to_string();
        PlnInquiryResponse {
            data,
            message: CACHED_MESSAGE.to_string(),
            status: 1,
        }
    }
}

/// Cache-aside wrapper around [`UpstreamClient::inquiry_pln`].
pub struct InquiryCacheService {
    client: UpstreamClient,
    store: Arc<dyn KeyValueStore>,
    config: RwLock<InquiryCacheConfig>,
    stats: Arc<InquiryStats>,
}

impl std::fmt::Debug for InquiryCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InquiryCacheService")
            .field("client", &self.client)
            .field("store", &self.store.backend_name())
            .field("config", &self.cache_config())
            .finish_non_exhaustive()
    }
}

impl InquiryCacheService {
    pub fn new(client: UpstreamClient, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(client, store, InquiryCacheConfig::default())
    }

    pub fn with_config(
        client: UpstreamClient,
        store: Arc<dyn KeyValueStore>,
        config: InquiryCacheConfig,
    ) -> Self {
        Self {
            client,
            store,
            config: RwLock::new(config),
            stats: Arc::new(InquiryStats::new()),
        }
    }

    /// Share an externally owned stats object.
    pub fn with_stats(mut self, stats: Arc<InquiryStats>) -> Self {
        self.stats = stats;
        self
    }

    pub async fn inquiry(
        &self,
        ref_id: &str,
        customer_no: &str,
    ) -> Result<PlnInquiryResponse, InquiryError> {
        self.inquiry_at(ref_id, customer_no, Utc::now()).await
    }

    /// [`inquiry`](Self::inquiry) with an explicit clock for entry expiry.
    pub async fn inquiry_at(
        &self,
        ref_id: &str,
        customer_no: &str,
        now: DateTime<Utc>,
    ) -> Result<PlnInquiryResponse, InquiryError> {
        require("customer_no", customer_no)?;

        let started = Instant::now();
        let config = self.cache_config();
        let key = config.cache_key(customer_no);

        info!(customer_no, cached = config.enabled, "processing pln inquiry");

        if config.enabled {
            if let Some(entry) = self.lookup(&key, now).await {
                self.stats.record_hit(started.elapsed());
                info!(customer_no, ref_id, "pln inquiry served from cache");
                return Ok(entry.into_response(ref_id));
            }
            debug!(customer_no, ref_id, "pln inquiry cache miss");
        }

        self.stats.record_miss();
        let mut resp = match self.client.inquiry_pln(customer_no).await {
            Ok(resp) => resp,
            Err(e) => {
                self.stats.record_error();
                error!(customer_no, error = %e, "upstream pln inquiry failed");
                return Err(e.into());
            }
        };

        if config.enabled && resp.is_success() {
            self.save(&key, &resp.data, &config, now).await;
        }
        self.stats.record_latency(started.elapsed());

        backfill(&mut resp, ref_id);
        info!(
            customer_no,
            rc = %resp.data.rc,
            status = %resp.data.status,
            ref_id = %resp.data.ref_id,
            "pln inquiry completed"
        );
        Ok(resp)
    }

    /// Fresh entry for `key`, if any. Stale or unreadable entries are
    /// removed and count as absent.
    async fn lookup(&self, key: &str, now: DateTime<Utc>) -> Option<CachedInquiry> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, falling back to upstream");
                return None;
            }
        };

        let entry = match serde_json::from_slice::<CachedInquiry>(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable cache entry");
                self.discard(key).await;
                return None;
            }
        };

        if entry.is_stale(now) {
            debug!(key, "cache entry expired");
            self.discard(key).await;
            return None;
        }
        Some(entry)
    }

    async fn save(
        &self,
        key: &str,
        data: &PlnInquiryData,
        config: &InquiryCacheConfig,
        now: DateTime<Utc>,
    ) {
        let entry = CachedInquiry::new(data.clone(), config, now);
        let result = match serde_json::to_vec(&entry) {
            Ok(bytes) => self.store.set(key, &bytes, config.ttl()).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => debug!(key, ttl_ms = config.ttl_ms, "pln inquiry cached"),
            Err(e) => warn!(key, error = %e, "failed to cache pln inquiry response"),
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "failed to delete cache entry");
        }
    }

    /// Remove the entry for one customer.
    pub async fn clear_cache(&self, customer_no: &str) -> Result<(), InquiryError> {
        let key = self.cache_config().cache_key(customer_no);
        info!(customer_no, "clearing pln inquiry cache");
        self.store.delete(&key).await?;
        Ok(())
    }

    pub async fn clear_all_cache(&self) -> Result<(), InquiryError> {
        info!("clearing all pln inquiry cache");
        self.store.clear_all().await?;
        Ok(())
    }

    /// Sweep expired entries; returns the number removed.
    pub async fn delete_expired_cache(&self) -> Result<u64, InquiryError> {
        let removed = self.store.delete_expired().await?;
        info!(removed, "deleted expired pln inquiry cache entries");
        Ok(removed)
    }

    pub async fn cache_stats(&self) -> Result<StoreStats, InquiryError> {
        Ok(self.store.stats().await?)
    }

    pub fn stats(&self) -> InquiryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Live handle to the counters.
    pub fn stats_handle(&self) -> Arc<InquiryStats> {
        Arc::clone(&self.stats)
    }

    /// Replace the policy for subsequent calls. Existing entries keep the
    /// expiry they were written with.
    pub fn set_cache_config(&self, config: InquiryCacheConfig) {
        info!(
            enabled = config.enabled,
            ttl_ms = config.ttl_ms,
            key_prefix = %config.key_prefix,
            "pln inquiry cache config updated"
        );
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn cache_config(&self) -> InquiryCacheConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }
}

/// Fill defaults on an upstream reply. The RC is never invented.
fn backfill(resp: &mut PlnInquiryResponse, ref_id: &str) {
    let success = resp.data.rc == RC_SUCCESS;
    if resp.data.ref_id.is_empty() {
        resp.data.ref_id = ref_id.to_string();
    }
    if resp.data.message.is_empty() && success {
        resp.data.message = SUCCESS_DATA_MESSAGE.to_string();
    }
    if resp.message.is_empty() {
        resp.message = SUCCESS_MESSAGE.to_string();
    }
    if resp.status == 0 && success {
        resp.status = 1;
    }
}
