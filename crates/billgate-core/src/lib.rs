//! Core of the billgate billing gateway.
//!
//! This crate provides:
//!
//! - Request signing for the upstream billing API
//! - A retrying HTTP client for every upstream operation
//! - Interchangeable SQLite and Redis key-value stores
//! - A cache-aside service for electricity subscriber inquiries
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use billgate_core::{InquiryCacheService, SqliteStore, UpstreamClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = UpstreamClient::from_env()?;
//! let store = Arc::new(SqliteStore::open("billgate-cache.db".as_ref())?);
//! let service = InquiryCacheService::new(client, store);
//!
//! let resp = service.inquiry("REF1", "12345678901").await?;
//! println!("{} ({})", resp.data.name, resp.data.rc);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `BILLGATE_BASE_URL` | Upstream base URL (default: `https://api.digiflazz.com/v1`) |
//! | `BILLGATE_USERNAME` | Upstream account identifier |
//! | `BILLGATE_API_KEY` | Upstream signing secret |
//! | `BILLGATE_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `BILLGATE_RETRY_ATTEMPTS` | Attempts per call (default: 3) |
//! | `BILLGATE_CACHE_BACKEND` | `sqlite` or `redis` |
//! | `BILLGATE_SQLITE_PATH` | SQLite file (default: `billgate-cache.db`) |
//! | `BILLGATE_REDIS_URL` | Redis URL |
//! | `BILLGATE_INQUIRY_CACHE` | `false` disables inquiry caching |
//! | `BILLGATE_INQUIRY_TTL` | Inquiry entry TTL in seconds, `0` for never |

pub mod client;
pub mod config;
pub mod error;
pub mod inquiry;
pub mod sign;
pub mod store;
pub mod types;

pub use client::UpstreamClient;
pub use config::{GatewayConfig, InquiryCacheConfig, StoreConfig, UpstreamConfig};
pub use error::{
    ConfigError, InquiryError, StoreError, StoreResult, UpstreamError, UpstreamResult,
};
pub use inquiry::{CachedInquiry, InquiryCacheService, InquiryStats, InquiryStatsSnapshot};
pub use sign::{sign, Credentials, Operation, SignField, SignSource};
pub use store::{open_store, KeyValueStore, RedisStore, SqliteStore, StoreStats, NEVER_EXPIRES};
pub use types::{
    Balance, BalanceResponse, BillCheckRequest, BillData, BillDetails, BillPayRequest,
    BillResponse, Envelope, PlnInquiryData, PlnInquiryResponse, PriceListResponse, PriceType,
    Product, ProductList, ResultCode, TransactionData, TransactionRequest, TransactionResponse,
    Webhook, RC_SUCCESS,
};
