//! Gateway configuration.
//!
//! Values come from an optional YAML file, then environment overrides.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `BILLGATE_BASE_URL` | Upstream base URL (default: `https://api.digiflazz.com/v1`) |
//! | `BILLGATE_USERNAME` | Upstream account username |
//! | `BILLGATE_API_KEY` | Upstream API key |
//! | `BILLGATE_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `BILLGATE_RETRY_ATTEMPTS` | Attempts per call (default: 3) |
//! | `BILLGATE_CACHE_BACKEND` | `sqlite` or `redis` (default: `sqlite`) |
//! | `BILLGATE_SQLITE_PATH` | SQLite cache file |
//! | `BILLGATE_REDIS_URL` | Redis connection URL |
//! | `BILLGATE_INQUIRY_CACHE` | `0`/`false` disables the inquiry cache |
//! | `BILLGATE_INQUIRY_TTL` | Inquiry cache TTL in seconds, `0` = never expire |

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sign::Credentials;

/// Upstream client configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL for the billing API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub api_key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts per call, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Linear backoff unit: attempt `n` waits `n` units first.
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_base_url() -> String {
    "https://api.digiflazz.com/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout(),
            retry_attempts: default_retry_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_key_len", &self.api_key.len())
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_attempts", &self.retry_attempts)
            .field("backoff_unit_ms", &self.backoff_unit_ms)
            .finish()
    }
}

impl UpstreamConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `BILLGATE_*` overrides on top of the current values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BILLGATE_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(username) = std::env::var("BILLGATE_USERNAME") {
            self.username = username;
        }
        if let Ok(key) = std::env::var("BILLGATE_API_KEY") {
            self.api_key = key;
        }
        if let Some(timeout) = env_parse("BILLGATE_TIMEOUT") {
            self.timeout_secs = timeout;
        }
        if let Some(attempts) = env_parse("BILLGATE_RETRY_ATTEMPTS") {
            self.retry_attempts = attempts;
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.api_key = api_key.into();
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit_ms = u64::try_from(unit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.api_key.clone())
    }

    /// Attempt count, with zero normalised to the default.
    pub fn attempts(&self) -> u32 {
        if self.retry_attempts == 0 {
            default_retry_attempts()
        } else {
            self.retry_attempts
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

/// Cache backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Embedded file-backed store.
    Sqlite { path: PathBuf },

    /// Networked store.
    Redis {
        url: String,
        #[serde(default = "default_redis_prefix")]
        prefix: String,
    },
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("billgate-cache.db")
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_prefix() -> String {
    "billgate:".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

impl StoreConfig {
    pub fn apply_env(&mut self) {
        let backend = std::env::var("BILLGATE_CACHE_BACKEND").ok();
        match backend.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("redis") => {
                if !matches!(self, Self::Redis { .. }) {
                    *self = Self::Redis {
                        url: default_redis_url(),
                        prefix: default_redis_prefix(),
                    };
                }
            }
            Some("sqlite") => {
                if !matches!(self, Self::Sqlite { .. }) {
                    *self = Self::default();
                }
            }
            _ => {}
        }

        match self {
            Self::Sqlite { path } => {
                if let Ok(p) = std::env::var("BILLGATE_SQLITE_PATH") {
                    *path = PathBuf::from(p);
                }
            }
            Self::Redis { url, .. } => {
                if let Ok(u) = std::env::var("BILLGATE_REDIS_URL") {
                    *url = u;
                }
            }
        }
    }
}

/// Inquiry cache policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryCacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime in milliseconds; `0` means the entry never expires.
    #[serde(default)]
    pub ttl_ms: u64,

    /// Namespace prepended to the lookup key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_key_prefix() -> String {
    "pln_inquiry:".to_string()
}

impl Default for InquiryCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 0,
            key_prefix: default_key_prefix(),
        }
    }
}

impl InquiryCacheConfig {
    pub fn new(enabled: bool, ttl: Duration, key_prefix: impl Into<String>) -> Self {
        Self {
            enabled,
            ttl_ms: ttl_millis(ttl),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn cache_key(&self, customer_no: &str) -> String {
        format!("{}{}", self.key_prefix, customer_no)
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("BILLGATE_INQUIRY_CACHE") {
            self.enabled = !(v == "0" || v.eq_ignore_ascii_case("false"));
        }
        if let Some(secs) = env_parse::<u64>("BILLGATE_INQUIRY_TTL") {
            self.ttl_ms = secs.saturating_mul(1000);
        }
    }
}

/// Full gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub inquiry: InquiryCacheConfig,
}

impl GatewayConfig {
    /// Load from `path` if it exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn apply_env(&mut self) {
        self.upstream.apply_env();
        self.store.apply_env();
        self.inquiry.apply_env();
    }
}

// Non-zero lifetimes below a millisecond round up so they never read as `0`.
fn ttl_millis(ttl: Duration) -> u64 {
    if ttl.is_zero() {
        return 0;
    }
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
