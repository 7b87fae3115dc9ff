//! Error types for the upstream client, cache stores and inquiry service.

/// Upstream billing API errors.
///
/// A decoded response whose RC is not `"00"` is not an error: it is returned
/// as a normal value and callers inspect it with `is_success()`.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Connection failure, timeout or unreadable body.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Upstream answered with a non-200 status.
    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },

    /// Every configured attempt failed; carries the last failure.
    #[error("upstream call failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UpstreamError>,
    },

    /// Request rejected before any network I/O.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Client could not be constructed from its configuration.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl UpstreamError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidRequest { .. } | Self::Config { .. } => 2,
            Self::Transport { .. } | Self::Http { .. } => 5,
            Self::Decode { .. } => 6,
            Self::RetriesExhausted { last, .. } => last.exit_code(),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Http { .. } | Self::Decode { .. }
        )
    }

    /// The failure that ended the call, looking through `RetriesExhausted`.
    pub fn root(&self) -> &UpstreamError {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        Self::Transport { message }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Key-value store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live entry under this key.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// Backend unavailable or query failed.
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    /// Stored payload could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend {
            backend: "sqlite",
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend {
            backend: "redis",
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Inquiry service errors.
#[derive(Debug, thiserror::Error)]
pub enum InquiryError {
    /// The upstream lookup itself failed. Nothing was cached.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A cache administration call failed.
    #[error("cache error: {0}")]
    Cache(#[from] StoreError),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(UpstreamError::Transport {
            message: "reset".into()
        }
        .is_retryable());
        assert!(UpstreamError::Http {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(UpstreamError::Decode {
            endpoint: "/cek-saldo".into(),
            message: "eof".into()
        }
        .is_retryable());
        assert!(!UpstreamError::invalid("ref_id is required").is_retryable());
    }

    #[test]
    fn test_root_unwraps_exhausted() {
        let err = UpstreamError::RetriesExhausted {
            attempts: 3,
            last: Box::new(UpstreamError::Http {
                status: 503,
                body: "busy".into(),
            }),
        };
        assert!(!err.is_retryable());
        assert!(matches!(err.root(), UpstreamError::Http { status: 503, .. }));
        assert_eq!(err.exit_code(), 5);
    }
}
