//! HTTP layer: status mapping, decoding, retry.
//!
//! This is the ONLY place that looks at HTTP status codes. client/mod.rs
//! builds bodies and never sees a response.

use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::sign::Operation;

use super::helpers::{redact_payload, truncate_body};

/// HTTP backend (holds reqwest client and config).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) config: UpstreamConfig,
}

impl HttpBackend {
    /// POST `body` to the operation's endpoint and decode the reply.
    ///
    /// Transport failures, non-200 statuses and undecodable bodies are
    /// retried up to the configured attempt count. Attempt `n` (0-based)
    /// first sleeps `n` backoff units. The business RC is not inspected.
    pub(crate) async fn call<B, T>(&self, operation: Operation, body: &B) -> UpstreamResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, operation.path());
        let payload = serde_json::to_vec(body).map_err(|e| UpstreamError::InvalidRequest {
            message: format!("failed to encode request: {}", e),
        })?;

        debug!(
            endpoint = %operation,
            payload = %redact_payload(&payload),
            payload_size = payload.len(),
            "upstream request"
        );

        let attempts = self.config.attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = backoff_delay(self.config.backoff_unit(), attempt);
                debug!(
                    endpoint = %operation,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis(),
                    "waiting before retry"
                );
                tokio::time::sleep(backoff).await;
            }

            let started = Instant::now();
            let result = self
                .post_once(&url, &payload)
                .await
                .and_then(|text| decode(operation, &text));
            let elapsed_ms = started.elapsed().as_millis();

            match result {
                Ok(value) => {
                    debug!(
                        endpoint = %operation,
                        attempt = attempt + 1,
                        elapsed_ms,
                        "upstream call succeeded"
                    );
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        endpoint = %operation,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        elapsed_ms,
                        "upstream attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(last) => Err(UpstreamError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            }),
            None => Err(UpstreamError::Config {
                message: "no attempts configured".to_string(),
            }),
        }
    }

    /// Send one request; Ok only for HTTP 200 with a readable body.
    async fn post_once(&self, url: &str, payload: &[u8]) -> UpstreamResult<String> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(|e| UpstreamError::Transport {
            message: format!("failed to read response body: {}", e),
        })?;

        debug!(
            status = status.as_u16(),
            body_size = text.len(),
            body = %truncate_body(&text),
            "upstream response"
        );

        if status != StatusCode::OK {
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }

        Ok(text)
    }
}

/// Linear backoff before the given 0-based attempt, saturating at `Duration::MAX`.
fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

fn decode<T: DeserializeOwned>(operation: Operation, text: &str) -> UpstreamResult<T> {
    serde_json::from_str(text).map_err(|e| UpstreamError::Decode {
        endpoint: operation.path().to_string(),
        message: e.to_string(),
    })
}
