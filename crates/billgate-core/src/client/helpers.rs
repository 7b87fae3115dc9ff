//! Pure helpers: signed envelope, payload redaction (no HTTP, no retry logic).

use serde::Serialize;

use crate::sign::{Credentials, Operation, SignSource};

/// Fields that must never reach the logs in clear.
const SECRET_FIELDS: &[&str] = &["api_key"];
const SIGNATURE_FIELDS: &[&str] = &["sign"];

/// Request body with credentials and signature attached.
///
/// No `Debug`: it would print the key. Log via [`redact_payload`].
#[derive(Serialize)]
pub(crate) struct SignedRequest<'a, B> {
    pub username: &'a str,
    pub api_key: &'a str,
    pub sign: String,
    #[serde(flatten)]
    pub body: &'a B,
}

impl<'a, B: SignSource> SignedRequest<'a, B> {
    /// Sign `body` for `operation` using the operation's designated field.
    pub(crate) fn new(credentials: &'a Credentials, operation: Operation, body: &'a B) -> Self {
        let field = operation.sign_field().select(body);
        Self {
            username: credentials.username(),
            api_key: credentials.api_key(),
            sign: credentials.sign(field),
            body,
        }
    }
}

/// Empty body for operations that carry only credentials.
#[derive(Debug, Serialize)]
pub(crate) struct NoFields {}

impl SignSource for NoFields {}

/// Price list body.
#[derive(Debug, Serialize)]
pub(crate) struct PriceListFields<'a> {
    #[serde(rename = "type", skip_serializing_if = "str::is_empty")]
    pub kind: &'a str,
}

impl SignSource for PriceListFields<'_> {}

/// Body keyed by correlation id only.
#[derive(Debug, Serialize)]
pub(crate) struct RefIdFields<'a> {
    pub ref_id: &'a str,
}

impl SignSource for RefIdFields<'_> {
    fn ref_id(&self) -> &str {
        self.ref_id
    }
}

/// Body keyed by lookup key only.
#[derive(Debug, Serialize)]
pub(crate) struct CustomerFields<'a> {
    pub customer_no: &'a str,
}

impl SignSource for CustomerFields<'_> {
    fn customer_no(&self) -> &str {
        self.customer_no
    }
}

/// Render a JSON payload for logging with secrets masked and the signature
/// shortened to a prefix.
pub(crate) fn redact_payload(payload: &[u8]) -> String {
    let mut value: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(v) => v,
        Err(_) => return format!("<{} bytes, not JSON>", payload.len()),
    };

    if let Some(map) = value.as_object_mut() {
        for field in SECRET_FIELDS {
            if let Some(v) = map.get_mut(*field) {
                *v = serde_json::Value::String("[redacted]".to_string());
            }
        }
        for field in SIGNATURE_FIELDS {
            if let Some(v) = map.get_mut(*field) {
                if let Some(sig) = v.as_str() {
                    *v = serde_json::Value::String(signature_prefix(sig));
                }
            }
        }
    }

    value.to_string()
}

/// Short, log-safe form of a signature.
pub(crate) fn signature_prefix(sig: &str) -> String {
    let prefix: String = sig.chars().take(8).collect();
    format!("{}...", prefix)
}

/// Cap a response body for error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}
