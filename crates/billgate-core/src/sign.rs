//! Request signing for the upstream billing API.
//!
//! Every outbound call carries `md5(username || api_key || field)` as a
//! lowercase hex string. Which field is used depends on the operation; see
//! [`Operation::sign_field`].

use std::fmt;

/// Compute the upstream signature for one request.
///
/// Pure and deterministic: no salt, no nonce.
pub fn sign(identifier: &str, secret: &str, variable_field: &str) -> String {
    let mut input =
        String::with_capacity(identifier.len() + secret.len() + variable_field.len());
    input.push_str(identifier);
    input.push_str(secret);
    input.push_str(variable_field);
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Upstream account credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    api_key: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.api_key.is_empty()
    }

    /// Sign `field` with these credentials.
    pub fn sign(&self, field: &str) -> String {
        sign(&self.username, &self.api_key, field)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

/// Upstream operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Balance,
    PriceList,
    Topup,
    Pay,
    Status,
    BillCheck,
    BillPay,
    InquiryPln,
}

/// Which value feeds the variable part of the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignField {
    /// A fixed literal, same for every call.
    Literal(&'static str),
    /// The caller's correlation id (`ref_id`).
    RefId,
    /// The subscriber lookup key (`customer_no`).
    CustomerNo,
}

impl Operation {
    /// Path relative to the upstream base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Balance => "/cek-saldo",
            Self::PriceList => "/daftar-harga",
            Self::Topup => "/topup",
            Self::Pay => "/pascabayar",
            Self::Status => "/cek-status",
            Self::BillCheck => "/pascabayar/check",
            Self::BillPay => "/pascabayar/pay",
            Self::InquiryPln => "/inquiry-pln",
        }
    }

    pub fn sign_field(self) -> SignField {
        match self {
            Self::Balance => SignField::Literal("deposit"),
            Self::PriceList => SignField::Literal("pricelist"),
            Self::Topup | Self::Pay | Self::Status | Self::BillCheck | Self::BillPay => {
                SignField::RefId
            }
            Self::InquiryPln => SignField::CustomerNo,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Request bodies that can supply a signature field.
pub trait SignSource {
    fn ref_id(&self) -> &str {
        ""
    }

    fn customer_no(&self) -> &str {
        ""
    }
}

impl SignField {
    /// Resolve the concrete value for `body`.
    pub fn select<'a, B: SignSource + ?Sized>(self, body: &'a B) -> &'a str {
        match self {
            Self::Literal(value) => value,
            Self::RefId => body.ref_id(),
            Self::CustomerNo => body.customer_no(),
        }
    }
}
