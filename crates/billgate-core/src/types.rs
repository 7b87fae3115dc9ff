//! Wire types for the upstream billing protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{UpstreamError, UpstreamResult};
use crate::sign::SignSource;

/// The only RC value that means success.
pub const RC_SUCCESS: &str = "00";

/// Response envelope shared by every upstream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Absent on some rejections; decodes to the empty payload so the
    /// reply reads as a business failure.
    #[serde(default)]
    pub data: T,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub status: i64,
}

/// Access to the business result code of a response payload.
pub trait ResultCode {
    fn rc(&self) -> &str;

    fn is_success(&self) -> bool {
        self.rc() == RC_SUCCESS
    }
}

impl<T: ResultCode> Envelope<T> {
    pub fn rc(&self) -> &str {
        self.data.rc()
    }

    /// True only for RC `"00"`; an absent RC is a failure.
    pub fn is_success(&self) -> bool {
        self.data.is_success()
    }
}

/// Deposit balance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Balance {
    pub deposit: f64,
}

/// Product in the price list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub price: f64,
    pub price_type: String,
    pub status: String,
    pub description: String,
}

/// Price list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriceType {
    #[default]
    All,
    Prabayar,
    Pascabayar,
}

impl PriceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "",
            Self::Prabayar => "prabayar",
            Self::Pascabayar => "pascabayar",
        }
    }
}

impl FromStr for PriceType {
    type Err = UpstreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::All),
            "prabayar" => Ok(Self::Prabayar),
            "pascabayar" => Ok(Self::Pascabayar),
            other => Err(UpstreamError::invalid(format!(
                "invalid price type: {}. Must be 'prabayar' or 'pascabayar'",
                other
            ))),
        }
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product lookups over a fetched price list.
pub trait ProductList {
    fn find_by_code(&self, code: &str) -> Option<&Product>;
    fn by_category(&self, category: &str) -> Vec<&Product>;
}

impl ProductList for [Product] {
    fn find_by_code(&self, code: &str) -> Option<&Product> {
        self.iter().find(|p| p.code == code)
    }

    fn by_category(&self, category: &str) -> Vec<&Product> {
        self.iter().filter(|p| p.category == category).collect()
    }
}

/// Result of a topup, payment or status check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionData {
    pub ref_id: String,
    pub customer_no: String,
    pub buyer_sku: String,
    pub message: String,
    pub rc: String,
    pub sn: String,
    pub buyer_last_saldo: f64,
    pub buyer_saldo: f64,
    pub price: f64,
    pub status: String,
    pub timestamp: String,
}

impl ResultCode for TransactionData {
    fn rc(&self) -> &str {
        &self.rc
    }
}

/// Postpaid bill breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillDetails {
    pub customer_name: String,
    pub bill_period: String,
    pub due_date: String,
    pub bill_amount: f64,
    pub admin_fee: f64,
    pub total_amount: f64,
}

/// Result of a bill check or bill payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillData {
    pub ref_id: String,
    pub customer_no: String,
    pub buyer_sku: String,
    pub message: String,
    pub rc: String,
    pub amount: f64,
    pub admin_fee: f64,
    pub total: f64,
    pub status: String,
    pub timestamp: String,
    pub sn: String,
    pub bill_details: BillDetails,
}

impl ResultCode for BillData {
    fn rc(&self) -> &str {
        &self.rc
    }
}

/// Subscriber metadata returned by the electricity inquiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlnInquiryData {
    pub message: String,
    pub status: String,
    pub rc: String,
    pub ref_id: String,
    pub customer_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub meter_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subscriber_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub segment_power: String,
}

impl ResultCode for PlnInquiryData {
    fn rc(&self) -> &str {
        &self.rc
    }
}

pub type BalanceResponse = Envelope<Balance>;
pub type PriceListResponse = Envelope<Vec<Product>>;
pub type TransactionResponse = Envelope<TransactionData>;
pub type BillResponse = Envelope<BillData>;
pub type PlnInquiryResponse = Envelope<PlnInquiryData>;

/// Prepaid topup or payment request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub ref_id: String,
    pub customer_no: String,
    pub buyer_sku: String,
}

impl TransactionRequest {
    pub fn new(
        ref_id: impl Into<String>,
        customer_no: impl Into<String>,
        buyer_sku: impl Into<String>,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            customer_no: customer_no.into(),
            buyer_sku: buyer_sku.into(),
        }
    }

    pub fn validate(&self) -> UpstreamResult<()> {
        require("ref_id", &self.ref_id)?;
        require("customer_no", &self.customer_no)?;
        require("buyer_sku", &self.buyer_sku)
    }
}

impl SignSource for TransactionRequest {
    fn ref_id(&self) -> &str {
        &self.ref_id
    }

    fn customer_no(&self) -> &str {
        &self.customer_no
    }
}

/// Postpaid bill check request; same shape as a prepaid transaction.
pub type BillCheckRequest = TransactionRequest;

/// Postpaid bill payment request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillPayRequest {
    pub ref_id: String,
    pub customer_no: String,
    pub buyer_sku: String,
    pub amount: f64,
}

impl BillPayRequest {
    pub fn validate(&self) -> UpstreamResult<()> {
        require("ref_id", &self.ref_id)?;
        require("customer_no", &self.customer_no)?;
        require("buyer_sku", &self.buyer_sku)?;
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(UpstreamError::invalid("amount must be positive"));
        }
        Ok(())
    }
}

impl SignSource for BillPayRequest {
    fn ref_id(&self) -> &str {
        &self.ref_id
    }

    fn customer_no(&self) -> &str {
        &self.customer_no
    }
}

/// Transaction callback pushed by the upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Webhook {
    pub ref_id: String,
    pub customer_no: String,
    pub buyer_sku: String,
    pub message: String,
    pub rc: String,
    pub sn: String,
    pub buyer_last_saldo: f64,
    pub buyer_saldo: f64,
    pub price: f64,
    pub status: String,
    pub timestamp: String,
    pub sign: String,
}

pub(crate) fn require(field: &str, value: &str) -> UpstreamResult<()> {
    if value.trim().is_empty() {
        return Err(UpstreamError::invalid(format!("{} is required", field)));
    }
    Ok(())
}
