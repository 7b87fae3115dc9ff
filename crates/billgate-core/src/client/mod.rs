//! Signed client for the upstream billing API.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::sign::{Credentials, Operation};
use crate::types::{
    require, BalanceResponse, BillCheckRequest, BillPayRequest, BillResponse, PlnInquiryResponse,
    PriceListResponse, PriceType, TransactionRequest, TransactionResponse, Webhook,
};

mod helpers;
mod http;

use helpers::{
    signature_prefix, CustomerFields, NoFields, PriceListFields, RefIdFields, SignedRequest,
};
use http::HttpBackend;

pub const USER_AGENT_VALUE: &str = concat!("billgate/", env!("CARGO_PKG_VERSION"));

/// Client for the upstream billing API.
///
/// Each public method is one logical upstream call. Results are returned
/// whatever their RC; use `is_success()` to tell a business failure apart.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: HttpBackend,
    credentials: Credentials,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> UpstreamResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()
            .map_err(|e| UpstreamError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let credentials = config.credentials();

        Ok(Self {
            http: HttpBackend {
                client,
                base_url,
                config,
            },
            credentials,
        })
    }

    pub fn from_env() -> UpstreamResult<Self> {
        Self::new(UpstreamConfig::from_env())
    }

    pub async fn check_balance(&self) -> UpstreamResult<BalanceResponse> {
        let body = NoFields {};
        self.call(Operation::Balance, &body).await
    }

    pub async fn get_prices(&self, price_type: PriceType) -> UpstreamResult<PriceListResponse> {
        let body = PriceListFields {
            kind: price_type.as_str(),
        };
        let resp: PriceListResponse = self.call(Operation::PriceList, &body).await?;
        debug!(price_type = %price_type, products = resp.data.len(), "price list fetched");
        Ok(resp)
    }

    pub async fn topup(&self, req: &TransactionRequest) -> UpstreamResult<TransactionResponse> {
        req.validate()?;
        self.transaction(Operation::Topup, req).await
    }

    pub async fn pay(&self, req: &TransactionRequest) -> UpstreamResult<TransactionResponse> {
        req.validate()?;
        self.transaction(Operation::Pay, req).await
    }

    pub async fn check_status(&self, ref_id: &str) -> UpstreamResult<TransactionResponse> {
        require("ref_id", ref_id)?;
        let body = RefIdFields { ref_id };
        self.call(Operation::Status, &body).await
    }

    pub async fn check_bill(&self, req: &BillCheckRequest) -> UpstreamResult<BillResponse> {
        req.validate()?;
        let resp: BillResponse = self.call(Operation::BillCheck, req).await?;
        info!(
            ref_id = %req.ref_id,
            rc = %resp.data.rc,
            total = resp.data.total,
            "bill check completed"
        );
        Ok(resp)
    }

    pub async fn pay_bill(&self, req: &BillPayRequest) -> UpstreamResult<BillResponse> {
        req.validate()?;
        let resp: BillResponse = self.call(Operation::BillPay, req).await?;
        info!(
            ref_id = %req.ref_id,
            rc = %resp.data.rc,
            status = %resp.data.status,
            "bill payment completed"
        );
        Ok(resp)
    }

    pub async fn inquiry_pln(&self, customer_no: &str) -> UpstreamResult<PlnInquiryResponse> {
        require("customer_no", customer_no)?;
        let body = CustomerFields { customer_no };
        let resp: PlnInquiryResponse = self.call(Operation::InquiryPln, &body).await?;
        info!(
            customer_no,
            rc = %resp.data.rc,
            status = %resp.data.status,
            "pln inquiry response received"
        );
        Ok(resp)
    }

    /// Check a pushed callback's signature against our credentials.
    pub fn verify_webhook(&self, webhook: &Webhook) -> bool {
        let expected = self.credentials.sign(&webhook.ref_id);
        let valid = !webhook.sign.is_empty() && webhook.sign == expected;
        if !valid {
            debug!(
                ref_id = %webhook.ref_id,
                received = %signature_prefix(&webhook.sign),
                "webhook signature mismatch"
            );
        }
        valid
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    async fn transaction(
        &self,
        operation: Operation,
        req: &TransactionRequest,
    ) -> UpstreamResult<TransactionResponse> {
        let resp: TransactionResponse = self.call(operation, req).await?;
        info!(
            endpoint = %operation,
            ref_id = %resp.data.ref_id,
            rc = %resp.data.rc,
            status = %resp.data.status,
            "transaction completed"
        );
        Ok(resp)
    }

    async fn call<B, T>(&self, operation: Operation, body: &B) -> UpstreamResult<T>
    where
        B: crate::sign::SignSource + serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        let signed = SignedRequest::new(&self.credentials, operation, body);
        debug!(
            endpoint = %operation,
            username = %self.credentials.username(),
            sign = %signature_prefix(&signed.sign),
            "request signed"
        );
        self.http.call(operation, &signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::sign;

    fn client() -> UpstreamClient {
        let config = UpstreamConfig::default()
            .with_url("http://127.0.0.1:9/")
            .with_credentials("gw", "key");
        UpstreamClient::new(config).expect("failed to create client")
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_verify_webhook() {
        let client = client();
        let mut webhook = Webhook {
            ref_id: "REF77".into(),
            sign: sign("gw", "key", "REF77"),
            ..Default::default()
        };
        assert!(client.verify_webhook(&webhook));

        webhook.sign = sign("gw", "key", "REF78");
        assert!(!client.verify_webhook(&webhook));

        webhook.sign.clear();
        assert!(!client.verify_webhook(&webhook));
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let client = client();
        let err = client.check_status("").await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidRequest { .. }));

        let err = client
            .topup(&TransactionRequest::new("REF1", "0812", ""))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid request: buyer_sku is required");
    }
}
