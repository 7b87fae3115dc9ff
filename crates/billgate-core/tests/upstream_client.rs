//! Integration tests for UpstreamClient.
//!
//! Uses wiremock for HTTP mocking. Tests cover signing per operation,
//! request body shape, retry with linear backoff, retry exhaustion, and
//! business failures surfacing as normal results.

use std::time::{Duration, Instant};

use billgate_core::{
    sign, BillPayRequest, PriceType, ProductList, TransactionRequest, UpstreamClient,
    UpstreamConfig, UpstreamError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USERNAME: &str = "gw-user";
const API_KEY: &str = "dev-key";

fn test_config(mock_server: &MockServer) -> UpstreamConfig {
    UpstreamConfig::default()
        .with_url(mock_server.uri())
        .with_credentials(USERNAME, API_KEY)
        .with_backoff_unit(Duration::from_millis(20))
}

async fn create_test_client(mock_server: &MockServer) -> UpstreamClient {
    UpstreamClient::new(test_config(mock_server)).expect("failed to create client")
}

fn pln_success(customer_no: &str) -> serde_json::Value {
    json!({
        "data": {
            "rc": "00",
            "status": "Sukses",
            "customer_no": customer_no,
            "name": "JOHN",
            "segment_power": "R1 /000000900"
        }
    })
}

#[tokio::test]
async fn test_check_balance_signs_with_deposit_literal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cek-saldo"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "username": USERNAME,
            "api_key": API_KEY,
            "sign": sign(USERNAME, API_KEY, "deposit"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"deposit": 250000}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let resp = client.check_balance().await.expect("balance failed");
    assert_eq!(resp.data.deposit, 250000.0);
}

#[tokio::test]
async fn test_get_prices_sends_type_and_signs_pricelist() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/daftar-harga"))
        .and(body_partial_json(json!({
            "type": "prabayar",
            "sign": sign(USERNAME, API_KEY, "pricelist"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"code": "xld10", "name": "XL 10K", "category": "Pulsa", "price": 10100},
                {"code": "pln20", "name": "PLN 20K", "category": "PLN", "price": 20500}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let resp = client
        .get_prices(PriceType::Prabayar)
        .await
        .expect("price list failed");
    assert_eq!(resp.data.len(), 2);
    assert_eq!(resp.data.find_by_code("pln20").unwrap().price, 20500.0);
}

#[tokio::test]
async fn test_topup_signs_with_ref_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/topup"))
        .and(body_partial_json(json!({
            "ref_id": "REF-100",
            "customer_no": "081234567890",
            "buyer_sku": "xld10",
            "sign": sign(USERNAME, API_KEY, "REF-100"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "ref_id": "REF-100",
                "rc": "00",
                "status": "Sukses",
                "sn": "SN123",
                "buyer_last_saldo": 89900
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let req = TransactionRequest::new("REF-100", "081234567890", "xld10");
    let resp = client.topup(&req).await.expect("topup failed");
    assert!(resp.is_success());
    assert_eq!(resp.data.sn, "SN123");
}

#[tokio::test]
async fn test_pay_bill_sends_amount() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pascabayar/pay"))
        .and(body_partial_json(json!({
            "ref_id": "BILL-1",
            "amount": 125000.0,
            "sign": sign(USERNAME, API_KEY, "BILL-1"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"ref_id": "BILL-1", "rc": "00", "total": 127500}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let req = BillPayRequest {
        ref_id: "BILL-1".into(),
        customer_no: "530000000001".into(),
        buyer_sku: "pln".into(),
        amount: 125000.0,
    };
    let resp = client.pay_bill(&req).await.expect("bill pay failed");
    assert_eq!(resp.data.total, 127500.0);
}

#[tokio::test]
async fn test_inquiry_pln_signs_with_customer_no() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inquiry-pln"))
        .and(body_partial_json(json!({
            "customer_no": "12345678901",
            "sign": sign(USERNAME, API_KEY, "12345678901"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(pln_success("12345678901")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let resp = client
        .inquiry_pln("12345678901")
        .await
        .expect("inquiry failed");
    assert_eq!(resp.data.name, "JOHN");
    assert_eq!(resp.data.segment_power, "R1 /000000900");
}

#[tokio::test]
async fn test_business_failure_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cek-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"ref_id": "REF-404", "rc": "44", "status": "Gagal", "message": "Saldo tidak cukup"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let resp = client
        .check_status("REF-404")
        .await
        .expect("status call failed");
    assert!(!resp.is_success());
    assert_eq!(resp.rc(), "44");
}

#[tokio::test]
async fn test_retry_then_success_with_linear_backoff() {
    let mock_server = MockServer::start().await;

    // First two attempts fail
    Mock::given(method("POST"))
        .and(path("/inquiry-pln"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/inquiry-pln"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pln_success("5300")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let started = Instant::now();
    let resp = client.inquiry_pln("5300").await.expect("should succeed");
    let elapsed = started.elapsed();

    assert!(resp.is_success());
    // Sleeps of 1 and 2 units before attempts 2 and 3.
    assert!(
        elapsed >= Duration::from_millis(60),
        "backoff too short: {elapsed:?}"
    );
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cek-saldo"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let err = client.check_balance().await.unwrap_err();

    match &err {
        UpstreamError::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 3);
            assert!(matches!(
                **last,
                UpstreamError::Http { status: 500, .. }
            ));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert!(err.to_string().contains("upstream down"));
}

#[tokio::test]
async fn test_decode_failure_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cek-saldo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server).with_retry_attempts(2);
    let client = UpstreamClient::new(config).unwrap();
    let err = client.check_balance().await.unwrap_err();

    assert!(matches!(
        err.root(),
        UpstreamError::Decode { endpoint, .. } if endpoint == "/cek-saldo"
    ));
}

#[tokio::test]
async fn test_reply_without_data_is_business_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inquiry-pln"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Signature anda salah",
            "status": 0
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let resp = client.inquiry_pln("530000000001").await.expect("inquiry failed");

    assert!(!resp.is_success());
    assert_eq!(resp.rc(), "");
    assert_eq!(resp.message, "Signature anda salah");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_request_makes_no_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server).await;
    let err = client.inquiry_pln("  ").await.unwrap_err();
    assert!(matches!(err, UpstreamError::InvalidRequest { .. }));
    assert_eq!(err.exit_code(), 2);

    let bad_bill = BillPayRequest {
        ref_id: "B1".into(),
        customer_no: "5300".into(),
        buyer_sku: "pln".into(),
        amount: -1.0,
    };
    assert!(client.pay_bill(&bad_bill).await.is_err());
}
