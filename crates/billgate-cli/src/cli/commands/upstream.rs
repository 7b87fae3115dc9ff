use std::io::Read;

use anyhow::Context;
use billgate_core::{
    BillPayRequest, Envelope, GatewayConfig, PriceType, ProductList, ResultCode,
    TransactionRequest, Webhook,
};
use serde::Serialize;

use super::{build_client, new_ref_id, print_json, upstream_failure};
use crate::cli::args::{BillPayArgs, PricesArgs, StatusArgs, TransactionArgs, VerifyWebhookArgs};
use crate::exit_codes::{BUSINESS_FAILURE, CONFIG_ERROR, SUCCESS};

/// Print a decoded reply; RC other than "00" maps to a business failure.
fn finish<T: ResultCode + Serialize>(resp: &Envelope<T>) -> anyhow::Result<i32> {
    print_json(resp)?;
    Ok(if resp.is_success() {
        SUCCESS
    } else {
        BUSINESS_FAILURE
    })
}

pub async fn balance(config: &GatewayConfig) -> anyhow::Result<i32> {
    let client = build_client(config)?;
    match client.check_balance().await {
        Ok(resp) => {
            print_json(&resp)?;
            Ok(SUCCESS)
        }
        Err(e) => Ok(upstream_failure(&e)),
    }
}

pub async fn prices(config: &GatewayConfig, args: PricesArgs) -> anyhow::Result<i32> {
    let price_type: PriceType = match args.price_type.parse() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(CONFIG_ERROR);
        }
    };

    let client = build_client(config)?;
    let resp = match client.get_prices(price_type).await {
        Ok(resp) => resp,
        Err(e) => return Ok(upstream_failure(&e)),
    };

    if let Some(code) = &args.code {
        return match resp.data.find_by_code(code) {
            Some(product) => {
                print_json(product)?;
                Ok(SUCCESS)
            }
            None => {
                eprintln!("product not found: {code}");
                Ok(BUSINESS_FAILURE)
            }
        };
    }
    if let Some(category) = &args.category {
        print_json(&resp.data.by_category(category))?;
        return Ok(SUCCESS);
    }
    print_json(&resp.data)?;
    Ok(SUCCESS)
}

fn transaction_request(args: TransactionArgs) -> TransactionRequest {
    TransactionRequest::new(new_ref_id(args.ref_id), args.customer_no, args.sku)
}

pub async fn topup(config: &GatewayConfig, args: TransactionArgs) -> anyhow::Result<i32> {
    let client = build_client(config)?;
    match client.topup(&transaction_request(args)).await {
        Ok(resp) => finish(&resp),
        Err(e) => Ok(upstream_failure(&e)),
    }
}

pub async fn pay(config: &GatewayConfig, args: TransactionArgs) -> anyhow::Result<i32> {
    let client = build_client(config)?;
    match client.pay(&transaction_request(args)).await {
        Ok(resp) => finish(&resp),
        Err(e) => Ok(upstream_failure(&e)),
    }
}

pub async fn status(config: &GatewayConfig, args: StatusArgs) -> anyhow::Result<i32> {
    let client = build_client(config)?;
    match client.check_status(&args.ref_id).await {
        Ok(resp) => finish(&resp),
        Err(e) => Ok(upstream_failure(&e)),
    }
}

pub async fn bill_check(config: &GatewayConfig, args: TransactionArgs) -> anyhow::Result<i32> {
    let client = build_client(config)?;
    match client.check_bill(&transaction_request(args)).await {
        Ok(resp) => finish(&resp),
        Err(e) => Ok(upstream_failure(&e)),
    }
}

pub async fn bill_pay(config: &GatewayConfig, args: BillPayArgs) -> anyhow::Result<i32> {
    let client = build_client(config)?;
    let req = BillPayRequest {
        ref_id: new_ref_id(args.tx.ref_id),
        customer_no: args.tx.customer_no,
        buyer_sku: args.tx.sku,
        amount: args.amount,
    };
    match client.pay_bill(&req).await {
        Ok(resp) => finish(&resp),
        Err(e) => Ok(upstream_failure(&e)),
    }
}

pub fn verify_webhook(config: &GatewayConfig, args: VerifyWebhookArgs) -> anyhow::Result<i32> {
    let body = if args.input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read webhook from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?
    };

    let webhook: Webhook = serde_json::from_str(&body).context("webhook is not valid JSON")?;
    let client = build_client(config)?;
    let valid = client.verify_webhook(&webhook);
    print_json(&serde_json::json!({
        "ref_id": webhook.ref_id,
        "valid": valid,
    }))?;
    Ok(if valid { SUCCESS } else { BUSINESS_FAILURE })
}
