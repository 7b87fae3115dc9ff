use super::args::*;

pub mod cache;
pub mod upstream;

use anyhow::Context;
use billgate_core::{GatewayConfig, UpstreamClient, UpstreamError};
use serde::Serialize;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = GatewayConfig::load(Some(cli.config.as_path()))?;
    tracing::debug!(
        config = %cli.config.display(),
        base_url = %config.upstream.base_url,
        "configuration loaded"
    );

    match cli.cmd {
        Command::Balance => upstream::balance(&config).await,
        Command::Prices(args) => upstream::prices(&config, args).await,
        Command::Topup(args) => upstream::topup(&config, args).await,
        Command::Pay(args) => upstream::pay(&config, args).await,
        Command::Status(args) => upstream::status(&config, args).await,
        Command::Bill(args) => match args.cmd {
            BillSub::Check(args) => upstream::bill_check(&config, args).await,
            BillSub::Pay(args) => upstream::bill_pay(&config, args).await,
        },
        Command::Inquiry(args) => cache::inquiry(config, args).await,
        Command::Cache(args) => cache::run(config, args.cmd).await,
        Command::VerifyWebhook(args) => upstream::verify_webhook(&config, args),
    }
}

pub(crate) fn build_client(config: &GatewayConfig) -> anyhow::Result<UpstreamClient> {
    if !config.upstream.credentials().is_complete() {
        anyhow::bail!("upstream credentials missing: set BILLGATE_USERNAME and BILLGATE_API_KEY");
    }
    UpstreamClient::new(config.upstream.clone()).context("failed to create upstream client")
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn upstream_failure(err: &UpstreamError) -> i32 {
    eprintln!("error: {err}");
    err.exit_code()
}

pub(crate) fn new_ref_id(explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
