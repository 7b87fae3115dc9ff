use anyhow::Context;
use billgate_core::{
    open_store, GatewayConfig, InquiryCacheService, InquiryError, StoreError, UpstreamClient,
};
use serde_json::json;

use super::{build_client, new_ref_id, print_json, upstream_failure};
use crate::cli::args::{CacheSub, InquiryArgs};
use crate::exit_codes::{BUSINESS_FAILURE, CACHE_ERROR, SUCCESS};

fn cache_failure(err: &StoreError) -> i32 {
    eprintln!("cache error: {err}");
    CACHE_ERROR
}

fn inquiry_failure(err: &InquiryError) -> i32 {
    match err {
        InquiryError::Upstream(e) => upstream_failure(e),
        InquiryError::Cache(e) => cache_failure(e),
    }
}

pub async fn inquiry(config: GatewayConfig, args: InquiryArgs) -> anyhow::Result<i32> {
    let client = build_client(&config)?;
    let store = match open_store(&config.store).await {
        Ok(store) => store,
        Err(e) => return Ok(cache_failure(&e)),
    };

    let mut policy = config.inquiry.clone();
    if args.no_cache {
        policy.enabled = false;
    }
    let service = InquiryCacheService::with_config(client, store, policy);

    let ref_id = new_ref_id(args.ref_id);
    match service.inquiry(&ref_id, &args.customer_no).await {
        Ok(resp) => {
            print_json(&resp)?;
            tracing::debug!(stats = ?service.stats(), "inquiry stats");
            Ok(if resp.is_success() {
                SUCCESS
            } else {
                BUSINESS_FAILURE
            })
        }
        Err(e) => Ok(inquiry_failure(&e)),
    }
}

pub async fn run(config: GatewayConfig, cmd: CacheSub) -> anyhow::Result<i32> {
    let store = match open_store(&config.store).await {
        Ok(store) => store,
        Err(e) => return Ok(cache_failure(&e)),
    };

    if let CacheSub::Ping = cmd {
        return match store.ping().await {
            Ok(()) => {
                eprintln!("{} backend reachable", store.backend_name());
                Ok(SUCCESS)
            }
            Err(e) => Ok(cache_failure(&e)),
        };
    }

    // Administration never calls upstream, so credentials are optional here.
    let backend = store.backend_name();
    let client =
        UpstreamClient::new(config.upstream.clone()).context("failed to create upstream client")?;
    let service = InquiryCacheService::with_config(client, store, config.inquiry.clone());

    let result = match cmd {
        CacheSub::Stats => match service.cache_stats().await {
            Ok(stats) => {
                print_json(&json!({
                    "backend": backend,
                    "total": stats.total,
                    "expired": stats.expired,
                    "active": stats.active,
                }))?;
                Ok(())
            }
            Err(e) => Err(e),
        },
        CacheSub::Clear { customer_no } => service.clear_cache(&customer_no).await.map(|()| {
            eprintln!("cleared cache entry for {customer_no}");
        }),
        CacheSub::ClearAll => service.clear_all_cache().await.map(|()| {
            eprintln!("cleared all {backend} cache entries");
        }),
        CacheSub::Sweep => service.delete_expired_cache().await.map(|removed| {
            eprintln!("removed {removed} expired entries");
        }),
        CacheSub::Ping => Ok(()),
    };

    match result {
        Ok(()) => Ok(SUCCESS),
        Err(e) => Ok(inquiry_failure(&e)),
    }
}
