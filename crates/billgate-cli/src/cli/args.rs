use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "billgate",
    version,
    about = "Signed billing API gateway with a cached PLN subscriber inquiry"
)]
pub struct Cli {
    /// YAML config file; missing file means defaults plus environment
    #[arg(long, global = true, env = "BILLGATE_CONFIG", default_value = "billgate.yaml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the deposit balance
    Balance,
    /// List products and prices
    Prices(PricesArgs),
    /// Submit a prepaid topup
    Topup(TransactionArgs),
    /// Submit a payment
    Pay(TransactionArgs),
    /// Check a transaction by reference id
    Status(StatusArgs),
    /// Postpaid bill check and payment
    Bill(BillArgs),
    /// PLN subscriber inquiry through the cache
    Inquiry(InquiryArgs),
    /// Inspect and administer the inquiry cache
    Cache(CacheArgs),
    /// Verify the signature of a transaction callback
    VerifyWebhook(VerifyWebhookArgs),
}

#[derive(Args, Clone)]
pub struct PricesArgs {
    /// prabayar | pascabayar; omit for all
    #[arg(long = "type", default_value = "")]
    pub price_type: String,

    /// Show only the product with this code
    #[arg(long)]
    pub code: Option<String>,

    /// Show only products in this category
    #[arg(long, conflicts_with = "code")]
    pub category: Option<String>,
}

#[derive(Args, Clone)]
pub struct TransactionArgs {
    pub customer_no: String,

    #[arg(long)]
    pub sku: String,

    /// Reference id; generated when omitted
    #[arg(long)]
    pub ref_id: Option<String>,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    pub ref_id: String,
}

#[derive(Args, Clone)]
pub struct BillArgs {
    #[command(subcommand)]
    pub cmd: BillSub,
}

#[derive(Subcommand, Clone)]
pub enum BillSub {
    /// Look up the outstanding bill
    Check(TransactionArgs),
    /// Pay a previously checked bill
    Pay(BillPayArgs),
}

#[derive(Args, Clone)]
pub struct BillPayArgs {
    #[command(flatten)]
    pub tx: TransactionArgs,

    #[arg(long)]
    pub amount: f64,
}

#[derive(Args, Clone)]
pub struct InquiryArgs {
    pub customer_no: String,

    /// Reference id; generated when omitted
    #[arg(long)]
    pub ref_id: Option<String>,

    /// Bypass the cache for this call
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub cmd: CacheSub,
}

#[derive(Subcommand, Clone)]
pub enum CacheSub {
    /// Entry counts from the cache backend
    Stats,
    /// Drop the entry for one customer
    Clear { customer_no: String },
    /// Drop every entry
    ClearAll,
    /// Remove expired entries
    Sweep,
    /// Check the backend is reachable
    Ping,
}

#[derive(Args, Clone)]
pub struct VerifyWebhookArgs {
    /// JSON callback body; `-` reads stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,
}
