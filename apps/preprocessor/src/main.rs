// [apps/preprocessor/src/main.rs]
//!
//! `preprocess <datasource>` runs one pipeline batch against the store
//! for a fixed subscription and the named (or numbered) datasource, then
//! exits 0 on a committed batch or non-zero on rollback.

use anyhow::{bail, Result};
use clap::Parser;
use flowmap_domain_pipeline::{run, BatchOutcome, HookRegistry, NoopRuleEvaluator};
use flowmap_infra_store::{SqliteDialect, StoreClient, TableNames};
use tracing::{error, info, instrument};

/// `preprocess <datasource-name-or-id>`
#[derive(Parser, Debug)]
#[command(name = "preprocess", version, about = "Runs one flow-ingestion batch for a datasource.")]
struct Args {
    /// Name or numeric id of the datasource to process.
    datasource: String,

    /// Subscription the datasource belongs to.
    #[arg(long, env = "FLOWMAP_SUBSCRIPTION", default_value = "1")]
    subscription: String,

    /// Store connection URL (a local path, `:memory:`, or a `libsql://` remote).
    #[arg(long, env = "FLOWMAP_DATABASE_URL", default_value = "flowmap.db")]
    database_url: String,

    /// Auth token for a remote store; ignored for local/in-memory urls.
    #[arg(long, env = "FLOWMAP_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Run security-rule evaluation for this batch.
    #[arg(long, default_value_t = true)]
    security_rules: bool,
}

#[instrument(skip(args))]
async fn run_once(args: Args) -> Result<BatchOutcome> {
    let tables = TableNames::new(&args.subscription, &args.datasource)?;
    let store = StoreClient::connect(&args.database_url, args.auth_token.clone(), tables).await?;
    let dialect = SqliteDialect;
    let evaluator = NoopRuleEvaluator;
    let hooks = HookRegistry::new();

    info!(subscription = %args.subscription, datasource = %args.datasource, "beginning preprocessing");

    let (outcome, report) = run(
        &store,
        &dialect,
        &evaluator,
        &hooks,
        args.security_rules,
        &args.subscription,
        &args.datasource,
    )
    .await;

    match outcome {
        BatchOutcome::Committed => info!(?report, "preprocessing completed successfully"),
        BatchOutcome::RolledBack => error!("preprocessing rolled back"),
    }

    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if args.datasource.trim().is_empty() {
        eprintln!("usage: preprocess <datasource-name-or-id>");
        bail!("missing datasource argument");
    }

    match run_once(args).await? {
        BatchOutcome::Committed => Ok(()),
        BatchOutcome::RolledBack => bail!("batch rolled back"),
    }
}
