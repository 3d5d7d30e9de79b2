// [libs/domain/pipeline/src/driver.rs]
//!
//! Owns the single transaction a batch runs inside and drives every
//! stage in order. Any error before the final commit rolls the whole
//! batch back; there is no partial commit.

use crate::dispatch::{dispatch, HookRegistry, RuleEvaluator, RuleJob};
use crate::errors::PipelineError;
use crate::materialiser::materialise_nodes;
use crate::merge::merge_staging_links;
use crate::rollup::{rebuild_rollups, staging_timerange};
use crate::staging::aggregate_staging_links;
use crate::sweep::sweep_staging;
use flowmap_infra_store::{DbError, Dialect, StoreClient, TableNames};
use tracing::{info, instrument};

/// Where a batch run landed. Mirrors the state machine in the pipeline
/// driver's specification: every non-terminal state collapses into
/// either `Committed` or `RolledBack` by the time `run` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Committed,
    RolledBack,
}

/// Counts of rows touched at each stage, returned on a committed batch
/// so callers can log or assert on them without re-querying the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReport {
    pub nodes_inserted: usize,
    pub staging_links: usize,
    pub master_links_merged: usize,
    pub links_in: usize,
    pub links_out: usize,
}

/// Runs one full batch for `(subscription, datasource)` against `store`,
/// rule evaluation gated by `rules_enabled`. Whether the batch commits
/// or rolls back, the staging tables end up consistent: a committed
/// batch has swept its staging rows, a rolled-back one has not touched
/// anything at all. Every failure mode — a bad connection, a failed
/// query, a rejected rule submission — is caught and turned into
/// `RolledBack` here, so this can never return an error to its caller.
#[instrument(skip(store, dialect, evaluator, hooks))]
pub async fn run(
    store: &StoreClient,
    dialect: &dyn Dialect,
    evaluator: &dyn RuleEvaluator,
    hooks: &HookRegistry,
    rules_enabled: bool,
    subscription: &str,
    datasource: &str,
) -> (BatchOutcome, BatchReport) {
    let tables = store.tables().clone();

    match run_inner(store, dialect, evaluator, hooks, rules_enabled, subscription, datasource, &tables).await {
        Ok(report) => {
            info!(?report, "batch committed");
            (BatchOutcome::Committed, report)
        }
        Err(err) => {
            info!(%err, "batch rolled back");
            (BatchOutcome::RolledBack, BatchReport::default())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_inner(
    store: &StoreClient,
    dialect: &dyn Dialect,
    evaluator: &dyn RuleEvaluator,
    hooks: &HookRegistry,
    rules_enabled: bool,
    subscription: &str,
    datasource: &str,
    tables: &TableNames,
) -> Result<BatchReport, PipelineError> {
    let conn = store.connection()?;
    let tx = conn.transaction().await.map_err(DbError::QueryError)?;

    let mut report = BatchReport::default();

    // NODES
    report.nodes_inserted = materialise_nodes(&tx, tables).await?;

    // STAGING_LINKS
    report.staging_links = aggregate_staging_links(&tx, tables, dialect).await?;

    // MASTER_LINKS
    report.master_links_merged = merge_staging_links(&tx, tables).await?;

    // The staging window must be captured before sweep empties the
    // table the window is read from.
    let (t_start, t_end) = staging_timerange(&tx, &tables.staging_links).await?;

    // ROLLUP
    let (links_in, links_out) = rebuild_rollups(&tx, tables, (t_start, t_end)).await?;
    report.links_in = links_in;
    report.links_out = links_out;

    // DISPATCH
    let job = RuleJob {
        subscription: subscription.to_string(),
        datasource: datasource.to_string(),
        t_start,
        t_end,
    };
    dispatch(evaluator, hooks, rules_enabled, job).await?;

    // SWEEP
    sweep_staging(&tx, tables).await?;

    tx.commit().await.map_err(|e| PipelineError::Store(DbError::TransactionError(e.to_string())))?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::NoopRuleEvaluator;
    use flowmap_infra_store::{SqliteDialect, TableNames};

    async fn store() -> StoreClient {
        let tables = TableNames::new("1", "1").unwrap();
        StoreClient::connect(":memory:", None, tables).await.unwrap()
    }

    #[tokio::test]
    async fn empty_batch_commits_as_a_no_op() {
        let store = store().await;
        let dialect = SqliteDialect;
        let hooks = HookRegistry::new();
        let (outcome, report) = run(&store, &dialect, &NoopRuleEvaluator, &hooks, false, "1", "1").await;
        assert_eq!(outcome, BatchOutcome::Committed);
        assert_eq!(report.nodes_inserted, 0);
    }

    #[tokio::test]
    async fn rule_evaluation_failure_rolls_the_batch_back() {
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl RuleEvaluator for AlwaysFails {
            async fn submit(&self, _job: RuleJob) -> Result<(), String> {
                Err("rule engine unreachable".to_string())
            }
        }

        let store = store().await;
        let dialect = SqliteDialect;
        let hooks = HookRegistry::new();
        let (outcome, _) = run(&store, &dialect, &AlwaysFails, &hooks, true, "1", "1").await;
        assert_eq!(outcome, BatchOutcome::RolledBack);
    }

    async fn insert_flow(conn: &libsql::Connection, syslog_table: &str, src: u32, dst: u32, timestamp: i64) {
        let sql = format!(
            "INSERT INTO {syslog_table} (src, dst, dstport, protocol, timestamp,
                bytes_sent, bytes_received, packets_sent, packets_received, duration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        );
        conn.execute(
            &sql,
            libsql::params![src, dst, 443i64, "TCP", timestamp, 100i64, 200i64, 2i64, 3i64, 0.5f64],
        )
        .await
        .unwrap();
    }

    /// Concrete scenario 2: a single flow sharing src/dst up to the /24,
    /// driven through the full materialise -> stage -> merge -> rollup ->
    /// dispatch -> sweep sequence.
    #[tokio::test]
    async fn a_single_flow_commits_and_populates_every_table() {
        let store = store().await;
        let tables = store.tables().clone();
        let conn = store.connection().unwrap();

        let src = (10u32 << 24) | 1; // 10.0.0.1
        let dst = (10u32 << 24) | 2; // 10.0.0.2
        insert_flow(&conn, &tables.syslog, src, dst, 1_700_000_123).await;

        let dialect = SqliteDialect;
        let hooks = HookRegistry::new();
        let (outcome, report) = run(&store, &dialect, &NoopRuleEvaluator, &hooks, false, "1", "1").await;

        assert_eq!(outcome, BatchOutcome::Committed);
        // The /8, /16, and /24 ancestors are shared by both hosts; each
        // host gets its own /32.
        assert_eq!(report.nodes_inserted, 5);
        assert_eq!(report.staging_links, 1);
        assert_eq!(report.master_links_merged, 1);
        assert_eq!(report.links_in, 4);
        assert_eq!(report.links_out, 4);

        let mut rows = conn.query(&format!("SELECT COUNT(*) FROM {}", tables.syslog), ()).await.unwrap();
        let remaining: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(remaining, 0, "syslog is swept after a committed batch");

        let mut rows =
            conn.query(&format!("SELECT links, bytes_sent FROM {}", tables.links), ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let links: i64 = row.get(0).unwrap();
        let bytes_sent: i64 = row.get(1).unwrap();
        assert_eq!(links, 1);
        assert_eq!(bytes_sent, 100);
    }

    /// Concrete scenario 3: running the same flow through two separate
    /// batches additively merges into the master Link row.
    #[tokio::test]
    async fn two_batches_of_the_same_flow_merge_additively() {
        let store = store().await;
        let tables = store.tables().clone();
        let conn = store.connection().unwrap();
        let dialect = SqliteDialect;
        let hooks = HookRegistry::new();

        let src = (10u32 << 24) | 1;
        let dst = (10u32 << 24) | 2;

        insert_flow(&conn, &tables.syslog, src, dst, 1_700_000_123).await;
        let (outcome, _) = run(&store, &dialect, &NoopRuleEvaluator, &hooks, false, "1", "1").await;
        assert_eq!(outcome, BatchOutcome::Committed);

        insert_flow(&conn, &tables.syslog, src, dst, 1_700_000_123).await;
        let (outcome, _) = run(&store, &dialect, &NoopRuleEvaluator, &hooks, false, "1", "1").await;
        assert_eq!(outcome, BatchOutcome::Committed);

        let mut rows =
            conn.query(&format!("SELECT links, bytes_sent, duration FROM {}", tables.links), ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let links: i64 = row.get(0).unwrap();
        let bytes_sent: i64 = row.get(1).unwrap();
        let duration: f64 = row.get(2).unwrap();
        assert_eq!(links, 2);
        assert_eq!(bytes_sent, 200);
        assert!((duration - 0.5).abs() < 1e-9);
    }
}
