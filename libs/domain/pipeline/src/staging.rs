// [libs/domain/pipeline/src/staging.rs]
//!
//! Buckets raw `Syslog` rows into 5-minute `StagingLink` groups.

use crate::errors::PipelineError;
use flowmap_infra_store::{Dialect, DbError, TableNames};
use libsql::Transaction;
use tracing::{debug, instrument};

const BUCKET_SECONDS: i64 = 300;

#[instrument(skip(tx, tables, dialect))]
pub async fn aggregate_staging_links(
    tx: &Transaction,
    tables: &TableNames,
    dialect: &dyn Dialect,
) -> Result<usize, PipelineError> {
    let bucket_expr = dialect.time_bucket_expr("timestamp", BUCKET_SECONDS);

    let sql = format!(
        "INSERT INTO {staging} (src, dst, port, protocol, timestamp,
            links, bytes_sent, bytes_received, packets_sent, packets_received, duration)
         SELECT src, dst, dstport, protocol, {bucket_expr} AS ts,
            COUNT(1), SUM(bytes_sent), SUM(bytes_received),
            SUM(packets_sent), SUM(packets_received), AVG(duration)
         FROM {syslog}
         GROUP BY src, dst, dstport, protocol, ts",
        staging = tables.staging_links,
        syslog = tables.syslog,
    );

    let affected = tx.execute(&sql, ()).await.map_err(DbError::QueryError)? as usize;
    debug!(affected, "staged links aggregated from syslog");
    Ok(affected)
}
