// [libs/domain/pipeline/src/sweep.rs]
//!
//! Clears the staging tables once a batch's data has been folded into
//! the master tables and rolled up. Running this against an
//! already-empty staging area is a successful no-op.

use crate::errors::PipelineError;
use flowmap_infra_store::{DbError, TableNames};
use libsql::Transaction;
use tracing::instrument;

#[instrument(skip(tx, tables))]
pub async fn sweep_staging(tx: &Transaction, tables: &TableNames) -> Result<(), PipelineError> {
    for table in [&tables.syslog, &tables.staging_links] {
        let sql = format!("DELETE FROM {table}");
        tx.execute(&sql, ()).await.map_err(DbError::QueryError)?;
    }
    Ok(())
}
