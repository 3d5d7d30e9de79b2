// [libs/domain/pipeline/src/merge.rs]
//!
//! Upserts each batch's staged links into the master `Link` table,
//! additively combining counters and weighted-averaging duration against
//! whatever was already there.

use crate::errors::PipelineError;
use flowmap_domain_models::StagingLink;
use flowmap_infra_store::{DbError, TableNames};
use libsql::{params, Transaction};
use tracing::{debug, instrument};

#[instrument(skip(tx, tables))]
pub async fn merge_staging_links(tx: &Transaction, tables: &TableNames) -> Result<usize, PipelineError> {
    let staged = fetch_staging_links(tx, &tables.staging_links).await?;
    for link in &staged {
        merge_one(tx, &tables.links, link).await?;
    }
    debug!(count = staged.len(), "staged links merged into master table");
    Ok(staged.len())
}

async fn fetch_staging_links(
    tx: &Transaction,
    staging_table: &str,
) -> Result<Vec<StagingLink>, PipelineError> {
    let sql = format!(
        "SELECT src, dst, port, protocol, timestamp, links, bytes_sent, bytes_received,
            packets_sent, packets_received, duration FROM {staging_table}"
    );
    let mut rows = tx.query(&sql, ()).await.map_err(DbError::QueryError)?;
    let mut links = Vec::new();
    while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
        links.push(StagingLink {
            src: row.get(0).map_err(DbError::QueryError)?,
            dst: row.get(1).map_err(DbError::QueryError)?,
            port: row.get(2).map_err(DbError::QueryError)?,
            protocol: row.get(3).map_err(DbError::QueryError)?,
            timestamp: row.get(4).map_err(DbError::QueryError)?,
            links: row.get(5).map_err(DbError::QueryError)?,
            bytes_sent: row.get(6).map_err(DbError::QueryError)?,
            bytes_received: row.get(7).map_err(DbError::QueryError)?,
            packets_sent: row.get(8).map_err(DbError::QueryError)?,
            packets_received: row.get(9).map_err(DbError::QueryError)?,
            duration: row.get(10).map_err(DbError::QueryError)?,
        });
    }
    Ok(links)
}

async fn merge_one(tx: &Transaction, links_table: &str, staged: &StagingLink) -> Result<(), PipelineError> {
    if staged.links < 1 {
        return Err(PipelineError::InvariantViolation(format!(
            "staging link {}->{} at {} has links={}, expected >= 1",
            staged.src, staged.dst, staged.timestamp, staged.links
        )));
    }

    let select_sql = format!(
        "SELECT links, bytes_sent, bytes_received, packets_sent, packets_received, duration
         FROM {links_table}
         WHERE src = ?1 AND dst = ?2 AND port = ?3 AND protocol = ?4 AND timestamp = ?5"
    );
    let mut rows = tx
        .query(
            &select_sql,
            params![staged.src, staged.dst, staged.port, staged.protocol.clone(), staged.timestamp],
        )
        .await
        .map_err(DbError::QueryError)?;

    let existing = rows.next().await.map_err(DbError::QueryError)?;

    let (links, bytes_sent, bytes_received, packets_sent, packets_received, duration) = match existing {
        None => (
            staged.links,
            staged.bytes_sent,
            staged.bytes_received,
            staged.packets_sent,
            staged.packets_received,
            staged.duration,
        ),
        Some(row) => {
            let old_links: i64 = row.get(0).map_err(DbError::QueryError)?;
            let old_bytes_sent: i64 = row.get(1).map_err(DbError::QueryError)?;
            let old_bytes_received: i64 = row.get(2).map_err(DbError::QueryError)?;
            let old_packets_sent: i64 = row.get(3).map_err(DbError::QueryError)?;
            let old_packets_received: i64 = row.get(4).map_err(DbError::QueryError)?;
            let old_duration: f64 = row.get(5).map_err(DbError::QueryError)?;

            let total_links = old_links + staged.links;
            let duration = (staged.duration * staged.links as f64 + old_duration * old_links as f64)
                / total_links as f64;

            (
                total_links,
                old_bytes_sent + staged.bytes_sent,
                old_bytes_received + staged.bytes_received,
                old_packets_sent + staged.packets_sent,
                old_packets_received + staged.packets_received,
                duration,
            )
        }
    };

    let upsert_sql = format!(
        "INSERT INTO {links_table}
            (src, dst, port, protocol, timestamp, links, bytes_sent, bytes_received, packets_sent, packets_received, duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(src, dst, port, protocol, timestamp) DO UPDATE SET
            links = excluded.links,
            bytes_sent = excluded.bytes_sent,
            bytes_received = excluded.bytes_received,
            packets_sent = excluded.packets_sent,
            packets_received = excluded.packets_received,
            duration = excluded.duration"
    );
    tx.execute(
        &upsert_sql,
        params![
            staged.src,
            staged.dst,
            staged.port,
            staged.protocol.clone(),
            staged.timestamp,
            links,
            bytes_sent,
            bytes_received,
            packets_sent,
            packets_received,
            duration
        ],
    )
    .await
    .map_err(DbError::QueryError)?;

    Ok(())
}
