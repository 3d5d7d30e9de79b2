// [libs/infra/store/src/schema.rs]
//!
//! Schema bootstrap. Table names are per-(subscription, datasource), so
//! this builds its `CREATE TABLE` statements from a [`TableNames`] rather
//! than a fixed list — `IF NOT EXISTS` makes it safe to call on every
//! connect, matching how the upstream tool re-applied its schema on boot.

use crate::errors::DbError;
use crate::tables::TableNames;
use libsql::Connection;
use tracing::{debug, instrument};

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection, tables: &TableNames) -> Result<(), DbError> {
    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                ipstart INTEGER NOT NULL,
                ipend INTEGER NOT NULL,
                subnet INTEGER NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                radius REAL NOT NULL,
                alias TEXT,
                env TEXT,
                PRIMARY KEY (ipstart, ipend)
            );",
            tables.nodes
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                ipstart INTEGER NOT NULL,
                ipend INTEGER NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (ipstart, ipend, tag)
            );",
            tables.tags
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                src INTEGER NOT NULL,
                dst INTEGER NOT NULL,
                dstport INTEGER NOT NULL,
                protocol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                bytes_sent INTEGER NOT NULL DEFAULT 0,
                bytes_received INTEGER NOT NULL DEFAULT 0,
                packets_sent INTEGER NOT NULL DEFAULT 0,
                packets_received INTEGER NOT NULL DEFAULT 0,
                duration REAL NOT NULL DEFAULT 0
            );",
            tables.syslog
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                src INTEGER NOT NULL,
                dst INTEGER NOT NULL,
                port INTEGER NOT NULL,
                protocol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                links INTEGER NOT NULL DEFAULT 0,
                bytes_sent INTEGER NOT NULL DEFAULT 0,
                bytes_received INTEGER NOT NULL DEFAULT 0,
                packets_sent INTEGER NOT NULL DEFAULT 0,
                packets_received INTEGER NOT NULL DEFAULT 0,
                duration REAL NOT NULL DEFAULT 0
            );",
            tables.staging_links
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                src INTEGER NOT NULL,
                dst INTEGER NOT NULL,
                port INTEGER NOT NULL,
                protocol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                links INTEGER NOT NULL DEFAULT 0,
                bytes_sent INTEGER NOT NULL DEFAULT 0,
                bytes_received INTEGER NOT NULL DEFAULT 0,
                packets_sent INTEGER NOT NULL DEFAULT 0,
                packets_received INTEGER NOT NULL DEFAULT 0,
                duration REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (src, dst, port, protocol, timestamp)
            );",
            tables.links
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                src_start INTEGER NOT NULL,
                src_end INTEGER NOT NULL,
                dst_start INTEGER NOT NULL,
                dst_end INTEGER NOT NULL,
                protocols TEXT NOT NULL,
                port INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                links INTEGER NOT NULL DEFAULT 0,
                bytes INTEGER NOT NULL DEFAULT 0,
                packets INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (src_start, src_end, dst_start, dst_end, port, timestamp)
            );",
            tables.links_in
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                src_start INTEGER NOT NULL,
                src_end INTEGER NOT NULL,
                dst_start INTEGER NOT NULL,
                dst_end INTEGER NOT NULL,
                protocols TEXT NOT NULL,
                port INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                links INTEGER NOT NULL DEFAULT 0,
                bytes INTEGER NOT NULL DEFAULT 0,
                packets INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (src_start, src_end, dst_start, dst_end, port, timestamp)
            );",
            tables.links_out
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_ts ON {}(timestamp);",
            tables.staging_links, tables.staging_links
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_ts ON {}(timestamp);",
            tables.links, tables.links
        ),
    ];

    for sql in &statements {
        debug!(%sql, "applying schema statement");
        conn.execute(sql, ()).await.map_err(DbError::QueryError)?;
    }
    Ok(())
}
