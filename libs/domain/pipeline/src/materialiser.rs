// [libs/domain/pipeline/src/materialiser.rs]
//!
//! Walks the staged flows level by level (root to leaf) and inserts every
//! address range that does not yet have a Node row, deriving its layout
//! from its already-present parent.

use crate::errors::PipelineError;
use flowmap_core_addr::Subnet;
use flowmap_core_layout::{geometry_for, Geometry};
use flowmap_infra_store::TableNames;
use libsql::{params, Transaction};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Inserts every /8, /16, /24, and /32 node touched by this batch's
/// staged flows that is not already present. Idempotent: re-running over
/// the same staging data finds nothing left to insert.
#[instrument(skip(tx, tables))]
pub async fn materialise_nodes(tx: &Transaction, tables: &TableNames) -> Result<usize, PipelineError> {
    let endpoints = distinct_endpoints(tx, &tables.syslog).await?;
    if endpoints.is_empty() {
        return Ok(0);
    }

    let mut inserted = 0usize;
    // ipstart (at the level just processed) -> its geometry, carried
    // forward as the parent lookup for the next, finer level.
    let mut parent_geometries: HashMap<u32, Geometry> = HashMap::new();

    for level in Subnet::ASCENDING {
        let mut distinct_ranges: HashSet<(u32, u32)> = HashSet::new();
        for &ip in &endpoints {
            let range = level.range_of(ip);
            distinct_ranges.insert((range.ipstart, range.ipend));
        }

        let existing = existing_node_geometries(tx, &tables.nodes, level).await?;
        let mut this_level_geometries: HashMap<u32, Geometry> = existing.clone();

        for (ipstart, ipend) in distinct_ranges {
            if existing.contains_key(&ipstart) {
                continue;
            }

            let geometry = match level.parent() {
                None => geometry_for(level, ipstart, None),
                Some(parent_level) => {
                    let parent_ipstart = parent_level.range_of(ipstart).ipstart;
                    let parent_geometry = parent_geometries.get(&parent_ipstart).ok_or_else(|| {
                        PipelineError::InvariantViolation(format!(
                            "missing parent geometry for {ipstart} at level {level:?}"
                        ))
                    })?;
                    geometry_for(level, ipstart, Some(parent_geometry))
                }
            };

            insert_node(tx, &tables.nodes, ipstart, ipend, level, &geometry).await?;
            this_level_geometries.insert(ipstart, geometry);
            inserted += 1;
        }

        parent_geometries = this_level_geometries;
    }

    debug!(inserted, "node materialisation complete");
    Ok(inserted)
}

async fn distinct_endpoints(tx: &Transaction, syslog_table: &str) -> Result<Vec<u32>, PipelineError> {
    let sql = format!("SELECT src FROM {syslog_table} UNION SELECT dst FROM {syslog_table}");
    let mut rows = tx.query(&sql, ()).await.map_err(flowmap_infra_store::DbError::QueryError)?;
    let mut endpoints = Vec::new();
    while let Some(row) = rows.next().await.map_err(flowmap_infra_store::DbError::QueryError)? {
        endpoints.push(row.get::<u32>(0).map_err(flowmap_infra_store::DbError::QueryError)?);
    }
    Ok(endpoints)
}

async fn existing_node_geometries(
    tx: &Transaction,
    nodes_table: &str,
    level: Subnet,
) -> Result<HashMap<u32, Geometry>, PipelineError> {
    let sql = format!("SELECT ipstart, x, y, radius FROM {nodes_table} WHERE subnet = ?1");
    let mut rows = tx
        .query(&sql, params![level.as_db_value() as i64])
        .await
        .map_err(flowmap_infra_store::DbError::QueryError)?;

    let mut geometries = HashMap::new();
    while let Some(row) = rows.next().await.map_err(flowmap_infra_store::DbError::QueryError)? {
        let ipstart: u32 = row.get(0).map_err(flowmap_infra_store::DbError::QueryError)?;
        let geometry = Geometry {
            x: row.get(1).map_err(flowmap_infra_store::DbError::QueryError)?,
            y: row.get(2).map_err(flowmap_infra_store::DbError::QueryError)?,
            radius: row.get(3).map_err(flowmap_infra_store::DbError::QueryError)?,
        };
        geometries.insert(ipstart, geometry);
    }
    Ok(geometries)
}

async fn insert_node(
    tx: &Transaction,
    nodes_table: &str,
    ipstart: u32,
    ipend: u32,
    level: Subnet,
    geometry: &Geometry,
) -> Result<(), PipelineError> {
    let sql = format!(
        "INSERT INTO {nodes_table} (ipstart, ipend, subnet, x, y, radius) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
    );
    tx.execute(
        &sql,
        params![
            ipstart,
            ipend,
            level.as_db_value() as i64,
            geometry.x,
            geometry.y,
            geometry.radius
        ],
    )
    .await
    .map_err(flowmap_infra_store::DbError::QueryError)?;
    Ok(())
}
