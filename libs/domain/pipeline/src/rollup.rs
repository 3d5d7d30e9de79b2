// [libs/domain/pipeline/src/rollup.rs]
//!
//! The directional roll-up. Every master `Link` row is folded into
//! exactly one `LinksIn` row and one `LinksOut` row per prefix level of
//! the aggregating side (destination for `LinksIn`, source for
//! `LinksOut`); the other side is held at whatever granularity the pair
//! still shares, so the four levels form a strict zoom hierarchy instead
//! of four unrelated groupings.

use crate::errors::PipelineError;
use flowmap_core_addr::Subnet;
use flowmap_domain_models::RolledLink;
use flowmap_infra_store::{DbError, TableNames};
use libsql::{params, Transaction};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RollupKey {
    src_start: u32,
    src_end: u32,
    dst_start: u32,
    dst_end: u32,
    port: u16,
    timestamp: i64,
}

#[derive(Debug, Default, Clone)]
struct RollupAgg {
    protocols: std::collections::BTreeSet<String>,
    links: i64,
    bytes: i64,
    packets: i64,
}

struct MasterLinkRow {
    src: u32,
    dst: u32,
    port: u16,
    protocol: String,
    timestamp: i64,
    links: i64,
    bytes_sent: i64,
    bytes_received: i64,
    packets_sent: i64,
    packets_received: i64,
}

/// `[t_min, t_max]` inclusive over the batch's staged links. `(1, 1)` is
/// the empty-batch sentinel the original tool used, preserved so an
/// empty batch's roll-up delete/insert window is a harmless no-op.
#[instrument(skip(tx))]
pub async fn staging_timerange(tx: &Transaction, staging_table: &str) -> Result<(i64, i64), PipelineError> {
    let sql = format!("SELECT MIN(timestamp) AS tstart, MAX(timestamp) AS tend FROM {staging_table}");
    let mut rows = tx.query(&sql, ()).await.map_err(DbError::QueryError)?;
    if let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
        let start: Option<i64> = row.get(0).map_err(DbError::QueryError)?;
        let end: Option<i64> = row.get(1).map_err(DbError::QueryError)?;
        if let (Some(start), Some(end)) = (start, end) {
            return Ok((start, end));
        }
    }
    Ok((1, 1))
}

#[instrument(skip(tx, tables))]
pub async fn rebuild_rollups(
    tx: &Transaction,
    tables: &TableNames,
    window: (i64, i64),
) -> Result<(usize, usize), PipelineError> {
    let (t_min, t_max) = window;

    for rollup_table in [&tables.links_in, &tables.links_out] {
        let sql = format!("DELETE FROM {rollup_table} WHERE timestamp BETWEEN ?1 AND ?2");
        tx.execute(&sql, params![t_min, t_max]).await.map_err(DbError::QueryError)?;
    }

    let rows = fetch_master_links(tx, &tables.links, t_min, t_max).await?;

    let links_in = fold_rollup(&rows, Direction::In);
    let links_out = fold_rollup(&rows, Direction::Out);

    insert_rollup(tx, &tables.links_in, &links_in).await?;
    insert_rollup(tx, &tables.links_out, &links_out).await?;

    debug!(links_in = links_in.len(), links_out = links_out.len(), "roll-up rebuilt");
    Ok((links_in.len(), links_out.len()))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

fn divergence_rank(a: u32, b: u32) -> usize {
    for (i, level) in Subnet::ASCENDING.iter().enumerate() {
        let shift = 32 - level.mask_len();
        if (a >> shift) != (b >> shift) {
            return i;
        }
    }
    Subnet::ASCENDING.len()
}

fn fold_rollup(rows: &[MasterLinkRow], direction: Direction) -> Vec<RolledLink> {
    let mut groups: BTreeMap<RollupKey, RollupAgg> = BTreeMap::new();

    for row in rows {
        let divergence = divergence_rank(row.src, row.dst);

        for (driving_idx, driving_level) in Subnet::ASCENDING.iter().enumerate() {
            let pinned_idx = driving_idx.min(divergence);
            let pinned_level = Subnet::ASCENDING[pinned_idx];

            let (src_level, dst_level) = match direction {
                Direction::In => (pinned_level, *driving_level),
                Direction::Out => (*driving_level, pinned_level),
            };

            let src_range = src_level.range_of(row.src);
            let dst_range = dst_level.range_of(row.dst);

            let key = RollupKey {
                src_start: src_range.ipstart,
                src_end: src_range.ipend,
                dst_start: dst_range.ipstart,
                dst_end: dst_range.ipend,
                port: row.port,
                timestamp: row.timestamp,
            };

            let agg = groups.entry(key).or_default();
            agg.protocols.insert(row.protocol.clone());
            agg.links += row.links;
            agg.bytes += row.bytes_sent + row.bytes_received;
            agg.packets += row.packets_sent + row.packets_received;
        }
    }

    groups
        .into_iter()
        .map(|(key, agg)| RolledLink {
            src_start: key.src_start,
            src_end: key.src_end,
            dst_start: key.dst_start,
            dst_end: key.dst_end,
            protocols: agg.protocols.into_iter().collect::<Vec<_>>().join(","),
            port: key.port,
            timestamp: key.timestamp,
            links: agg.links,
            bytes: agg.bytes,
            packets: agg.packets,
        })
        .collect()
}

async fn fetch_master_links(
    tx: &Transaction,
    links_table: &str,
    t_min: i64,
    t_max: i64,
) -> Result<Vec<MasterLinkRow>, PipelineError> {
    let sql = format!(
        "SELECT src, dst, port, protocol, timestamp, links, bytes_sent, bytes_received,
            packets_sent, packets_received
         FROM {links_table} WHERE timestamp BETWEEN ?1 AND ?2"
    );
    let mut rows = tx.query(&sql, params![t_min, t_max]).await.map_err(DbError::QueryError)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
        out.push(MasterLinkRow {
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
        });
    }
    Ok(out)
}

async fn insert_rollup(
    tx: &Transaction,
    rollup_table: &str,
    rows: &[RolledLink],
) -> Result<(), PipelineError> {
    let sql = format!(
        "INSERT INTO {rollup_table}
            (src_start, src_end, dst_start, dst_end, protocols, port, timestamp, links, bytes, packets)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    );
    for row in rows {
        tx.execute(
            &sql,
            params![
                row.src_start,
                row.src_end,
                row.dst_start,
                row.dst_end,
                row.protocols.clone(),
                row.port,
                row.timestamp,
                row.links,
                row.bytes,
                row.packets
            ],
        )
        .await
        .map_err(DbError::QueryError)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(src: u32, dst: u32, port: u16, links: i64, bytes_sent: i64, bytes_received: i64) -> MasterLinkRow {
        MasterLinkRow {
            src,
            dst,
            port,
            protocol: "TCP".to_string(),
            timestamp: 1_700_000_100,
            links,
            bytes_sent,
            bytes_received,
            packets_sent: 1,
            packets_received: 1,
        }
    }

    #[test]
    fn differing_at_8_pins_src_to_8_for_every_dst_level() {
        let src = 1u32 << 24; // 1.0.0.0
        let dst = 5u32 << 24; // 5.0.0.0
        let rows = vec![row(src, dst, 443, 1, 100, 200)];
        let links_in = fold_rollup(&rows, Direction::In);
        assert_eq!(links_in.len(), 4);
        for link in &links_in {
            assert_eq!(link.src_start, Subnet::Eight.range_of(src).ipstart);
        }
    }

    #[test]
    fn sharing_up_to_24_pins_nothing_until_the_final_level() {
        let src = (10u32 << 24) | 1; // 10.0.0.1
        let dst = (10u32 << 24) | 2; // 10.0.0.2
        let rows = vec![row(src, dst, 443, 1, 100, 200)];
        let links_in = fold_rollup(&rows, Direction::In);
        assert_eq!(links_in.len(), 4);
        let by_dst_level: Vec<_> = links_in
            .iter()
            .map(|l| (l.dst_end - l.dst_start, l.src_end - l.src_start))
            .collect();
        // Every level's src span matches the dst span at that same level —
        // the pair only diverges at the last bit.
        for (dst_span, src_span) in by_dst_level {
            assert_eq!(dst_span, src_span);
        }
    }

    #[test]
    fn p5_rollup_totals_match_master_link_bytes_at_a_fixed_level_pair() {
        // Two flows sharing the same /8 pair on both ends land in the
        // same (src /8, dst /8) LinksIn group; their bytes must sum.
        let rows = vec![
            row((10 << 24) | 1, (20 << 24) | 5, 443, 3, 100, 200),
            row((10 << 24) | 2, (20 << 24) | 9, 443, 2, 50, 75),
        ];
        let expected_total: i64 = rows.iter().map(|r| r.bytes_sent + r.bytes_received).sum();

        let links_in = fold_rollup(&rows, Direction::In);
        let root_pair_total: i64 = links_in
            .iter()
            .filter(|l| {
                l.src_start == Subnet::Eight.range_of(10 << 24).ipstart
                    && l.dst_start == Subnet::Eight.range_of(20 << 24).ipstart
                    && l.src_end - l.src_start == Subnet::Eight.range_of(0).ipend
                    && l.dst_end - l.dst_start == Subnet::Eight.range_of(0).ipend
            })
            .map(|l| l.bytes)
            .sum();
        assert_eq!(root_pair_total, expected_total);
    }
}
