use serde::{Deserialize, Serialize};

/// One row of the `StagingLinks` table: a flow aggregated to a single
/// 300-second bucket, not yet merged into the master `Links` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingLink {
    pub src: u32,
    pub dst: u32,
    pub port: u16,
    pub protocol: String,
    pub timestamp: i64,
    pub links: i64,
    pub bytes_sent: i64,
    pub bytes_received: i64,
    pub packets_sent: i64,
    pub packets_received: i64,
    pub duration: f64,
}

/// One row of the master `Links` table: a `StagingLink` merged into (and
/// additively combined with) whatever already existed at the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub src: u32,
    pub dst: u32,
    pub port: u16,
    pub protocol: String,
    pub timestamp: i64,
    pub links: i64,
    pub bytes_sent: i64,
    pub bytes_received: i64,
    pub packets_sent: i64,
    pub packets_received: i64,
    pub duration: f64,
}

/// One row of `LinksIn` or `LinksOut`: a `Link` rolled up to a (src range,
/// dst range) pair at one of the four subnet levels. The two tables share
/// this shape; they differ only in which of (src, dst) drives the roll-up
/// partitioning (see the pipeline's directional roll-up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolledLink {
    pub src_start: u32,
    pub src_end: u32,
    pub dst_start: u32,
    pub dst_end: u32,
    /// Sorted, comma-joined, distinct protocol names.
    pub protocols: String,
    pub port: u16,
    pub timestamp: i64,
    pub links: i64,
    pub bytes: i64,
    pub packets: i64,
}

pub type LinksIn = RolledLink;
pub type LinksOut = RolledLink;
