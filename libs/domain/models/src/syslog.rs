use serde::{Deserialize, Serialize};

/// One row of the `Syslog` upload table: a single raw flow record as
/// ingested from the datasource, before any aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syslog {
    pub src: u32,
    pub dst: u32,
    pub dstport: u16,
    pub protocol: String,
    /// Unix seconds, UTC.
    pub timestamp: i64,
    pub bytes_sent: i64,
    pub bytes_received: i64,
    pub packets_sent: i64,
    pub packets_received: i64,
    pub duration: f64,
}
