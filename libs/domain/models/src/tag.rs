use serde::{Deserialize, Serialize};

/// One row of the `Tags` table: a single operator-assigned label on a
/// range. A range may carry any number of tags; the table has no count
/// limit and is never written by the core pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub ipstart: u32,
    pub ipend: u32,
    pub tag: String,
}
