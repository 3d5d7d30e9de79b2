// [libs/domain/metadata/src/editor.rs]
use crate::errors::MetadataError;
use flowmap_core_addr::{parse_range, Subnet};
use flowmap_domain_models::Node;
use flowmap_infra_store::StoreClient;
use libsql::params;
use std::collections::HashSet;
use tracing::instrument;

/// Tags directly assigned to an address, plus tags inherited from any
/// ancestor range that also carries one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagLookup {
    pub tags: Vec<String>,
    pub p_tags: Vec<String>,
}

/// An address's own environment (default `"inherit"` when unset) and the
/// nearest ancestor's environment (default `"production"` when no
/// ancestor has one set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLookup {
    pub env: String,
    pub p_env: String,
}

impl Default for EnvLookup {
    fn default() -> Self {
        Self { env: "inherit".to_string(), p_env: "production".to_string() }
    }
}

/// Reads and writes the operator-facing annotations on a range: a
/// hostname-style alias, an environment label, and an arbitrary set of
/// tags. None of this feeds back into preprocessing.
pub struct MetadataEditor {
    store: StoreClient,
}

impl MetadataEditor {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn set_alias(&self, address: &str, alias: &str) -> Result<(), MetadataError> {
        let range = parse_range(address)?;
        let conn = self.store.connection()?;
        let sql = format!(
            "UPDATE {} SET alias = ?1 WHERE ipstart = ?2 AND ipend = ?3",
            self.store.tables().nodes
        );
        conn.execute(&sql, params![alias, range.ipstart, range.ipend]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_env(&self, address: &str, env: &str) -> Result<(), MetadataError> {
        let range = parse_range(address)?;
        let conn = self.store.connection()?;
        let sql = format!(
            "UPDATE {} SET env = ?1 WHERE ipstart = ?2 AND ipend = ?3",
            self.store.tables().nodes
        );
        conn.execute(&sql, params![env, range.ipstart, range.ipend]).await?;
        Ok(())
    }

    /// Overwrites the full tag set on `address`: anything in `new_tags` not
    /// already present is inserted, anything already present but absent
    /// from `new_tags` is deleted. Tags untouched by the call are left
    /// alone.
    #[instrument(skip(self, new_tags))]
    pub async fn set_tags(&self, address: &str, new_tags: &[String]) -> Result<(), MetadataError> {
        let range = parse_range(address)?;
        let conn = self.store.connection()?;
        let tags_table = &self.store.tables().tags;

        let select_sql =
            format!("SELECT tag FROM {tags_table} WHERE ipstart = ?1 AND ipend = ?2");
        let mut rows = conn.query(&select_sql, params![range.ipstart, range.ipend]).await?;
        let mut existing: HashSet<String> = HashSet::new();
        while let Some(row) = rows.next().await? {
            existing.insert(row.get::<String>(0)?);
        }

        let requested: HashSet<String> = new_tags.iter().cloned().collect();

        let insert_sql = format!("INSERT INTO {tags_table} (ipstart, ipend, tag) VALUES (?1, ?2, ?3)");
        for tag in requested.difference(&existing) {
            conn.execute(&insert_sql, params![range.ipstart, range.ipend, tag.clone()]).await?;
        }

        let delete_sql =
            format!("DELETE FROM {tags_table} WHERE ipstart = ?1 AND ipend = ?2 AND tag = ?3");
        for tag in existing.difference(&requested) {
            conn.execute(&delete_sql, params![range.ipstart, range.ipend, tag.clone()]).await?;
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_tags(&self, address: &str) -> Result<TagLookup, MetadataError> {
        let range = parse_range(address)?;
        let conn = self.store.connection()?;
        let tags_table = &self.store.tables().tags;

        let sql = format!(
            "SELECT ipstart, ipend, tag FROM {tags_table} WHERE ipstart <= ?1 AND ipend >= ?2"
        );
        let mut rows = conn.query(&sql, params![range.ipstart, range.ipend]).await?;

        let mut lookup = TagLookup::default();
        while let Some(row) = rows.next().await? {
            let row_start: u32 = row.get(0)?;
            let row_end: u32 = row.get(1)?;
            let tag: String = row.get(2)?;
            if row_start == range.ipstart && row_end == range.ipend {
                lookup.tags.push(tag);
            } else {
                lookup.p_tags.push(tag);
            }
        }
        Ok(lookup)
    }

    #[instrument(skip(self))]
    pub async fn get_tag_list(&self) -> Result<Vec<String>, MetadataError> {
        let conn = self.store.connection()?;
        let tags_table = &self.store.tables().tags;
        let sql = format!("SELECT DISTINCT tag FROM {tags_table}");
        let mut rows = conn.query(&sql, ()).await?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next().await? {
            tags.push(row.get::<String>(0)?);
        }
        Ok(tags)
    }

    #[instrument(skip(self))]
    pub async fn get_env(&self, address: &str) -> Result<EnvLookup, MetadataError> {
        let range = parse_range(address)?;
        let conn = self.store.connection()?;
        let nodes_table = &self.store.tables().nodes;

        let sql = format!(
            "SELECT ipstart, ipend, env FROM {nodes_table} WHERE ipstart <= ?1 AND ipend >= ?2"
        );
        let mut rows = conn.query(&sql, params![range.ipstart, range.ipend]).await?;

        let mut lookup = EnvLookup::default();
        let mut nearest_distance: Option<u64> = None;
        while let Some(row) = rows.next().await? {
            let row_start: u32 = row.get(0)?;
            let row_end: u32 = row.get(1)?;
            let env: Option<String> = row.get(2)?;

            if row_start == range.ipstart && row_end == range.ipend {
                if let Some(env) = env {
                    lookup.env = env;
                }
            } else {
                let distance = u64::from(row_end) - u64::from(range.ipend)
                    + u64::from(range.ipstart)
                    - u64::from(row_start);
                let is_nearest = match nearest_distance {
                    None => true,
                    Some(d) => distance < d,
                };
                if is_nearest {
                    if let Some(env) = &env {
                        if env != "inherit" {
                            nearest_distance = Some(distance);
                            lookup.p_env = env.clone();
                        }
                    }
                }
            }
        }
        Ok(lookup)
    }

    #[instrument(skip(self))]
    pub async fn get_root_nodes(&self) -> Result<Vec<Node>, MetadataError> {
        let conn = self.store.connection()?;
        let nodes_table = &self.store.tables().nodes;
        let sql = format!(
            "SELECT ipstart, ipend, subnet, x, y, radius, alias, env FROM {nodes_table} WHERE subnet = 8"
        );
        let mut rows = conn.query(&sql, ()).await?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(row_to_node(&row)?);
        }
        Ok(nodes)
    }

    #[instrument(skip(self))]
    pub async fn get_children(&self, address: &str) -> Result<Vec<Node>, MetadataError> {
        let range = parse_range(address)?;
        let subnet = match children_level(range.span()) {
            Some(level) => level,
            // A /32 singleton has no finer level beneath it.
            None => return Ok(Vec::new()),
        };

        let conn = self.store.connection()?;
        let nodes_table = &self.store.tables().nodes;
        let sql = format!(
            "SELECT ipstart, ipend, subnet, x, y, radius, alias, env FROM {nodes_table} \
             WHERE subnet = ?1 AND ipstart BETWEEN ?2 AND ?3"
        );
        let mut rows = conn
            .query(&sql, params![subnet.as_db_value() as i64, range.ipstart, range.ipend])
            .await?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(row_to_node(&row)?);
        }
        Ok(nodes)
    }
}

/// The subnet level one step finer than a range spanning `diff` addresses,
/// or `None` if `diff` is already a /32 singleton with nothing finer
/// beneath it. Deliberately not `Range::classify()`: that method names the
/// level a range *itself* belongs to, while a child query needs the next
/// level down from self — `nodes.py`'s `get_children` uses its own
/// distinct threshold set (`16777215`, `65536`, `255`, `0`) for exactly
/// this reason.
fn children_level(diff: u64) -> Option<Subnet> {
    if diff > 16_777_215 {
        Some(Subnet::Eight)
    } else if diff > 65_536 {
        Some(Subnet::Sixteen)
    } else if diff > 255 {
        Some(Subnet::TwentyFour)
    } else if diff > 0 {
        Some(Subnet::ThirtyTwo)
    } else {
        None
    }
}

fn row_to_node(row: &libsql::Row) -> Result<Node, MetadataError> {
    Ok(Node {
        ipstart: row.get(0)?,
        ipend: row.get(1)?,
        subnet: row.get::<i64>(2)? as u8,
        x: row.get(3)?,
        y: row.get(4)?,
        radius: row.get(5)?,
        alias: row.get(6)?,
        env: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_slash_24_s_children_are_hosts() {
        assert_eq!(children_level(255), Some(Subnet::ThirtyTwo));
    }

    #[test]
    fn a_slash_16_s_children_are_slash_24s() {
        assert_eq!(children_level(65_535), Some(Subnet::TwentyFour));
    }

    #[test]
    fn a_slash_8_s_children_are_slash_16s() {
        assert_eq!(children_level(16_777_215), Some(Subnet::Sixteen));
    }

    #[test]
    fn a_host_has_no_children() {
        assert_eq!(children_level(0), None);
    }
}
