// [libs/infra/store/src/tables.rs]
use crate::errors::DbError;

/// Table names are templated as `s{sub}_{ds}{Entity}` / `s{sub}_ds{ds}_{Entity}`
/// and the subscription and datasource pieces come from request input, so
/// they are validated against a strict allowlist before ever touching a
/// format string. Only digits are accepted — this is what the upstream
/// system generates, and it is all the pipeline needs.
pub fn validate_identifier(id: &str) -> Result<(), DbError> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(id.to_string()))
    }
}

/// The six per-(subscription, datasource) table names a pipeline run reads
/// and writes. `nodes` and `tags` are scoped to the subscription alone —
/// the node hierarchy is shared across every datasource in an account.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub nodes: String,
    pub tags: String,
    pub syslog: String,
    pub staging_links: String,
    pub links: String,
    pub links_in: String,
    pub links_out: String,
}

impl TableNames {
    pub fn new(sub: &str, ds: &str) -> Result<Self, DbError> {
        validate_identifier(sub)?;
        validate_identifier(ds)?;
        Ok(Self {
            nodes: format!("s{sub}_Nodes"),
            tags: format!("s{sub}_Tags"),
            syslog: format!("s{sub}_ds{ds}_Syslog"),
            staging_links: format!("s{sub}_ds{ds}_StagingLinks"),
            links: format!("s{sub}_ds{ds}_Links"),
            links_in: format!("s{sub}_ds{ds}_LinksIn"),
            links_out: format!("s{sub}_ds{ds}_LinksOut"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numeric_identifiers() {
        assert!(validate_identifier("1").is_ok());
        assert!(validate_identifier("9001").is_ok());
    }

    #[test]
    fn rejects_anything_not_pure_digits() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1; DROP TABLE Nodes;--").is_err());
        assert!(validate_identifier("1a").is_err());
        assert!(validate_identifier(" 1").is_err());
    }

    #[test]
    fn table_names_follow_the_canonical_template() {
        let t = TableNames::new("7", "3").unwrap();
        assert_eq!(t.nodes, "s7_Nodes");
        assert_eq!(t.syslog, "s7_ds3_Syslog");
        assert_eq!(t.links_in, "s7_ds3_LinksIn");
    }

    #[test]
    fn table_names_rejects_hostile_input() {
        assert!(TableNames::new("1)); DROP TABLE s1_Nodes;--", "1").is_err());
    }
}
