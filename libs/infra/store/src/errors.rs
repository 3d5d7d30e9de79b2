// [libs/infra/store/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to open or reach the underlying database.
    #[error("connection failed: {0}")]
    ConnectionError(String),

    /// An environment or CLI-supplied connection setting was missing or
    /// malformed.
    #[error("invalid store configuration: {0}")]
    ConfigurationError(String),

    /// The database rejected a statement.
    #[error("query failed: {0}")]
    QueryError(#[from] libsql::Error),

    /// A row could not be mapped into its domain type.
    #[error("row mapping failed: {0}")]
    MappingError(String),

    /// An identifier (subscription, datasource) failed the allowlist check
    /// used before it is interpolated into a table name.
    #[error("rejected identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A transaction could not be committed or rolled back cleanly.
    #[error("transaction failed: {0}")]
    TransactionError(String),
}
