//! [libs/infra/store/src/lib.rs]
//!
//! The relational store adapter: connection management, schema bootstrap,
//! per-(subscription, datasource) table naming, and the `Dialect`
//! abstraction the pipeline's query builders target instead of branching
//! on backend name at call sites.

mod client;
mod dialect;
mod errors;
mod schema;
mod tables;

pub use client::StoreClient;
pub use dialect::{Dialect, MySqlDialect, SqliteDialect};
pub use errors::DbError;
pub use tables::{validate_identifier, TableNames};
