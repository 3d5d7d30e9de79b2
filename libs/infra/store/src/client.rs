// [libs/infra/store/src/client.rs]
use crate::errors::DbError;
use crate::schema::apply_schema;
use crate::tables::TableNames;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

/// A handle to the underlying libSQL database for one (subscription,
/// datasource) pair. Cheap to clone; every caller gets its own
/// [`Connection`] from [`StoreClient::connection`].
#[derive(Clone)]
pub struct StoreClient {
    database: Arc<Database>,
    tables: TableNames,
    /// Keeps an in-memory database alive for the process lifetime. SQLite
    /// drops an in-memory database's contents once its last connection
    /// closes, so a throwaway connection per call would silently wipe the
    /// schema between requests.
    _memory_anchor: Option<Arc<Connection>>,
}

impl StoreClient {
    #[instrument(skip(auth_token))]
    pub async fn connect(
        url: &str,
        auth_token: Option<String>,
        tables: TableNames,
    ) -> Result<Self, DbError> {
        if url.is_empty() {
            return Err(DbError::ConfigurationError("database url is empty".into()));
        }

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:") || url.contains("mode=memory");

        info!(url, is_remote, "opening store connection");

        let database = if is_remote {
            let token = auth_token.ok_or_else(|| {
                DbError::ConfigurationError("remote url requires an auth token".into())
            })?;
            Builder::new_remote(url.to_string(), token).build().await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let database = Arc::new(database);

        let memory_anchor = if is_memory {
            let anchor = database.connect().map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&anchor, &tables).await?;
            Some(Arc::new(anchor))
        } else {
            let bootstrap = database.connect().map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&bootstrap, &tables).await?;
            None
        };

        Ok(Self { database, tables, _memory_anchor: memory_anchor })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.database.connect().map_err(|e| DbError::ConnectionError(e.to_string()))
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }
}
