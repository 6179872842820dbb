//! Shared state handed to every operation handler.

use crate::db::{ConnectionRegistry, ManagedConnection, QueryExecutor, SchemaInspector};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, DatabaseSchema, QueryParam, ResultRow};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::warn;

/// Registry, executor and database catalog for one gateway.
#[derive(Clone)]
pub struct ToolContext {
    registry: Arc<ConnectionRegistry>,
    executor: QueryExecutor,
    databases: Arc<[String]>,
}

impl ToolContext {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        executor: QueryExecutor,
        databases: Vec<String>,
    ) -> Self {
        Self {
            registry,
            executor,
            databases: databases.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Known database names, in catalog order.
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    pub async fn read(
        &self,
        database: &str,
        sql: &str,
        params: &[QueryParam],
        limit: u64,
    ) -> DbResult<Vec<ResultRow>> {
        let conn = self.registry.get_connection(database).await?;
        let result = self.executor.execute_read(&conn, sql, params, limit).await;
        self.settle(&conn, result).await
    }

    pub async fn write(&self, database: &str, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let conn = self.registry.get_connection(database).await?;
        let result = self.executor.execute_write(&conn, sql, params).await;
        self.settle(&conn, result).await
    }

    pub async fn tables(&self, database: &str) -> DbResult<Vec<String>> {
        let conn = self.registry.get_connection(database).await?;
        let result = SchemaInspector::list_tables(&self.executor, &conn).await;
        self.settle(&conn, result).await
    }

    pub async fn columns(&self, database: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let conn = self.registry.get_connection(database).await?;
        let result = SchemaInspector::list_columns(&self.executor, &conn, table).await;
        self.settle(&conn, result).await
    }

    pub async fn schema(&self, database: &str) -> DbResult<DatabaseSchema> {
        let conn = self.registry.get_connection(database).await?;
        let result = SchemaInspector::database_schema(&self.executor, &conn).await;
        self.settle(&conn, result).await
    }

    /// Drop the handle that failed, if it is still registered, so the next
    /// request for this database reconnects. The failing call is not retried.
    async fn settle<T>(&self, conn: &Arc<ManagedConnection>, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            if e.is_connection_failure() || matches!(e, DbError::Timeout { .. }) {
                warn!(database = %conn.database(), error = %e, "Dropping connection after failure");
                self.registry.invalidate_if(conn).await;
            }
        }
        result
    }
}

/// Deserialize an optional string, treating `""` as absent.
pub(crate) fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
