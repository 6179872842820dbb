//! Schema introspection.
//!
//! Catalog lookups go through the driver's own catalog calls, never through
//! `SELECT` statements against system tables, because FileMaker's ODBC
//! driver does not expose any.

use crate::db::executor::QueryExecutor;
use crate::db::registry::{ConnectionRegistry, ManagedConnection};
use crate::error::DbResult;
use crate::models::{ColumnInfo, DatabaseSchema, TableSchema};
use tracing::debug;

/// Schema inspector for catalog metadata.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List the base tables of a database.
    pub async fn list_tables(
        executor: &QueryExecutor,
        conn: &ManagedConnection,
    ) -> DbResult<Vec<String>> {
        debug!(database = %conn.database(), "Listing tables");
        executor
            .guarded("table listing", conn.handle().tables())
            .await
    }

    /// Describe the columns of one table.
    pub async fn list_columns(
        executor: &QueryExecutor,
        conn: &ManagedConnection,
        table: &str,
    ) -> DbResult<Vec<ColumnInfo>> {
        debug!(database = %conn.database(), table = %table, "Describing table");
        executor
            .guarded("column listing", conn.handle().columns(table))
            .await
    }

    /// Every table of a database with its columns.
    pub async fn database_schema(
        executor: &QueryExecutor,
        conn: &ManagedConnection,
    ) -> DbResult<DatabaseSchema> {
        let names = Self::list_tables(executor, conn).await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = Self::list_columns(executor, conn, &name).await?;
            tables.push(TableSchema { name, columns });
        }

        Ok(DatabaseSchema {
            database: conn.database().to_string(),
            tables,
        })
    }

    /// Open one database, list its tables and close every handle again.
    ///
    /// Used by the startup connection check; the listing runs under the
    /// executor's timeout like any other catalog call.
    pub async fn check_database(
        registry: &ConnectionRegistry,
        executor: &QueryExecutor,
        database: &str,
    ) -> DbResult<Vec<String>> {
        let tables = match registry.get_connection(database).await {
            Ok(conn) => Self::list_tables(executor, &conn).await,
            Err(e) => Err(e),
        };
        registry.close_all().await;
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::driver::{Driver, DriverConnection, DriverKind};
    use crate::error::DbError;
    use crate::models::{ConnectionConfig, QueryParam, RawRows};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Catalog calls on a stalled host never return.
    struct StalledDriver;

    struct StalledConnection;

    #[async_trait]
    impl Driver for StalledDriver {
        async fn connect(
            &self,
            _config: &ConnectionConfig,
            _database: &str,
        ) -> DbResult<Box<dyn DriverConnection>> {
            Ok(Box::new(StalledConnection))
        }

        fn kind(&self) -> DriverKind {
            DriverKind::Odbc
        }
    }

    #[async_trait]
    impl DriverConnection for StalledConnection {
        async fn fetch(&self, _: &str, _: &[QueryParam], _: usize) -> DbResult<RawRows> {
            Ok(RawRows::default())
        }
        async fn execute(&self, _: &str, _: &[QueryParam]) -> DbResult<u64> {
            Ok(0)
        }
        async fn tables(&self) -> DbResult<Vec<String>> {
            std::future::pending().await
        }
        async fn columns(&self, _: &str) -> DbResult<Vec<ColumnInfo>> {
            std::future::pending().await
        }
        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_check_database_times_out_on_stalled_host() {
        let registry = ConnectionRegistry::new(Arc::new(StalledDriver), ConnectionConfig::default());
        let executor = QueryExecutor::with_settings(Duration::from_millis(50), 100, 1);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            SchemaInspector::check_database(&registry, &executor, "Patients"),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(DbError::Timeout { .. })));
        assert_eq!(registry.connection_count().await, 0);
    }
}
