//! SQLite backend.
//!
//! Maps each database name onto `<data_source>/<name>.db`, so a directory
//! of SQLite files can stand in for a FileMaker host. Used for local runs and
//! the integration tests.

use crate::db::driver::{Driver, DriverConnection, DriverKind};
use crate::db::types::{declared_size, sqlite_row_values};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, ConnectionConfig, QueryParam, RawRows};
use async_trait::async_trait;
use futures_util::StreamExt;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File extension used for database files.
pub const SQLITE_EXTENSION: &str = "db";

const LIST_TABLES: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl SqliteDriver {
    /// File backing `database` under the configured data source directory.
    pub fn database_path(config: &ConnectionConfig, database: &str) -> PathBuf {
        PathBuf::from(&config.data_source).join(format!("{}.{}", database, SQLITE_EXTENSION))
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn connect(
        &self,
        config: &ConnectionConfig,
        database: &str,
    ) -> DbResult<Box<dyn DriverConnection>> {
        let name = config.resolve_database(database).ok_or_else(|| {
            DbError::connection(
                "No database name given and no default database configured",
                "Pass a database name or set --database",
            )
        })?;

        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(DbError::connection(
                format!("Invalid database name: {}", name),
                "Database names must not contain path separators",
            ));
        }

        let path = Self::database_path(config, name);
        debug!(database = %name, path = %path.display(), "Opening SQLite database");

        let conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(false)
            .disable_statement_logging()
            .connect()
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Cannot open database '{}' at {}: {}", name, path.display(), e),
                    "Check that the database file exists in the data source directory",
                )
            })?;

        Ok(Box::new(SqliteHandle {
            conn: Mutex::new(Some(conn)),
        }))
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Sqlite
    }
}

/// One open SQLite connection; the mutex serialises statements on it.
struct SqliteHandle {
    conn: Mutex<Option<SqliteConnection>>,
}

fn closed() -> DbError {
    DbError::connection("Connection is closed", "Retry to reconnect to the database")
}

fn bind_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
    }
}

fn collect_rows(results: Vec<Result<SqliteRow, sqlx::Error>>) -> DbResult<RawRows> {
    let mut raw = RawRows::default();
    for result in results {
        let row = result?;
        if raw.columns.is_empty() {
            raw.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
        }
        raw.rows.push(sqlite_row_values(&row));
    }
    Ok(raw)
}

#[async_trait]
impl DriverConnection for SqliteHandle {
    async fn fetch(&self, sql: &str, params: &[QueryParam], max_rows: usize) -> DbResult<RawRows> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;

        // Only `max_rows` rows are pulled from the cursor
        let results = if params.is_empty() {
            (&mut *conn).fetch(sql).take(max_rows).collect::<Vec<_>>().await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.fetch(&mut *conn).take(max_rows).collect::<Vec<_>>().await
        };

        collect_rows(results)
    }

    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;

        let mut tx = conn.begin().await?;
        let result = if params.is_empty() {
            (&mut *tx).execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.execute(&mut *tx).await?
        };
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn tables(&self) -> DbResult<Vec<String>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;

        let rows = sqlx::query(LIST_TABLES).fetch_all(&mut *conn).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(DbError::from))
            .collect()
    }

    async fn columns(&self, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;

        let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
        let rows = sqlx::query(&pragma).fetch_all(&mut *conn).await?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name")?;
                let type_name: String = row.try_get("type")?;
                let not_null: i64 = row.try_get("notnull")?;
                let size = declared_size(&type_name);
                Ok(ColumnInfo::new(name, type_name, size, not_null == 0))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DbError::from)
    }

    async fn close(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "Error while closing SQLite connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn seeded() -> (TempDir, Box<dyn DriverConnection>) {
        let dir = TempDir::new().unwrap();
        let config = ConnectionConfig::new(dir.path().to_string_lossy());
        let path = SqliteDriver::database_path(&config, "Patients");

        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::raw_sql(
            "CREATE TABLE Patients (id INTEGER, \"Last Name\" VARCHAR(40) NOT NULL, balance REAL, photo BLOB);
             INSERT INTO Patients VALUES (1, 'Smith', 10.5, NULL);
             INSERT INTO Patients VALUES (2, 'Jones', NULL, x'FF00');
             INSERT INTO Patients VALUES (3, 'Brown', 0, NULL);",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();

        let handle = SqliteDriver.connect(&config, "Patients").await.unwrap();
        (dir, handle)
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let config = ConnectionConfig::new(dir.path().to_string_lossy());
        let err = SqliteDriver.connect(&config, "Nowhere").await.err().unwrap();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn test_path_like_names_rejected() {
        let dir = TempDir::new().unwrap();
        let config = ConnectionConfig::new(dir.path().to_string_lossy());
        assert!(SqliteDriver.connect(&config, "../etc").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_respects_max_rows() {
        let (_dir, handle) = seeded().await;
        let raw = handle
            .fetch("SELECT * FROM Patients ORDER BY id", &[], 2)
            .await
            .unwrap();
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.columns, vec!["id", "Last Name", "balance", "photo"]);
        assert_eq!(raw.rows[0][0], json!(1));
        assert_eq!(raw.rows[0][2], json!(10.5));
        assert_eq!(raw.rows[1][2], json!(null));
        assert_eq!(raw.rows[1][3], json!("/wA="));
    }

    #[tokio::test]
    async fn test_fetch_binds_params() {
        let (_dir, handle) = seeded().await;
        let raw = handle
            .fetch(
                "SELECT id FROM Patients WHERE \"Last Name\" LIKE ?",
                &[QueryParam::from("%mit%")],
                10,
            )
            .await
            .unwrap();
        assert_eq!(raw.rows, vec![vec![json!(1)]]);
    }

    #[tokio::test]
    async fn test_execute_commits() {
        let (_dir, handle) = seeded().await;
        let affected = handle
            .execute(
                "UPDATE Patients SET balance = ? WHERE id > ?",
                &[QueryParam::Float(1.0), QueryParam::Int(1)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[tokio::test]
    async fn test_catalog() {
        let (_dir, handle) = seeded().await;
        assert_eq!(handle.tables().await.unwrap(), vec!["Patients"]);

        let columns = handle.columns("Patients").await.unwrap();
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[1].name, "Last Name");
        assert_eq!(columns[1].size, Some(40));
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
    }

    #[tokio::test]
    async fn test_close_twice() {
        let (_dir, handle) = seeded().await;
        handle.close().await;
        handle.close().await;
        assert!(handle.tables().await.is_err());
    }
}
