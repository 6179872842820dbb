//! ODBC backend for FileMaker hosts.
//!
//! ODBC handles are blocking and must not be used from two threads at once,
//! so each connection owns a dedicated worker thread. Calls are sent to the
//! worker over a channel and answered through a oneshot reply, keeping the
//! async side free while the driver blocks.

use crate::db::driver::{Driver, DriverConnection, DriverKind};
use crate::db::types::numeric_text_value;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, ConnectionConfig, QueryParam, RawRows};
use async_trait::async_trait;
use odbc_api::{
    Connection, ConnectionOptions, Cursor, DataType, Environment, IntoParameter,
    ResultSetMetadata,
};
use serde_json::Value as JsonValue;
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct OdbcDriver;

#[async_trait]
impl Driver for OdbcDriver {
    async fn connect(
        &self,
        config: &ConnectionConfig,
        database: &str,
    ) -> DbResult<Box<dyn DriverConnection>> {
        let connection_string = config.odbc_connection_string(database);
        let label = config.resolve_database(database).unwrap_or("default").to_string();

        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel::<DbResult<()>>();

        thread::Builder::new()
            .name(format!("odbc-{}", label))
            .spawn(move || worker(connection_string, ready_tx, jobs_rx))
            .map_err(|e| DbError::internal(format!("Failed to start ODBC worker: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                debug!(database = %label, "ODBC worker ready");
                Ok(Box::new(OdbcHandle {
                    jobs: Mutex::new(Some(jobs_tx)),
                }))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DbError::internal("ODBC worker exited during connect")),
        }
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Odbc
    }
}

enum Job {
    Fetch {
        sql: String,
        params: Vec<QueryParam>,
        max_rows: usize,
        reply: oneshot::Sender<DbResult<RawRows>>,
    },
    Execute {
        sql: String,
        params: Vec<QueryParam>,
        reply: oneshot::Sender<DbResult<u64>>,
    },
    Tables {
        reply: oneshot::Sender<DbResult<Vec<String>>>,
    },
    Columns {
        table: String,
        reply: oneshot::Sender<DbResult<Vec<ColumnInfo>>>,
    },
}

/// Worker thread body: connect, report readiness, then serve jobs until
/// every sender is dropped.
fn worker(
    connection_string: String,
    ready: oneshot::Sender<DbResult<()>>,
    jobs: mpsc::Receiver<Job>,
) {
    let env = match Environment::new() {
        Ok(env) => env,
        Err(e) => {
            let _ = ready.send(Err(connection_error(&e)));
            return;
        }
    };

    let conn = match env.connect_with_connection_string(
        &connection_string,
        ConnectionOptions::default(),
    ) {
        Ok(conn) => conn,
        Err(e) => {
            let _ = ready.send(Err(connection_error(&e)));
            return;
        }
    };

    // The caller gave up (connect timeout): drop the fresh connection
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(job) = jobs.recv() {
        // A caller that timed out has dropped its receiver; ignore the send error
        match job {
            Job::Fetch {
                sql,
                params,
                max_rows,
                reply,
            } => {
                let _ = reply.send(fetch(&conn, &sql, &params, max_rows));
            }
            Job::Execute { sql, params, reply } => {
                let _ = reply.send(execute(&conn, &sql, &params));
            }
            Job::Tables { reply } => {
                let _ = reply.send(tables(&conn));
            }
            Job::Columns { table, reply } => {
                let _ = reply.send(columns(&conn, &table));
            }
        }
    }
}

fn sql_state(err: &odbc_api::Error) -> Option<String> {
    match err {
        odbc_api::Error::Diagnostics { record, .. } => Some(record.state.as_str().to_string()),
        _ => None,
    }
}

fn connection_error(err: &odbc_api::Error) -> DbError {
    DbError::connection(
        err.to_string(),
        "Check that the DSN exists, the FileMaker host is running and the credentials are valid",
    )
}

fn query_error(err: odbc_api::Error) -> DbError {
    DbError::query(
        err.to_string(),
        sql_state(&err),
        "Check the SQL syntax and that the table and field names exist in this database",
    )
}

fn is_numeric(data_type: DataType) -> bool {
    match data_type {
        DataType::TinyInt
        | DataType::SmallInt
        | DataType::Integer
        | DataType::BigInt
        | DataType::Real
        | DataType::Double
        | DataType::Float { .. }
        | DataType::Numeric { .. }
        | DataType::Decimal { .. } => true,
        _ => false,
    }
}

fn fetch(
    conn: &Connection<'_>,
    sql: &str,
    params: &[QueryParam],
    max_rows: usize,
) -> DbResult<RawRows> {
    // Every parameter is bound as character data; the driver converts
    let texts: Vec<Option<String>> = params.iter().map(QueryParam::to_text).collect();
    let bound: Vec<_> = texts.iter().map(|t| t.as_deref().into_parameter()).collect();

    let Some(mut cursor) = conn
        .execute(sql, bound.as_slice(), None)
        .map_err(query_error)?
    else {
        return Ok(RawRows::default());
    };

    let columns: Vec<String> = cursor
        .column_names()
        .map_err(query_error)?
        .collect::<Result<_, _>>()
        .map_err(query_error)?;

    let mut numeric = Vec::with_capacity(columns.len());
    for idx in 1..=columns.len() {
        let data_type = cursor.col_data_type(idx as u16).map_err(query_error)?;
        numeric.push(is_numeric(data_type));
    }

    let mut rows = Vec::new();
    let mut buf = Vec::new();
    while rows.len() < max_rows {
        let Some(mut row) = cursor.next_row().map_err(query_error)? else {
            break;
        };

        let mut values = Vec::with_capacity(columns.len());
        for (idx, numeric) in numeric.iter().enumerate() {
            buf.clear();
            let present = row.get_text((idx + 1) as u16, &mut buf).map_err(query_error)?;
            let value = if !present {
                JsonValue::Null
            } else {
                let text = String::from_utf8_lossy(&buf);
                if *numeric {
                    numeric_text_value(&text)
                } else {
                    JsonValue::String(text.into_owned())
                }
            };
            values.push(value);
        }
        rows.push(values);
    }

    Ok(RawRows { columns, rows })
}

fn execute(conn: &Connection<'_>, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
    let texts: Vec<Option<String>> = params.iter().map(QueryParam::to_text).collect();
    let bound: Vec<_> = texts.iter().map(|t| t.as_deref().into_parameter()).collect();

    let mut statement = conn.preallocate().map_err(query_error)?;
    statement
        .execute(sql, bound.as_slice())
        .map_err(query_error)?;
    let affected = statement.row_count().map_err(query_error)?.unwrap_or(0);
    conn.commit().map_err(query_error)?;

    Ok(affected as u64)
}

fn text_at(row: &mut odbc_api::CursorRow<'_>, col: u16, buf: &mut Vec<u8>) -> DbResult<Option<String>> {
    buf.clear();
    let present = row.get_text(col, buf).map_err(query_error)?;
    Ok(present.then(|| String::from_utf8_lossy(buf).into_owned()))
}

fn tables(conn: &Connection<'_>) -> DbResult<Vec<String>> {
    let mut cursor = conn.tables("", "", "", "").map_err(query_error)?;
    let mut names = Vec::new();
    let mut buf = Vec::new();

    // Catalog columns: 3 TABLE_NAME, 4 TABLE_TYPE
    while let Some(mut row) = cursor.next_row().map_err(query_error)? {
        let name = text_at(&mut row, 3, &mut buf)?;
        let kind = text_at(&mut row, 4, &mut buf)?;
        if let (Some(name), Some("TABLE")) = (name, kind.as_deref()) {
            names.push(name);
        }
    }

    Ok(names)
}

fn columns(conn: &Connection<'_>, table: &str) -> DbResult<Vec<ColumnInfo>> {
    let mut cursor = conn.columns("", "", table, "").map_err(query_error)?;
    let mut columns = Vec::new();
    let mut buf = Vec::new();

    // Catalog columns: 4 COLUMN_NAME, 6 TYPE_NAME, 7 COLUMN_SIZE, 11 NULLABLE
    while let Some(mut row) = cursor.next_row().map_err(query_error)? {
        let name = text_at(&mut row, 4, &mut buf)?.unwrap_or_default();
        let type_name = text_at(&mut row, 6, &mut buf)?.unwrap_or_default();
        let size = text_at(&mut row, 7, &mut buf)?.and_then(|s| s.trim().parse().ok());
        let nullable = text_at(&mut row, 11, &mut buf)?.is_some_and(|s| s.trim() != "0");
        columns.push(ColumnInfo::new(name, type_name, size, nullable));
    }

    Ok(columns)
}

/// Async side of one ODBC connection.
struct OdbcHandle {
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
}

impl OdbcHandle {
    fn sender(&self) -> DbResult<mpsc::Sender<Job>> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                DbError::connection("Connection is closed", "Retry to reconnect to the database")
            })
    }

    async fn call<T: Send>(
        &self,
        job: impl FnOnce(oneshot::Sender<DbResult<T>>) -> Job + Send,
    ) -> DbResult<T> {
        let (reply, answer) = oneshot::channel();
        self.sender()?.send(job(reply)).map_err(|_| worker_gone())?;
        answer.await.map_err(|_| worker_gone())?
    }
}

fn worker_gone() -> DbError {
    DbError::connection(
        "ODBC worker stopped",
        "Retry to reconnect to the database",
    )
}

#[async_trait]
impl DriverConnection for OdbcHandle {
    async fn fetch(&self, sql: &str, params: &[QueryParam], max_rows: usize) -> DbResult<RawRows> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.call(move |reply| Job::Fetch {
            sql,
            params,
            max_rows,
            reply,
        })
        .await
    }

    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.call(move |reply| Job::Execute { sql, params, reply })
            .await
    }

    async fn tables(&self) -> DbResult<Vec<String>> {
        self.call(|reply| Job::Tables { reply }).await
    }

    async fn columns(&self, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let table = table.to_string();
        self.call(move |reply| Job::Columns { table, reply }).await
    }

    async fn close(&self) {
        // Dropping the last sender ends the worker loop, which disconnects
        let sender = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!("ODBC worker released");
        }
    }
}
