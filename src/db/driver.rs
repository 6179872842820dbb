//! Driver abstraction.
//!
//! A `Driver` opens one handle per database name; a `DriverConnection` is that
//! handle. Implementations must serialise calls on a single handle themselves,
//! since the underlying ODBC handles are not safe for concurrent use.

use crate::error::DbResult;
use crate::models::{ColumnInfo, ConnectionConfig, QueryParam, RawRows};
use async_trait::async_trait;
use std::fmt;

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DriverKind {
    /// FileMaker through an ODBC data source
    Odbc,
    /// Local SQLite files, one per database name
    Sqlite,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Odbc => write!(f, "odbc"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a handle to `database` (empty means the configured default).
    async fn connect(
        &self,
        config: &ConnectionConfig,
        database: &str,
    ) -> DbResult<Box<dyn DriverConnection>>;

    fn kind(&self) -> DriverKind;
}

#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Execute `sql` verbatim and draw at most `max_rows` rows from its cursor.
    async fn fetch(&self, sql: &str, params: &[QueryParam], max_rows: usize) -> DbResult<RawRows>;

    /// Execute a statement and commit before returning the affected row count.
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<u64>;

    /// Names of the base tables, from the driver catalog.
    async fn tables(&self) -> DbResult<Vec<String>>;

    /// Column metadata for one table, from the driver catalog.
    async fn columns(&self, table: &str) -> DbResult<Vec<ColumnInfo>>;

    /// Release the handle. Calling it again is a no-op.
    async fn close(&self);
}
