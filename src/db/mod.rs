//! Database access layer.
//!
//! This module provides:
//! - The driver seam and its SQLite and ODBC backends
//! - The per-database connection registry
//! - Bounded, timed query execution
//! - Catalog introspection
//! - Gateway-side aggregation

pub mod aggregate;
pub mod driver;
pub mod executor;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod registry;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use aggregate::{Tally, tally};
pub use driver::{Driver, DriverConnection, DriverKind};
pub use executor::{DEFAULT_MAX_CONCURRENT_QUERIES, QueryExecutor};
pub use registry::{ConnectionRegistry, DEFAULT_CONNECT_TIMEOUT_SECS, ManagedConnection};
pub use schema::SchemaInspector;
pub use sqlite::SqliteDriver;

use crate::error::DbResult;
use std::sync::Arc;

/// Build the backend for `kind`.
pub fn driver_for(kind: DriverKind) -> DbResult<Arc<dyn Driver>> {
    match kind {
        DriverKind::Sqlite => Ok(Arc::new(SqliteDriver)),
        #[cfg(feature = "odbc")]
        DriverKind::Odbc => Ok(Arc::new(odbc::OdbcDriver)),
        #[cfg(not(feature = "odbc"))]
        DriverKind::Odbc => Err(crate::error::DbError::connection(
            "This build does not include the ODBC driver",
            "Rebuild with `--features odbc` or run with --driver sqlite",
        )),
    }
}
