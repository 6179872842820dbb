//! Data models for the FileMaker MCP server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DEFAULT_DATABASES, DEFAULT_DSN};
pub use query::{
    DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, DEFAULT_SEARCH_LIMIT, MAX_ROW_LIMIT, QueryParam,
    RawRows, ResultRow,
};
pub use schema::{ColumnInfo, DatabaseSchema, TableSchema};
