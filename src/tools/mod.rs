//! MCP tool implementations.
//!
//! This module contains the operation catalog and its handlers:
//! - `query`: Execute caller-supplied SQL
//! - `list_tables` / `describe_table` / `list_all_databases`: Catalog lookups
//! - `insert_record` / `update_record`: Single-statement writes
//! - `search_patients` / `get_appointments` / `get_transactions`: Practice lookups

pub mod catalog;
pub mod context;
pub mod domain;
pub mod envelope;
pub mod query;
pub mod router;
pub mod schema;
pub mod write;

pub use catalog::Operation;
pub use context::ToolContext;
pub use domain::{
    DomainToolHandler, GetAppointmentsInput, GetTransactionsInput, SearchPatientsInput,
};
pub use envelope::ResponseEnvelope;
pub use query::{QueryInput, QueryToolHandler};
pub use router::OperationRouter;
pub use schema::{
    DescribeTableInput, ListAllDatabasesInput, ListTablesInput, SchemaToolHandler,
};
pub use write::{InsertRecordInput, UpdateRecordInput, WriteToolHandler};
