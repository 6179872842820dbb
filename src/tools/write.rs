//! Record write tools.
//!
//! This module implements `insert_record` and `update_record`. Table names,
//! field names and the update's where-clause are spliced into the statement
//! as given, so callers quote names containing spaces themselves. Values are
//! always bound as parameters. Each statement commits on its own.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use crate::tools::context::ToolContext;
use crate::tools::envelope::ResponseEnvelope;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

/// Input for the insert_record tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertRecordInput {
    /// Database name
    pub database: String,
    /// Table name
    pub table: String,
    /// Key-value pairs of column names and values to insert
    pub data: serde_json::Map<String, JsonValue>,
}

/// Input for the update_record tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateRecordInput {
    /// Database name
    pub database: String,
    /// Table name
    pub table: String,
    /// Key-value pairs of column names and values to update
    pub data: serde_json::Map<String, JsonValue>,
    /// WHERE clause condition (without the WHERE keyword), used verbatim
    #[serde(rename = "where")]
    pub where_clause: String,
}

/// Output of both write tools.
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutput {
    pub rows_affected: u64,
    pub message: String,
}

/// Build `INSERT INTO t (a, b) VALUES (?, ?)` with values in key order.
pub fn build_insert(
    table: &str,
    data: &serde_json::Map<String, JsonValue>,
) -> DbResult<(String, Vec<QueryParam>)> {
    if data.is_empty() {
        return Err(DbError::validation("data must contain at least one field"));
    }

    let columns: Vec<&str> = data.keys().map(String::as_str).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    );
    let params = data.values().map(QueryParam::from).collect();
    Ok((sql, params))
}

/// Build `UPDATE t SET a = ?, b = ? WHERE <where_clause>`.
pub fn build_update(
    table: &str,
    data: &serde_json::Map<String, JsonValue>,
    where_clause: &str,
) -> DbResult<(String, Vec<QueryParam>)> {
    if data.is_empty() {
        return Err(DbError::validation("data must contain at least one field"));
    }

    let assignments: Vec<String> = data.keys().map(|k| format!("{} = ?", k)).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        where_clause
    );
    let params = data.values().map(QueryParam::from).collect();
    Ok((sql, params))
}

pub struct WriteToolHandler {
    ctx: ToolContext,
}

impl WriteToolHandler {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub async fn insert_record(&self, input: InsertRecordInput) -> DbResult<ResponseEnvelope> {
        let (sql, params) = build_insert(&input.table, &input.data)?;
        let affected = self.ctx.write(&input.database, &sql, &params).await?;

        info!(
            database = %input.database,
            table = %input.table,
            rows_affected = affected,
            "Inserted records"
        );
        Ok(ResponseEnvelope::success(WriteOutput {
            rows_affected: affected,
            message: format!("Inserted {} record(s)", affected),
        }))
    }

    pub async fn update_record(&self, input: UpdateRecordInput) -> DbResult<ResponseEnvelope> {
        let (sql, params) = build_update(&input.table, &input.data, &input.where_clause)?;
        let affected = self.ctx.write(&input.database, &sql, &params).await?;

        info!(
            database = %input.database,
            table = %input.table,
            rows_affected = affected,
            "Updated records"
        );
        Ok(ResponseEnvelope::success(WriteOutput {
            rows_affected: affected,
            message: format!("Updated {} record(s)", affected),
        }))
    }
}
