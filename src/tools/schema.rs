//! Schema introspection tools.
//!
//! This module implements the `list_tables`, `describe_table` and
//! `list_all_databases` MCP tools.

use crate::error::DbResult;
use crate::models::ColumnInfo;
use crate::tools::context::ToolContext;
use crate::tools::envelope::ResponseEnvelope;
use futures_util::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database name
    pub database: String,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Database name
    pub database: String,
    /// Table name to describe
    pub table: String,
}

/// Input for the list_all_databases tool (no arguments).
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListAllDatabasesInput {}

#[derive(Debug, Clone, Serialize)]
pub struct ListTablesOutput {
    pub database: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DescribeTableOutput {
    pub database: String,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

/// One database's slot in the `list_all_databases` result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DatabaseEntry {
    Tables { tables: Vec<String>, count: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ListAllDatabasesOutput {
    /// Keyed by database name, in catalog order.
    pub databases: serde_json::Map<String, JsonValue>,
}

pub struct SchemaToolHandler {
    ctx: ToolContext,
}

impl SchemaToolHandler {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ResponseEnvelope> {
        let tables = self.ctx.tables(&input.database).await?;
        info!(database = %input.database, count = tables.len(), "Listed tables");

        Ok(ResponseEnvelope::success(ListTablesOutput {
            database: input.database,
            tables,
        }))
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<ResponseEnvelope> {
        let columns = self.ctx.columns(&input.database, &input.table).await?;
        info!(
            database = %input.database,
            table = %input.table,
            columns = columns.len(),
            "Described table"
        );

        Ok(ResponseEnvelope::success(DescribeTableOutput {
            database: input.database,
            table: input.table,
            columns,
        }))
    }

    /// List the tables of every catalogued database.
    ///
    /// Databases are queried in parallel; each one fails on its own and is
    /// reported as `{error}` without affecting the others.
    pub async fn list_all_databases(
        &self,
        _input: ListAllDatabasesInput,
    ) -> DbResult<ResponseEnvelope> {
        let lookups = self.ctx.databases().iter().map(|name| async move {
            let entry = match self.ctx.tables(name).await {
                Ok(tables) => DatabaseEntry::Tables {
                    count: tables.len(),
                    tables,
                },
                Err(e) => {
                    warn!(database = %name, error = %e, "Database unavailable");
                    DatabaseEntry::Failed {
                        error: e.to_string(),
                    }
                }
            };
            (name.clone(), entry)
        });

        let mut databases = serde_json::Map::new();
        for (name, entry) in join_all(lookups).await {
            let value = serde_json::to_value(entry)?;
            databases.insert(name, value);
        }

        Ok(ResponseEnvelope::success(ListAllDatabasesOutput { databases }))
    }
}
