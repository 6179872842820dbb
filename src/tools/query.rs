//! Raw SQL query tool.
//!
//! The SQL text is executed exactly as given. Callers are trusted: nothing
//! checks that the statement is read-only. The row limit is applied while
//! fetching, never by editing the statement.

use crate::error::DbResult;
use crate::models::DEFAULT_ROW_LIMIT;
use crate::tools::context::ToolContext;
use crate::tools::envelope::ResponseEnvelope;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// Database name
    pub database: String,
    /// SQL query to execute. FileMaker SQL has no LIMIT clause; use the limit argument instead.
    pub sql: String,
    /// Maximum rows to return. Default: 100
    #[serde(default)]
    pub limit: Option<u64>,
}

pub struct QueryToolHandler {
    ctx: ToolContext,
}

impl QueryToolHandler {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub async fn query(&self, input: QueryInput) -> DbResult<ResponseEnvelope> {
        let limit = self
            .ctx
            .executor()
            .effective_limit(input.limit, DEFAULT_ROW_LIMIT);

        let rows = self.ctx.read(&input.database, &input.sql, &[], limit).await?;

        info!(
            database = %input.database,
            row_count = rows.len(),
            limit = limit,
            "Query executed"
        );
        Ok(ResponseEnvelope::rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_input_limit_optional() {
        let input: QueryInput =
            serde_json::from_value(json!({"database": "Patients", "sql": "SELECT 1"})).unwrap();
        assert_eq!(input.limit, None);
    }

    #[test]
    fn test_query_input_rejects_negative_limit() {
        let result: Result<QueryInput, _> = serde_json::from_value(
            json!({"database": "Patients", "sql": "SELECT 1", "limit": -1}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_query_input_requires_sql() {
        let result: Result<QueryInput, _> = serde_json::from_value(json!({"database": "Patients"}));
        assert!(result.unwrap_err().to_string().contains("sql"));
    }
}
