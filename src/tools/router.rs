//! Operation dispatch.
//!
//! A call moves through validation, dispatch and execution. Arguments are
//! validated by deserializing them into the operation's input type, before
//! any connection is requested. Every outcome, failures included, comes back
//! as a `ResponseEnvelope`.

use crate::error::{DbError, DbResult};
use crate::tools::catalog::Operation;
use crate::tools::context::ToolContext;
use crate::tools::domain::DomainToolHandler;
use crate::tools::envelope::ResponseEnvelope;
use crate::tools::query::QueryToolHandler;
use crate::tools::schema::SchemaToolHandler;
use crate::tools::write::WriteToolHandler;
use rmcp::model::{JsonObject, Tool};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct OperationRouter {
    ctx: ToolContext,
}

impl OperationRouter {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Tool definitions for the whole catalog.
    pub fn tools(&self) -> Vec<Tool> {
        Operation::ALL
            .into_iter()
            .map(|op| op.tool(self.ctx.databases()))
            .collect()
    }

    /// Run the named operation.
    ///
    /// An unknown name yields an `unknown_operation` failure without touching
    /// any connection.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> ResponseEnvelope {
        let request_id = Uuid::new_v4();
        let span = info_span!("operation", name = %name, request_id = %request_id);

        async move {
            let start = Instant::now();
            let result = match Operation::from_name(name) {
                Some(op) => self.dispatch(op, arguments.unwrap_or_default()).await,
                None => Err(DbError::unknown_operation(name)),
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(envelope) => {
                    info!(
                        elapsed_ms = elapsed_ms,
                        row_count = envelope.row_count,
                        "Operation completed"
                    );
                    envelope
                }
                Err(e) => {
                    warn!(
                        elapsed_ms = elapsed_ms,
                        error = %e,
                        error_type = ?e.kind(),
                        "Operation failed"
                    );
                    ResponseEnvelope::failure(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, op: Operation, arguments: JsonObject) -> DbResult<ResponseEnvelope> {
        let ctx = self.ctx.clone();
        match op {
            Operation::Query => {
                let input = parse_args(op, arguments)?;
                QueryToolHandler::new(ctx).query(input).await
            }
            Operation::ListTables => {
                let input = parse_args(op, arguments)?;
                SchemaToolHandler::new(ctx).list_tables(input).await
            }
            Operation::DescribeTable => {
                let input = parse_args(op, arguments)?;
                SchemaToolHandler::new(ctx).describe_table(input).await
            }
            Operation::ListAllDatabases => {
                let input = parse_args(op, arguments)?;
                SchemaToolHandler::new(ctx).list_all_databases(input).await
            }
            Operation::InsertRecord => {
                let input = parse_args(op, arguments)?;
                WriteToolHandler::new(ctx).insert_record(input).await
            }
            Operation::UpdateRecord => {
                let input = parse_args(op, arguments)?;
                WriteToolHandler::new(ctx).update_record(input).await
            }
            Operation::SearchPatients => {
                let input = parse_args(op, arguments)?;
                DomainToolHandler::new(ctx).search_patients(input).await
            }
            Operation::GetAppointments => {
                let input = parse_args(op, arguments)?;
                DomainToolHandler::new(ctx).get_appointments(input).await
            }
            Operation::GetTransactions => {
                let input = parse_args(op, arguments)?;
                DomainToolHandler::new(ctx).get_transactions(input).await
            }
        }
    }
}

/// Deserialize the arguments of `op`; missing or mistyped arguments are a
/// validation failure.
fn parse_args<T: DeserializeOwned>(op: Operation, arguments: JsonObject) -> DbResult<T> {
    serde_json::from_value(JsonValue::Object(arguments))
        .map_err(|e| DbError::validation(format!("{}: {}", op, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::write::InsertRecordInput;
    use serde_json::json;

    fn args(value: JsonValue) -> JsonObject {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_missing_argument_is_validation_error() {
        let err = parse_args::<InsertRecordInput>(
            Operation::InsertRecord,
            args(json!({"database": "Patients", "table": "Patients"})),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
        assert!(err.to_string().contains("insert_record"));
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn test_data_must_be_object() {
        let err = parse_args::<InsertRecordInput>(
            Operation::InsertRecord,
            args(json!({"database": "Patients", "table": "Patients", "data": "x"})),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }
}
