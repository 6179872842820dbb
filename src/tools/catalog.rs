//! The fixed operation catalog.
//!
//! Every operation the gateway serves is a variant of `Operation`. Names,
//! descriptions and argument schemas all come from here, so the tool listing
//! and the dispatcher cannot drift apart.

use crate::tools::domain::{GetAppointmentsInput, GetTransactionsInput, SearchPatientsInput};
use crate::tools::query::QueryInput;
use crate::tools::schema::{DescribeTableInput, ListAllDatabasesInput, ListTablesInput};
use crate::tools::write::{InsertRecordInput, UpdateRecordInput};
use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Query,
    ListTables,
    DescribeTable,
    InsertRecord,
    UpdateRecord,
    ListAllDatabases,
    SearchPatients,
    GetAppointments,
    GetTransactions,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Query,
        Operation::ListTables,
        Operation::DescribeTable,
        Operation::InsertRecord,
        Operation::UpdateRecord,
        Operation::ListAllDatabases,
        Operation::SearchPatients,
        Operation::GetAppointments,
        Operation::GetTransactions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::InsertRecord => "insert_record",
            Self::UpdateRecord => "update_record",
            Self::ListAllDatabases => "list_all_databases",
            Self::SearchPatients => "search_patients",
            Self::GetAppointments => "get_appointments",
            Self::GetTransactions => "get_transactions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Query => {
                "Execute a SQL query on a FileMaker database.\n\
                 FileMaker SQL has no LIMIT or FETCH FIRST; rows are capped by the limit argument."
            }
            Self::ListTables => "List all tables in a FileMaker database",
            Self::DescribeTable => "Get column information for a table in a FileMaker database",
            Self::InsertRecord => "Insert a new record into a FileMaker table",
            Self::UpdateRecord => {
                "Update records in a FileMaker table.\n\
                 The where argument is used verbatim as the WHERE clause."
            }
            Self::ListAllDatabases => {
                "List all available FileMaker databases and their tables.\n\
                 Unreachable databases are reported individually with an error."
            }
            Self::SearchPatients => "Search for patients by name, ID, or other criteria",
            Self::GetAppointments => "Get appointments for a specific date or date range",
            Self::GetTransactions => "Get transactions for a patient or date range",
        }
    }

    /// True when the caller picks the database through a `database` argument.
    pub fn takes_database(self) -> bool {
        matches!(
            self,
            Self::Query
                | Self::ListTables
                | Self::DescribeTable
                | Self::InsertRecord
                | Self::UpdateRecord
        )
    }

    /// JSON Schema of the operation's arguments.
    pub fn input_schema(self) -> JsonObject {
        match self {
            Self::Query => schema_object::<QueryInput>(),
            Self::ListTables => schema_object::<ListTablesInput>(),
            Self::DescribeTable => schema_object::<DescribeTableInput>(),
            Self::InsertRecord => schema_object::<InsertRecordInput>(),
            Self::UpdateRecord => schema_object::<UpdateRecordInput>(),
            Self::ListAllDatabases => schema_object::<ListAllDatabasesInput>(),
            Self::SearchPatients => schema_object::<SearchPatientsInput>(),
            Self::GetAppointments => schema_object::<GetAppointmentsInput>(),
            Self::GetTransactions => schema_object::<GetTransactionsInput>(),
        }
    }

    /// MCP tool definition; `databases` is listed in the `database` argument's
    /// description.
    pub fn tool(self, databases: &[String]) -> Tool {
        let mut schema = self.input_schema();
        if self.takes_database() {
            if let Some(JsonValue::Object(database)) = schema
                .get_mut("properties")
                .and_then(|p| p.get_mut("database"))
            {
                database.insert(
                    "description".to_string(),
                    JsonValue::String(format!("Database name. Available: {}", databases.join(", "))),
                );
            }
        }
        Tool::new(self.name(), self.description(), Arc::new(schema))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn schema_object<T: JsonSchema>() -> JsonObject {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(JsonValue::Object(mut object)) => {
            // MCP clients expect a plain object schema
            object.remove("$schema");
            object.remove("title");
            object
                .entry("properties")
                .or_insert_with(|| JsonValue::Object(JsonObject::new()));
            object
        }
        _ => JsonObject::from_iter([("type".to_string(), JsonValue::from("object"))]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("drop_database"), None);
        assert_eq!(Operation::from_name("Query"), None);
    }

    #[test]
    fn test_required_arguments() {
        let required = |op: Operation| -> Vec<String> {
            let mut names: Vec<String> = op
                .input_schema()
                .get("required")
                .and_then(JsonValue::as_array)
                .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default();
            names.sort();
            names
        };

        assert_eq!(required(Operation::Query), vec!["database", "sql"]);
        assert_eq!(
            required(Operation::UpdateRecord),
            vec!["data", "database", "table", "where"]
        );
        assert_eq!(required(Operation::SearchPatients), vec!["search_term"]);
        assert_eq!(required(Operation::GetAppointments), vec!["date"]);
        assert!(required(Operation::GetTransactions).is_empty());
        assert!(required(Operation::ListAllDatabases).is_empty());
    }

    #[test]
    fn test_tool_lists_databases() {
        let databases = vec!["Patients".to_string(), "Email".to_string()];
        let tool = Operation::ListTables.tool(&databases);
        assert_eq!(tool.name, "list_tables");
        let description = tool.input_schema["properties"]["database"]["description"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(description, "Database name. Available: Patients, Email");
    }

    #[test]
    fn test_schemas_are_objects() {
        for op in Operation::ALL {
            let schema = op.input_schema();
            assert_eq!(schema["type"], "object", "{}", op);
            assert!(schema.contains_key("properties"), "{}", op);
        }
    }
}
