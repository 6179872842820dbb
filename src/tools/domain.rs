//! Practice-management lookups.
//!
//! Each tool targets a fixed database and table of the practice's FileMaker
//! solution and builds a parameterized statement from whichever filters were
//! supplied.

use crate::error::DbResult;
use crate::models::{DEFAULT_ROW_LIMIT, DEFAULT_SEARCH_LIMIT, QueryParam};
use crate::tools::context::{ToolContext, non_empty};
use crate::tools::envelope::ResponseEnvelope;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

pub const PATIENTS_DATABASE: &str = "Patients";
pub const APPOINTMENTS_DATABASE: &str = "Appointments";
pub const TRANSACTIONS_DATABASE: &str = "Transactions";

/// Field searched when the caller does not pick one.
pub const DEFAULT_SEARCH_FIELD: &str = "\"Last Name\"";

/// Columns returned by a patient search; full records are too wide to list.
const PATIENT_COLUMNS: &str = "\"Last Name\", \"First Name\", \"Middle Initial\", \
     \"Street Address\", \"City\", \"State\", \"Zip\", \
     \"Home Phone\", \"Work Phone\", \"birth date\"";

/// Input for the search_patients tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchPatientsInput {
    /// Search term (name, patient ID, phone, etc.)
    pub search_term: String,
    /// Field to search in. Quote fields with spaces: "Last Name", "First Name", "patient id#". Default: "Last Name"
    #[serde(default, deserialize_with = "non_empty")]
    #[schemars(with = "Option<String>")]
    pub field: Option<String>,
    /// Maximum results to return. Default: 50
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Input for the get_appointments tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetAppointmentsInput {
    /// Date in YYYY-MM-DD format
    pub date: String,
    /// End date for a range query
    #[serde(default, deserialize_with = "non_empty")]
    #[schemars(with = "Option<String>")]
    pub end_date: Option<String>,
    /// Filter by patient ID
    #[serde(default, deserialize_with = "non_empty")]
    #[schemars(with = "Option<String>")]
    pub patient_id: Option<String>,
    /// Maximum results to return. Default: 100
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Input for the get_transactions tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GetTransactionsInput {
    /// Patient ID to look up transactions for
    #[serde(default, deserialize_with = "non_empty")]
    #[schemars(with = "Option<String>")]
    pub patient_id: Option<String>,
    /// Start date in YYYY-MM-DD format
    #[serde(default, deserialize_with = "non_empty")]
    #[schemars(with = "Option<String>")]
    pub start_date: Option<String>,
    /// End date in YYYY-MM-DD format
    #[serde(default, deserialize_with = "non_empty")]
    #[schemars(with = "Option<String>")]
    pub end_date: Option<String>,
    /// Maximum results to return. Default: 100
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Substring search: the term is wrapped in `%` and bound as-is, so any
/// wildcard characters inside it keep their LIKE meaning.
pub fn build_patient_search(input: &SearchPatientsInput) -> (String, Vec<QueryParam>) {
    let field = input.field.as_deref().unwrap_or(DEFAULT_SEARCH_FIELD);
    let sql = format!(
        "SELECT {} FROM Patients WHERE {} LIKE ?",
        PATIENT_COLUMNS, field
    );
    (sql, vec![QueryParam::from(format!("%{}%", input.search_term))])
}

pub fn build_appointments(input: &GetAppointmentsInput) -> (String, Vec<QueryParam>) {
    let mut params = vec![QueryParam::from(input.date.as_str())];
    let mut sql = match &input.end_date {
        Some(end_date) => {
            params.push(QueryParam::from(end_date.as_str()));
            String::from("SELECT * FROM Appointments WHERE dateappt BETWEEN ? AND ?")
        }
        None => String::from("SELECT * FROM Appointments WHERE dateappt = ?"),
    };

    if let Some(patient_id) = &input.patient_id {
        sql.push_str(" AND \"patient id#\" = ?");
        params.push(QueryParam::from(patient_id.as_str()));
    }

    sql.push_str(" ORDER BY timeappt");
    (sql, params)
}

pub fn build_transactions(input: &GetTransactionsInput) -> (String, Vec<QueryParam>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(patient_id) = &input.patient_id {
        conditions.push("\"patient id#\" = ?");
        params.push(QueryParam::from(patient_id.as_str()));
    }
    if let Some(start_date) = &input.start_date {
        conditions.push("\"trans date\" >= ?");
        params.push(QueryParam::from(start_date.as_str()));
    }
    if let Some(end_date) = &input.end_date {
        conditions.push("\"trans date\" <= ?");
        params.push(QueryParam::from(end_date.as_str()));
    }

    let mut sql = String::from("SELECT * FROM Transactions");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    (sql, params)
}

pub struct DomainToolHandler {
    ctx: ToolContext,
}

impl DomainToolHandler {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    async fn rows(
        &self,
        database: &str,
        (sql, params): (String, Vec<QueryParam>),
        limit: Option<u64>,
        default_limit: u64,
    ) -> DbResult<ResponseEnvelope> {
        let limit = self.ctx.executor().effective_limit(limit, default_limit);
        let rows = self.ctx.read(database, &sql, &params, limit).await?;
        info!(database = %database, row_count = rows.len(), "Lookup complete");
        Ok(ResponseEnvelope::rows(rows))
    }

    pub async fn search_patients(&self, input: SearchPatientsInput) -> DbResult<ResponseEnvelope> {
        let statement = build_patient_search(&input);
        self.rows(PATIENTS_DATABASE, statement, input.limit, DEFAULT_SEARCH_LIMIT)
            .await
    }

    pub async fn get_appointments(
        &self,
        input: GetAppointmentsInput,
    ) -> DbResult<ResponseEnvelope> {
        let statement = build_appointments(&input);
        self.rows(APPOINTMENTS_DATABASE, statement, input.limit, DEFAULT_ROW_LIMIT)
            .await
    }

    pub async fn get_transactions(
        &self,
        input: GetTransactionsInput,
    ) -> DbResult<ResponseEnvelope> {
        let statement = build_transactions(&input);
        self.rows(TRANSACTIONS_DATABASE, statement, input.limit, DEFAULT_ROW_LIMIT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patient_search_defaults_to_last_name() {
        let input: SearchPatientsInput =
            serde_json::from_value(json!({"search_term": "Smith", "field": ""})).unwrap();
        let (sql, params) = build_patient_search(&input);
        assert!(sql.ends_with("FROM Patients WHERE \"Last Name\" LIKE ?"));
        assert!(sql.starts_with("SELECT \"Last Name\", \"First Name\""));
        assert_eq!(params, vec![QueryParam::from("%Smith%")]);
    }

    #[test]
    fn test_patient_search_wildcards_not_escaped() {
        let input: SearchPatientsInput = serde_json::from_value(
            json!({"search_term": "Sm%th", "field": "\"First Name\""}),
        )
        .unwrap();
        let (sql, params) = build_patient_search(&input);
        assert!(sql.contains("WHERE \"First Name\" LIKE ?"));
        assert_eq!(params, vec![QueryParam::from("%Sm%th%")]);
    }

    #[test]
    fn test_appointments_single_day() {
        let input: GetAppointmentsInput =
            serde_json::from_value(json!({"date": "2024-03-01"})).unwrap();
        let (sql, params) = build_appointments(&input);
        assert_eq!(
            sql,
            "SELECT * FROM Appointments WHERE dateappt = ? ORDER BY timeappt"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_appointments_range_for_patient() {
        let input: GetAppointmentsInput = serde_json::from_value(json!({
            "date": "2024-03-01",
            "end_date": "2024-03-31",
            "patient_id": "1042"
        }))
        .unwrap();
        let (sql, params) = build_appointments(&input);
        assert_eq!(
            sql,
            "SELECT * FROM Appointments WHERE dateappt BETWEEN ? AND ? \
             AND \"patient id#\" = ? ORDER BY timeappt"
        );
        assert_eq!(
            params,
            vec![
                QueryParam::from("2024-03-01"),
                QueryParam::from("2024-03-31"),
                QueryParam::from("1042")
            ]
        );
    }

    #[test]
    fn test_transactions_without_filters() {
        let (sql, params) = build_transactions(&GetTransactionsInput::default());
        assert_eq!(sql, "SELECT * FROM Transactions");
        assert!(params.is_empty());
    }

    #[test]
    fn test_transactions_partial_filters() {
        let input: GetTransactionsInput = serde_json::from_value(json!({
            "patient_id": "",
            "start_date": "2024-01-01",
            "end_date": "2024-06-30"
        }))
        .unwrap();
        let (sql, params) = build_transactions(&input);
        assert_eq!(
            sql,
            "SELECT * FROM Transactions WHERE \"trans date\" >= ? AND \"trans date\" <= ?"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let result: Result<GetTransactionsInput, _> =
            serde_json::from_value(json!({"patient_id": 1042}));
        assert!(result.is_err());
    }
}
