//! Query-related data models.
//!
//! This module defines types for SQL parameters and result rows.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row limit for query results.
pub const DEFAULT_ROW_LIMIT: u64 = 100;

/// Default row limit for patient searches.
pub const DEFAULT_SEARCH_LIMIT: u64 = 50;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u64 = 10000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// One result row: column name to scalar value, in driver column order.
pub type ResultRow = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl QueryParam {
    /// Text form used by drivers that bind every parameter as character data.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(v) => Some(if *v { "1" } else { "0" }.to_string()),
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::String(v) => Some(v.clone()),
        }
    }
}

impl From<&JsonValue> for QueryParam {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(v) => Self::Bool(*v),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Self::String(s.clone()),
            // Structured values are stored as their JSON text
            other => Self::String(other.to_string()),
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Rows exactly as a driver reported them: column descriptors plus
/// positional values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl RawRows {
    /// Zip each row with the column descriptors, in order.
    ///
    /// Duplicate column names collapse onto one key; the last occurrence's
    /// value wins.
    pub fn into_result_rows(self) -> Vec<ResultRow> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| {
                let mut row = ResultRow::with_capacity(columns.len());
                for (name, value) in columns.iter().zip(values) {
                    row.insert(name.clone(), value);
                }
                row
            })
            .collect()
    }
}
