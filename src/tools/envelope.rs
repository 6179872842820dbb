//! Uniform response wrapper for every operation outcome.

use crate::error::{DbError, ErrorKind};
use crate::models::ResultRow;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// `{success, row_count?, data}` on success, `{success:false, error,
/// error_type}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    /// Always the length of `data` when `data` is a row array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ResponseEnvelope {
    /// Success carrying an arbitrary payload.
    pub fn success(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                success: true,
                row_count: None,
                data: Some(data),
                error: None,
                error_type: None,
                suggestion: None,
            },
            Err(e) => Self::failure(&DbError::internal(format!(
                "Failed to serialize result: {}",
                e
            ))),
        }
    }

    /// Success carrying result rows.
    pub fn rows(rows: Vec<ResultRow>) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            row_count: Some(row_count),
            data: Some(JsonValue::Array(
                rows.into_iter().map(JsonValue::Object).collect(),
            )),
            error: None,
            error_type: None,
            suggestion: None,
        }
    }

    pub fn failure(err: &DbError) -> Self {
        Self {
            success: false,
            row_count: None,
            data: None,
            error: Some(err.to_string()),
            error_type: Some(err.kind()),
            suggestion: err.suggestion().map(str::to_string),
        }
    }

    /// True when the requested operation name was not recognised.
    pub fn is_unknown_operation(&self) -> bool {
        self.error_type == Some(ErrorKind::UnknownOperation)
    }

    /// Pretty-printed JSON text for the tool result.
    pub fn to_json_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(
                "{{\"success\": false, \"error\": \"Failed to render response: {}\"}}",
                e
            )
        })
    }
}
