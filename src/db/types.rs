//! Value mappings from driver types to JSON.
//!
//! SQLite values are decoded by their runtime storage class, classified
//! through `categorize_type`. The ODBC backend fetches text and only decides
//! per column whether to turn it into a number (`numeric_text_value`).

use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

/// Logical category for a column or value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Text,
    Binary,
    Null,
}

/// Classify a type name into a logical category.
///
/// Covers SQLite storage classes ("INTEGER", "REAL", "BLOB") and the common
/// declared type names ("decimal", "varchar", "binary").
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "null" {
        return TypeCategory::Null;
    }

    if lower.contains("int") || lower == "tiny" {
        return TypeCategory::Integer;
    }

    if lower.contains("real")
        || lower.contains("float")
        || lower.contains("double")
        || lower.contains("decimal")
        || lower.contains("numeric")
    {
        return TypeCategory::Float;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    // Text for everything else (varchar, date, time, timestamp...)
    TypeCategory::Text
}

/// Turn driver text for a numeric column into a JSON number.
///
/// Integers stay integral; anything that does not parse is kept as text.
pub fn numeric_text_value(text: &str) -> JsonValue {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return JsonValue::Number(v.into());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(text.to_string()))
}

/// Encode binary column data for the JSON result.
///
/// Valid UTF-8 comes back as text; anything else as base64.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Parse the size from a declared type such as `VARCHAR(255)`.
pub fn declared_size(type_name: &str) -> Option<u64> {
    let open = type_name.find('(')?;
    let close = type_name[open..].find(')')? + open;
    let inner = &type_name[open + 1..close];
    // DECIMAL(10,2) reports its precision
    inner.split(',').next()?.trim().parse().ok()
}

/// Positional JSON values for one SQLite row.
pub fn sqlite_row_values(row: &SqliteRow) -> Vec<JsonValue> {
    (0..row.len()).map(|idx| decode_sqlite_value(row, idx)).collect()
}

/// Decode by the value's runtime storage class rather than the declared
/// column type, since SQLite columns may hold mixed types.
fn decode_sqlite_value(row: &SqliteRow, idx: usize) -> JsonValue {
    let category = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return JsonValue::Null,
        Ok(raw) => categorize_type(raw.type_info().name()),
        Err(e) => {
            tracing::error!(column = idx, error = %e, "Failed to read column");
            return JsonValue::Null;
        }
    };

    match category {
        TypeCategory::Null => JsonValue::Null,
        TypeCategory::Integer => row
            .try_get_unchecked::<i64, _>(idx)
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null),
        TypeCategory::Float => row
            .try_get_unchecked::<f64, _>(idx)
            .ok()
            .and_then(|v| serde_json::Number::from_f64(v).map(JsonValue::Number))
            .unwrap_or(JsonValue::Null),
        TypeCategory::Binary => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|v| decode_binary_value(&v))
            .unwrap_or(JsonValue::Null),
        TypeCategory::Text => row
            .try_get_unchecked::<String, _>(idx)
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
    }
}
