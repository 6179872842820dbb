//! Gateway-side grouping.
//!
//! The FileMaker ODBC driver rejects `GROUP BY` on most fields, so reports
//! fetch the rows and count them here instead.

use crate::models::ResultRow;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// One group and the number of rows in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tally {
    pub value: String,
    pub count: u64,
}

/// Count rows by the value of `column`, in first-seen order.
///
/// Missing, null and blank values are counted under `fallback`.
pub fn tally(rows: &[ResultRow], column: &str, fallback: &str) -> Vec<Tally> {
    let mut groups: Vec<Tally> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let key = match row.get(column) {
            None | Some(JsonValue::Null) => fallback.to_string(),
            Some(JsonValue::String(s)) if s.trim().is_empty() => fallback.to_string(),
            Some(JsonValue::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        };

        match positions.get(&key) {
            Some(&idx) => groups[idx].count += 1,
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push(Tally {
                    value: key,
                    count: 1,
                });
            }
        }
    }

    groups
}
