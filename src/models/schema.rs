//! Schema-related data models.
//!
//! This module defines the catalog metadata returned by `describe_table` and
//! the schema resources.

use serde::{Deserialize, Serialize};

/// Column metadata reported by the driver catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Driver type name (e.g., "varchar", "decimal", "TEXT")
    #[serde(rename = "type")]
    pub type_name: String,
    pub size: Option<u64>,
    pub nullable: bool,
}

impl ColumnInfo {
    /// Create new column metadata.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        size: Option<u64>,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            size,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Content of a `filemaker://<database>` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub database: String,
    pub tables: Vec<TableSchema>,
}
