//! Dataset Schema
//!
//! The structured description of an uploaded dataset as produced by the
//! profiler: column names, inferred types, the categorical / date / numerical
//! split and precomputed statistics. The pipeline only ever reads it.
//!
//! Deserialization is lenient. Records written by older profilers may lack
//! any of the optional sections; every field falls back to an empty default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;

/// Inclusive date range observed in a date column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Precomputed statistics for a numerical column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: Option<f64>,
    #[serde(default)]
    pub count: u64,
}

/// Profiled schema of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSchema {
    /// Identifier the dataset was registered under
    pub dataset_id: String,
    /// Original file name (informational)
    pub filename: String,
    /// Table the query engine exposes the data as
    pub table_name: String,
    /// Total number of rows in the dataset
    pub row_count: u64,
    /// Number of columns
    pub column_count: usize,
    /// Column names in table order
    pub columns: Vec<String>,
    /// Column name -> inferred type label
    #[serde(alias = "schema")]
    pub column_types: BTreeMap<String, String>,
    pub date_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub numerical_columns: Vec<String>,
    /// Per date column: observed min/max
    pub date_range: BTreeMap<String, DateRange>,
    /// Per categorical column: distinct sample values
    pub unique_values: BTreeMap<String, Vec<Value>>,
    /// Per numerical column: summary statistics
    pub summary_stats: BTreeMap<String, ColumnStats>,
}

/// Compact dataset description handed to the narrative synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub filename: String,
    pub row_count: u64,
    pub date_range: BTreeMap<String, DateRange>,
    pub columns: Vec<String>,
}

impl DatasetSchema {
    /// Parse a stored metadata record, tolerating missing sections.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let mut schema: DatasetSchema = serde_json::from_value(value)?;
        schema.normalize();
        Ok(schema)
    }

    /// Fill derived fields that older records leave empty.
    pub fn normalize(&mut self) {
        if self.columns.is_empty() && !self.column_types.is_empty() {
            self.columns = self.column_types.keys().cloned().collect();
        }
        if self.column_count == 0 {
            self.column_count = self.columns.len();
        }
    }

    /// Inferred type label of a column, if known.
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.categorical_columns.iter().any(|c| c == column)
    }

    pub fn is_numerical(&self, column: &str) -> bool {
        self.numerical_columns.iter().any(|c| c == column)
    }

    pub fn summary(&self) -> SchemaSummary {
        SchemaSummary {
            filename: self.filename.clone(),
            row_count: self.row_count,
            date_range: self.date_range.clone(),
            columns: self.columns.clone(),
        }
    }
}
