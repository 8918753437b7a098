//! Result Rows and Chart Suggestions
//!
//! Query results are carried as JSON objects keyed by column name, in the
//! column order the engine returned them (serde_json's `preserve_order`
//! feature keeps insertion order, which the chart heuristics depend on).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: column name -> value.
pub type Row = Map<String, Value>;

/// Whether every value in the row is null. An empty row counts as all-null.
pub fn row_is_all_null(row: &Row) -> bool {
    row.values().all(Value::is_null)
}

/// Column names of the first row, in result order.
pub fn result_columns(rows: &[Row]) -> Vec<&str> {
    rows.first()
        .map(|row| row.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

// ============================================================================
// Chart suggestions
// ============================================================================

/// Supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
    Area,
    Scatter,
    Table,
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartType::Bar => write!(f, "bar"),
            ChartType::Line => write!(f, "line"),
            ChartType::Pie => write!(f, "pie"),
            ChartType::Area => write!(f, "area"),
            ChartType::Scatter => write!(f, "scatter"),
            ChartType::Table => write!(f, "table"),
        }
    }
}

/// A chart the client may render next to the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSuggestion {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: String,
    pub data: Vec<Row>,
    pub x_axis: String,
    pub y_axis: String,
    pub height: u32,
}

/// Optional chart preference returned by a narrative synthesizer.
///
/// Hints only refine the suggestion derived from the result columns; they
/// never name axes themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationHint {
    #[serde(default)]
    pub chart_type: Option<ChartType>,
    #[serde(default)]
    pub title: Option<String>,
}
