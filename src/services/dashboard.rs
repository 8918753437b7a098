//! Dashboard Generation
//!
//! Builds an at-a-glance dashboard for a registered dataset: KPI cards from
//! the profiled statistics plus a few charts queried from the dataset table.
//! No model calls are involved; every number comes from the profile or from
//! SQLite.
//!
//! A chart or KPI whose query fails is skipped with a warning, so a dataset
//! with an unusual shape still gets a (smaller) dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use query_cascade_core::{ChartSuggestion, ChartType, DatasetSchema, Row};

use crate::services::chat::default_table_name;
use crate::services::engine::{quote_ident, SqliteQueryEngine};

pub const MAX_KPIS: usize = 6;
pub const MAX_CHARTS: usize = 4;

const KPI_NUMERICAL_COLUMNS: usize = 3;
const KPI_CATEGORICAL_COLUMNS: usize = 2;
const CATEGORY_CHART_ROWS: usize = 10;
const TIME_SERIES_ROWS: usize = 30;
const CHART_HEIGHT: u32 = 300;

/// Cache key for a dataset's dashboard
pub fn dashboard_key(dataset_id: &str) -> String {
    format!("dashboard:{}", dataset_id)
}

// ============================================================================
// Types
// ============================================================================

/// A single headline number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiCard {
    pub title: String,
    pub value: Value,
    pub unit: String,
    pub trend: String,
}

impl KpiCard {
    fn new(title: impl Into<String>, value: impl Into<Value>, unit: &str) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            unit: unit.to_string(),
            trend: "neutral".to_string(),
        }
    }
}

/// KPI cards and charts for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub dataset_id: String,
    pub kpis: Vec<KpiCard>,
    pub charts: Vec<ChartSuggestion>,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Service
// ============================================================================

/// Generates dashboards from a dataset schema and its table
#[derive(Debug, Clone)]
pub struct DashboardService {
    engine: SqliteQueryEngine,
}

impl DashboardService {
    pub fn new(engine: SqliteQueryEngine) -> Self {
        Self { engine }
    }

    pub fn generate(&self, schema: &DatasetSchema) -> Dashboard {
        let table = if schema.table_name.trim().is_empty() {
            default_table_name(&schema.dataset_id)
        } else {
            schema.table_name.clone()
        };

        let kpis = self.kpis(schema, &table);
        let charts = self.charts(schema, &table);
        tracing::info!(
            "Generated dashboard for {}: {} KPIs, {} charts",
            schema.dataset_id,
            kpis.len(),
            charts.len()
        );

        Dashboard {
            dataset_id: schema.dataset_id.clone(),
            kpis,
            charts,
            generated_at: Utc::now(),
        }
    }

    fn kpis(&self, schema: &DatasetSchema, table: &str) -> Vec<KpiCard> {
        let mut kpis = vec![KpiCard::new("Total Records", schema.row_count, "rows")];

        for column in schema.numerical_columns.iter().take(KPI_NUMERICAL_COLUMNS) {
            let Some(stats) = schema.summary_stats.get(column) else {
                continue;
            };
            // Zero totals carry no information on a dashboard
            if let Some(sum) = stats.sum.filter(|v| *v != 0.0) {
                kpis.push(KpiCard::new(format!("Total {}", column), round2(sum), ""));
            }
            if let Some(mean) = stats.mean.filter(|v| *v != 0.0) {
                kpis.push(KpiCard::new(format!("Average {}", column), round2(mean), ""));
            }
        }

        for column in schema.categorical_columns.iter().take(KPI_CATEGORICAL_COLUMNS) {
            let sql = format!(
                "SELECT COUNT(DISTINCT {}) AS count FROM {}",
                quote_ident(column),
                quote_ident(table)
            );
            if let Some(count) = self.query(&sql).and_then(|rows| rows.first()?.get("count").cloned())
            {
                kpis.push(KpiCard::new(format!("Unique {}", column), count, ""));
            }
        }

        kpis.truncate(MAX_KPIS);
        kpis
    }

    fn charts(&self, schema: &DatasetSchema, table: &str) -> Vec<ChartSuggestion> {
        let mut charts = Vec::new();
        let Some(numerical) = schema.numerical_columns.first() else {
            return charts;
        };
        let num = quote_ident(numerical);
        let quoted_table = quote_ident(table);

        if let Some(categorical) = schema.categorical_columns.first() {
            let cat = quote_ident(categorical);
            let sql = format!(
                "SELECT {cat}, SUM({num}) AS total FROM {quoted_table} \
                 WHERE {cat} IS NOT NULL AND {num} IS NOT NULL \
                 GROUP BY {cat} ORDER BY total DESC LIMIT {CATEGORY_CHART_ROWS}"
            );
            if let Some(data) = self.query(&sql) {
                charts.push(chart(
                    ChartType::Bar,
                    format!("{} by {}", numerical, categorical),
                    data,
                    categorical,
                    "total",
                ));
            }
        }

        if let Some(date) = schema.date_columns.first() {
            let date_col = quote_ident(date);
            let sql = format!(
                "SELECT {date_col} AS \"date\", SUM({num}) AS total FROM {quoted_table} \
                 WHERE {date_col} IS NOT NULL AND {num} IS NOT NULL \
                 GROUP BY {date_col} ORDER BY {date_col} LIMIT {TIME_SERIES_ROWS}"
            );
            if let Some(data) = self.query(&sql) {
                charts.push(chart(
                    ChartType::Line,
                    format!("{} Over Time", numerical),
                    data,
                    "date",
                    "total",
                ));
            }
        }

        if let Some(categorical) = schema.categorical_columns.first() {
            let cat = quote_ident(categorical);
            let avg_alias = quote_ident(&format!("avg_{}", numerical));
            let sql = format!(
                "SELECT {cat}, COUNT(*) AS count, ROUND(AVG({num}), 2) AS {avg_alias} \
                 FROM {quoted_table} WHERE {cat} IS NOT NULL \
                 GROUP BY {cat} ORDER BY count DESC, {cat} LIMIT {CATEGORY_CHART_ROWS}"
            );
            if let Some(data) = self.query(&sql) {
                charts.push(chart(
                    ChartType::Table,
                    format!("Top {} Summary", categorical),
                    data,
                    categorical,
                    "count",
                ));
            }
        }

        charts.truncate(MAX_CHARTS);
        charts
    }

    /// Run a dashboard query; failures and empty results yield `None`.
    fn query(&self, sql: &str) -> Option<Vec<Row>> {
        match self.engine.execute_sql(sql) {
            Ok(rows) if !rows.is_empty() => Some(rows),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Dashboard query failed, skipping: {}", e);
                None
            }
        }
    }
}

fn chart(
    chart_type: ChartType,
    title: String,
    data: Vec<Row>,
    x_axis: &str,
    y_axis: &str,
) -> ChartSuggestion {
    ChartSuggestion {
        chart_type,
        title,
        data,
        x_axis: x_axis.to_string(),
        y_axis: y_axis.to_string(),
        height: CHART_HEIGHT,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
