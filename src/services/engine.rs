//! SQLite Query Engine
//!
//! The tabular engine behind the pipeline: static validation and execution
//! of synthesized SQL, plus profiling of dataset tables into a
//! `DatasetSchema`. SQLite calls are blocking, so the async capability
//! implementations hop onto the blocking thread pool.

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Number, Value};

use query_cascade_core::{
    ColumnStats, CoreError, CoreResult, DatasetSchema, DateRange, QueryExecutor, QueryValidation,
    QueryValidator, Row,
};

use crate::storage::database::Database;
use crate::utils::error::{AppError, AppResult};

/// Distinct-value count below which a column may be categorical
const CATEGORICAL_DISTINCT_THRESHOLD: i64 = 50;
/// Maximum distinct/total ratio for a categorical column
const CATEGORICAL_RATIO: f64 = 0.5;
/// Sample values kept per categorical column
const MAX_UNIQUE_VALUES: usize = 100;

const DATE_NAME_KEYWORDS: [&str; 8] = [
    "date",
    "time",
    "day",
    "month",
    "year",
    "timestamp",
    "created",
    "updated",
];
const NON_DATE_NAME_KEYWORDS: [&str; 7] =
    ["price", "mrp", "amount", "value", "cost", "qty", "quantity"];
const DATE_TYPES: [&str; 3] = ["DATE", "DATETIME", "TIMESTAMP"];

/// Leading keywords of statements the engine will run.
/// `Statement::readonly` alone lets ATTACH, DETACH and BEGIN through.
const QUERY_KEYWORDS: [&str; 2] = ["SELECT", "WITH"];

const READ_ONLY_REASON: &str = "Only read-only queries are allowed";

/// SQLite column affinity derived from a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    fn from_declared(declared: &str) -> Self {
        let t = declared.to_uppercase();
        if t.contains("INT") {
            Affinity::Integer
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            Affinity::Text
        } else if t.is_empty() || t.contains("BLOB") {
            Affinity::Blob
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Affinity::Integer | Affinity::Real | Affinity::Numeric)
    }
}

/// First keyword of a statement, skipping leading comments
fn leading_keyword(sql: &str) -> String {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i + 1..]).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]).trim_start();
        } else {
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn is_query_statement(sql: &str) -> bool {
    QUERY_KEYWORDS.contains(&leading_keyword(sql).as_str())
}

/// Quote an identifier for interpolation into SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn value_to_f64(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value_to_json(value) {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Query engine over the application database
#[derive(Debug, Clone)]
pub struct SqliteQueryEngine {
    db: Database,
}

impl SqliteQueryEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Compile the statement without running it.
    pub fn validate_sql(&self, sql: &str) -> QueryValidation {
        if sql.trim().is_empty() {
            return QueryValidation::invalid("Query text is empty");
        }
        let conn = match self.db.get_connection() {
            Ok(conn) => conn,
            Err(e) => return QueryValidation::invalid(e.to_string()),
        };
        let validation = match conn.prepare(sql) {
            Ok(stmt) if stmt.readonly() && is_query_statement(sql) => QueryValidation::valid(),
            Ok(_) => QueryValidation::invalid(READ_ONLY_REASON),
            Err(e) => QueryValidation::invalid(e.to_string()),
        };
        validation
    }

    /// Run a read-only query and return its rows as JSON objects
    pub fn execute_sql(&self, sql: &str) -> AppResult<Vec<Row>> {
        let conn = self.db.get_connection()?;
        if !is_query_statement(sql) {
            return Err(AppError::validation(READ_ONLY_REASON));
        }
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(AppError::validation(READ_ONLY_REASON));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Map::new();
            for (idx, column) in columns.iter().enumerate() {
                record.insert(column.clone(), value_to_json(row.get_ref(idx)?));
            }
            results.push(record);
        }

        tracing::debug!("Query returned {} rows: {}", results.len(), sql);
        Ok(results)
    }

    /// Profile an existing table into a dataset schema
    pub fn profile_table(&self, table: &str, dataset_id: &str) -> AppResult<DatasetSchema> {
        if !self.db.table_exists(table)? {
            return Err(AppError::not_found(format!("Table not found: {}", table)));
        }

        let conn = self.db.get_connection()?;
        let quoted_table = quote_ident(table);
        let declared = table_columns(&conn, &quoted_table)?;
        let row_count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", quoted_table), [], |row| {
                row.get(0)
            })?;

        let mut schema = DatasetSchema {
            dataset_id: dataset_id.to_string(),
            filename: table.to_string(),
            table_name: table.to_string(),
            row_count: row_count.max(0) as u64,
            ..Default::default()
        };

        for (column, declared_type) in declared {
            let quoted_column = quote_ident(&column);
            let affinity = Affinity::from_declared(&declared_type);
            let type_label = if declared_type.is_empty() {
                "ANY".to_string()
            } else {
                declared_type.to_uppercase()
            };

            if is_date_column(&column, &type_label, affinity) {
                schema.date_columns.push(column.clone());
                schema.date_range.insert(
                    column.clone(),
                    date_range(&conn, &quoted_table, &quoted_column)?,
                );
            } else if affinity.is_numeric() {
                schema.numerical_columns.push(column.clone());
                schema.summary_stats.insert(
                    column.clone(),
                    column_stats(&conn, &quoted_table, &quoted_column)?,
                );
            }

            let distinct: i64 = conn.query_row(
                &format!("SELECT COUNT(DISTINCT {}) FROM {}", quoted_column, quoted_table),
                [],
                |row| row.get(0),
            )?;
            let candidate = !affinity.is_numeric() || distinct < CATEGORICAL_DISTINCT_THRESHOLD;
            if row_count > 0 && candidate && (distinct as f64 / row_count as f64) < CATEGORICAL_RATIO
            {
                schema.categorical_columns.push(column.clone());
                schema.unique_values.insert(
                    column.clone(),
                    frequent_values(&conn, &quoted_table, &quoted_column)?,
                );
            }

            schema.column_types.insert(column.clone(), type_label);
            schema.columns.push(column);
        }
        schema.column_count = schema.columns.len();

        tracing::info!(
            "Profiled table {}: {} rows, {} columns ({} date, {} categorical, {} numerical)",
            table,
            schema.row_count,
            schema.column_count,
            schema.date_columns.len(),
            schema.categorical_columns.len(),
            schema.numerical_columns.len()
        );
        Ok(schema)
    }
}

fn is_date_column(column: &str, type_label: &str, affinity: Affinity) -> bool {
    if DATE_TYPES.contains(&type_label) {
        return true;
    }
    let lower = column.to_lowercase();
    !affinity.is_numeric()
        && !NON_DATE_NAME_KEYWORDS.iter().any(|k| lower.contains(k))
        && DATE_NAME_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn table_columns(conn: &Connection, quoted_table: &str) -> AppResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted_table))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn column_stats(conn: &Connection, table: &str, column: &str) -> AppResult<ColumnStats> {
    let (mean, min, max, sum, count) = conn.query_row(
        &format!(
            "SELECT AVG({c}), MIN({c}), MAX({c}), SUM({c}), COUNT({c}) FROM {t}",
            c = column,
            t = table
        ),
        [],
        |row| {
            Ok((
                value_to_f64(row.get_ref(0)?),
                value_to_f64(row.get_ref(1)?),
                value_to_f64(row.get_ref(2)?),
                value_to_f64(row.get_ref(3)?),
                row.get::<_, i64>(4)?,
            ))
        },
    )?;

    let median = if count > 0 {
        let offset = (count - 1) / 2;
        let limit = if count % 2 == 0 { 2 } else { 1 };
        let mut stmt = conn.prepare(&format!(
            "SELECT {c} FROM {t} WHERE {c} IS NOT NULL ORDER BY {c} LIMIT ?1 OFFSET ?2",
            c = column,
            t = table
        ))?;
        let middle = stmt
            .query_map([limit, offset], |row| Ok(value_to_f64(row.get_ref(0)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let middle: Vec<f64> = middle.into_iter().flatten().collect();
        if middle.is_empty() {
            None
        } else {
            Some(middle.iter().sum::<f64>() / middle.len() as f64)
        }
    } else {
        None
    };

    Ok(ColumnStats {
        mean,
        median,
        min,
        max,
        sum,
        count: count.max(0) as u64,
    })
}

fn date_range(conn: &Connection, table: &str, column: &str) -> AppResult<DateRange> {
    let range = conn.query_row(
        &format!(
            "SELECT MIN({c}), MAX({c}) FROM {t} WHERE {c} IS NOT NULL AND {c} != ''",
            c = column,
            t = table
        ),
        [],
        |row| {
            Ok(DateRange {
                start: value_to_text(row.get_ref(0)?),
                end: value_to_text(row.get_ref(1)?),
            })
        },
    )?;
    Ok(range)
}

fn frequent_values(conn: &Connection, table: &str, column: &str) -> AppResult<Vec<Value>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {c} FROM {t} WHERE {c} IS NOT NULL GROUP BY {c} ORDER BY COUNT(*) DESC, {c} LIMIT ?1",
        c = column,
        t = table
    ))?;
    let values = stmt
        .query_map([MAX_UNIQUE_VALUES as i64], |row| Ok(value_to_json(row.get_ref(0)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}

fn join_error(e: tokio::task::JoinError) -> CoreError {
    CoreError::internal(format!("Query engine task failed: {}", e))
}

#[async_trait]
impl QueryValidator for SqliteQueryEngine {
    async fn validate_query_text(&self, query_text: &str) -> QueryValidation {
        let engine = self.clone();
        let sql = query_text.to_string();
        match tokio::task::spawn_blocking(move || engine.validate_sql(&sql)).await {
            Ok(validation) => validation,
            Err(e) => QueryValidation::invalid(join_error(e).detail()),
        }
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryEngine {
    async fn execute_query(&self, query_text: &str) -> CoreResult<Vec<Row>> {
        let engine = self.clone();
        let sql = query_text.to_string();
        tokio::task::spawn_blocking(move || engine.execute_sql(&sql))
            .await
            .map_err(join_error)?
            .map_err(AppError::into_core)
    }
}
