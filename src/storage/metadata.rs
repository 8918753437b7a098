//! Dataset Metadata Store
//!
//! Persists the profiled `DatasetSchema` of every registered dataset so a
//! chat request can be bound to it by id.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use query_cascade_core::{CoreError, DatasetSchema};

use crate::storage::database::Database;
use crate::utils::error::AppResult;

/// One registered dataset, as listed to users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub dataset_id: String,
    pub filename: String,
    pub table_name: String,
    pub row_count: u64,
    pub created_at: Option<String>,
}

/// Storage for dataset schemas
pub trait MetadataStore: Send + Sync {
    fn get_schema(&self, dataset_id: &str) -> AppResult<Option<DatasetSchema>>;

    /// Insert or replace the schema stored under `schema.dataset_id`
    fn put_schema(&self, schema: &DatasetSchema) -> AppResult<()>;

    /// Returns whether a record was removed
    fn delete_schema(&self, dataset_id: &str) -> AppResult<bool>;

    fn list_datasets(&self) -> AppResult<Vec<DatasetEntry>>;
}

/// `MetadataStore` backed by the `dataset_metadata` table
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    db: Database,
}

impl SqliteMetadataStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn get_schema(&self, dataset_id: &str) -> AppResult<Option<DatasetSchema>> {
        let conn = self.db.get_connection()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT schema_json FROM dataset_metadata WHERE dataset_id = ?1",
                params![dataset_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => {
                let value: serde_json::Value = serde_json::from_str(&json)?;
                Ok(Some(DatasetSchema::from_value(value)?))
            }
            None => Ok(None),
        }
    }

    fn put_schema(&self, schema: &DatasetSchema) -> AppResult<()> {
        let json = serde_json::to_string(schema)?;
        let conn = self.db.get_connection()?;
        conn.execute(
            "INSERT INTO dataset_metadata (dataset_id, schema_json, created_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(dataset_id) DO UPDATE SET schema_json = ?2",
            params![schema.dataset_id, json],
        )?;
        tracing::info!(
            "Registered dataset {} (table {}, {} rows)",
            schema.dataset_id,
            schema.table_name,
            schema.row_count
        );
        Ok(())
    }

    fn delete_schema(&self, dataset_id: &str) -> AppResult<bool> {
        let conn = self.db.get_connection()?;
        let removed = conn.execute(
            "DELETE FROM dataset_metadata WHERE dataset_id = ?1",
            params![dataset_id],
        )?;
        Ok(removed > 0)
    }

    fn list_datasets(&self) -> AppResult<Vec<DatasetEntry>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT dataset_id, schema_json, created_at FROM dataset_metadata ORDER BY dataset_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (dataset_id, json, created_at) = row?;
            let schema = match serde_json::from_str::<serde_json::Value>(&json)
                .map_err(CoreError::from)
                .and_then(DatasetSchema::from_value)
            {
                Ok(schema) => schema,
                Err(e) => {
                    tracing::warn!("Skipping unreadable metadata for {}: {}", dataset_id, e);
                    continue;
                }
            };
            entries.push(DatasetEntry {
                dataset_id,
                filename: schema.filename,
                table_name: schema.table_name,
                row_count: schema.row_count,
                created_at,
            });
        }
        Ok(entries)
    }
}
