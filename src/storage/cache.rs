//! Result Cache
//!
//! Short-lived in-process cache (mini-moka) for JSON values such as dataset
//! metadata. A disabled cache stores nothing and never hits.

use std::time::Duration;

use mini_moka::sync::Cache;
use serde_json::Value;

use query_cascade_core::DatasetSchema;

/// Key under which a dataset's schema is cached
pub fn metadata_key(dataset_id: &str) -> String {
    format!("metadata:{}", dataset_id)
}

/// TTL + capacity bounded cache of JSON values
#[derive(Clone)]
pub struct ResultCache {
    inner: Option<Cache<String, Value>>,
}

impl ResultCache {
    pub fn new(enabled: bool, ttl_secs: u64, max_entries: u64) -> Self {
        let inner = enabled.then(|| {
            Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(Duration::from_secs(ttl_secs))
                .build()
        });
        Self { inner }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.inner.as_ref()?.get(&key.to_string());
        if value.is_some() {
            tracing::debug!("Cache hit: {}", key);
        }
        value
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        if let Some(cache) = &self.inner {
            cache.insert(key.into(), value);
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Some(cache) = &self.inner {
            cache.invalidate(&key.to_string());
        }
    }

    /// Cached schema for a dataset, if present and still parseable
    pub fn get_schema(&self, dataset_id: &str) -> Option<DatasetSchema> {
        let value = self.get(&metadata_key(dataset_id))?;
        match DatasetSchema::from_value(value) {
            Ok(schema) => Some(schema),
            Err(e) => {
                tracing::warn!("Dropping unreadable cached metadata for {}: {}", dataset_id, e);
                self.invalidate(&metadata_key(dataset_id));
                None
            }
        }
    }

    pub fn put_schema(&self, schema: &DatasetSchema) {
        if !self.is_enabled() {
            return;
        }
        match serde_json::to_value(schema) {
            Ok(value) => self.insert(metadata_key(&schema.dataset_id), value),
            Err(e) => tracing::warn!("Failed to cache metadata for {}: {}", schema.dataset_id, e),
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
