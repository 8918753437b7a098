//! Settings Models
//!
//! Application configuration and settings data structures.

use serde::{Deserialize, Serialize};

use query_cascade_llm::ProviderConfig;
use query_cascade_pipeline::PipelineConfig;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Application configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider settings
    #[serde(default)]
    pub llm: ProviderConfig,
    /// SQLite database file; the platform default when unset
    #[serde(default)]
    pub database_path: Option<String>,
    /// Cache dataset metadata between requests
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Cache entry lifetime in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum cached entries
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
    /// Whole-request budget in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Log level used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Pipeline bounds and sample sizes
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cache_max_entries() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: ProviderConfig::default(),
            database_path: None,
            cache_enabled: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub database_path: Option<String>,
    pub cache_enabled: Option<bool>,
    pub cache_ttl_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub max_retries: Option<u32>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(api_key) = update.api_key {
            self.llm.api_key = Some(api_key);
        }
        if let Some(base_url) = update.base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(model) = update.model {
            self.llm.model = model;
        }
        if let Some(path) = update.database_path {
            self.database_path = Some(path);
        }
        if let Some(enabled) = update.cache_enabled {
            self.cache_enabled = enabled;
        }
        if let Some(ttl) = update.cache_ttl_secs {
            self.cache_ttl_secs = ttl;
        }
        if let Some(timeout) = update.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(level) = update.log_level {
            self.log_level = level;
        }
        if let Some(max_retries) = update.max_retries {
            self.pipeline.max_retries = max_retries;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.llm.validate()?;
        self.pipeline.validate().map_err(|e| e.to_string())?;

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level: {}. Must be one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }

        if self.cache_enabled && (self.cache_ttl_secs == 0 || self.cache_max_entries == 0) {
            return Err(
                "cache_ttl_secs and cache_max_entries must be positive when caching is enabled"
                    .to_string(),
            );
        }

        Ok(())
    }
}
