//! JSON Configuration Management
//!
//! Handles reading and writing the application configuration file, plus the
//! `QUERY_CASCADE_*` environment overrides applied on top of it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_parent_dir};

pub const ENV_API_KEY: &str = "QUERY_CASCADE_API_KEY";
pub const ENV_BASE_URL: &str = "QUERY_CASCADE_BASE_URL";
pub const ENV_MODEL: &str = "QUERY_CASCADE_MODEL";
pub const ENV_DATABASE: &str = "QUERY_CASCADE_DATABASE";
pub const ENV_LOG_LEVEL: &str = "QUERY_CASCADE_LOG_LEVEL";

/// Configuration service for managing app settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigService {
    /// Load the config at the default location, creating defaults if missing
    pub fn new() -> AppResult<Self> {
        Self::open(config_path()?)
    }

    /// Load the config at `path`, creating a default file if it is missing
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let config_path = path.into();
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            ensure_parent_dir(&config_path)?;
            let default_config = AppConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            tracing::info!("Created default config at {}", config_path.display());
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AppConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration as stored on disk
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// The stored configuration with environment overrides applied.
    ///
    /// Overrides are never written back to the file.
    pub fn effective_config(&self) -> AppResult<AppConfig> {
        let config = apply_env_overrides(self.config.clone(), |key| std::env::var(key).ok());
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Update the configuration with a partial update
    pub fn update_config(&mut self, update: SettingsUpdate) -> AppResult<AppConfig> {
        let mut updated = self.config.clone();
        updated.apply_update(update);
        Self::save_to_file(&self.config_path, &updated)?;
        self.config = updated;
        Ok(self.config.clone())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}

/// Apply `QUERY_CASCADE_*` overrides read through `lookup`.
///
/// Blank values are ignored.
pub fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(api_key) = get(ENV_API_KEY) {
        config.llm.api_key = Some(api_key);
    }
    if let Some(base_url) = get(ENV_BASE_URL) {
        config.llm.base_url = Some(base_url);
    }
    if let Some(model) = get(ENV_MODEL) {
        config.llm.model = model;
    }
    if let Some(database) = get(ENV_DATABASE) {
        config.database_path = Some(database);
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.log_level = level;
    }
    config
}
