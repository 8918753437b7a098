//! Cross-Platform Path Utilities
//!
//! Resolves the application directory (`<config dir>/query-cascade/`) and
//! the default locations of the config file and database inside it.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

const APP_DIR_NAME: &str = "query-cascade";

/// Get the platform config directory (e.g. ~/.config on Linux)
pub fn platform_config_dir() -> AppResult<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .ok_or_else(|| AppError::config("Could not determine config directory"))
}

/// Get the application directory
pub fn app_dir() -> AppResult<PathBuf> {
    Ok(platform_config_dir()?.join(APP_DIR_NAME))
}

/// Get the default config file path (<app dir>/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("config.json"))
}

/// Get the default database file path (<app dir>/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("data.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensure the parent directory of a file path exists
pub fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
