//! Logging Setup
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (from
//! `RUST_LOG` when set) and a stderr `fmt` layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::error::{AppError, AppResult};

const WORKSPACE_TARGETS: [&str; 4] = [
    "query_cascade",
    "query_cascade_core",
    "query_cascade_llm",
    "query_cascade_pipeline",
];

/// Default directive string for a level, scoped to the workspace crates.
pub fn default_directives(level: &str) -> String {
    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Pick the effective level: `--verbose` wins over the configured level.
pub fn effective_level(configured: &str, verbose: bool) -> &str {
    if verbose {
        "debug"
    } else {
        configured
    }
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the workspace crates log at
/// `level`. Fails if a subscriber is already installed.
pub fn init_logging(level: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .map_err(|e| AppError::config(format!("Invalid log level '{}': {}", level, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| AppError::internal(format!("Failed to initialize logging: {}", e)))
}
