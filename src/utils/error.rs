//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use query_cascade_core::CoreError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Errors surfaced by the pipeline crates or their collaborators
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] CoreError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Convert to the error type the capability traits report.
    ///
    /// SQLite failures become `CoreError::Engine` so the stages record them
    /// as query-engine errors.
    pub fn into_core(self) -> CoreError {
        match self {
            AppError::Pipeline(err) => err,
            AppError::Sqlite(err) => CoreError::engine(err.to_string()),
            AppError::Database(msg) => CoreError::engine(msg),
            AppError::NotFound(msg) => CoreError::not_found(msg),
            AppError::Validation(msg) => CoreError::validation(msg),
            AppError::Config(msg) => CoreError::config(msg),
            AppError::Io(err) => CoreError::Io(err),
            AppError::Serialization(err) => CoreError::Serialization(err),
            AppError::Internal(msg) => CoreError::internal(msg),
        }
    }
}

/// Convert AppError to a string suitable for transport-level responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
