//! Core Error Types
//!
//! Defines the error types shared across the Query Cascade workspace.
//! These are dependency-free (only thiserror + std + serde_json) to keep the
//! core crate lightweight.
//!
//! Collaborator capabilities (classifier, query engine, narrator, ...) report
//! failures as `CoreError`. Stages never let these escape: they are turned
//! into degraded state updates with an `errors` entry.

use thiserror::Error;

/// Core error type for the Query Cascade workspace.
#[derive(Error, Debug)]
pub enum CoreError {
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

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// An external model/provider call failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// The tabular query engine rejected or failed a query
    #[error("Engine error: {0}")]
    Engine(String),

    /// The request was cancelled by its caller
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
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

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create an engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The bare message without the variant prefix.
    ///
    /// Stages embed collaborator failures in their own `errors` wording
    /// (e.g. "Query execution error: ..."), where the variant label would
    /// only add noise. I/O and serde errors fall back to their display form.
    pub fn detail(&self) -> String {
        match self {
            Self::Config(m)
            | Self::Validation(m)
            | Self::NotFound(m)
            | Self::Parse(m)
            | Self::Provider(m)
            | Self::Engine(m)
            | Self::Cancelled(m)
            | Self::Internal(m) => m.clone(),
            Self::Io(e) => e.to_string(),
            Self::Serialization(e) => e.to_string(),
        }
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
