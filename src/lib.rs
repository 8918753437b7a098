//! Query Cascade - Application Library
//!
//! Everything around the pipeline that a running application needs:
//! - Storage layer (SQLite, dataset metadata, cache, JSON config)
//! - The SQLite query engine and the chat service
//! - Data models, logging and paths
//! - `AppState`, which wires them together

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

// Re-export models (avoiding settings module conflict)
pub use models::response::*;
pub use models::settings::{AppConfig, SettingsUpdate};
pub use services::{ChatService, SqliteQueryEngine};
pub use state::{AppState, ModelCollaborators};
pub use utils::error::{AppError, AppResult};
