//! Storage Layer
//!
//! Handles all data persistence: SQLite database, dataset metadata, the
//! in-process cache and the JSON config.

pub mod cache;
pub mod config;
pub mod database;
pub mod metadata;

pub use cache::*;
pub use config::*;
pub use database::*;
pub use metadata::*;
