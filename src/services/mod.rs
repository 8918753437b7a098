//! Services
//!
//! The SQLite query engine, the chat service that drives the pipeline and
//! the dataset dashboard generator.

pub mod chat;
pub mod dashboard;
pub mod engine;

pub use chat::{default_table_name, ChatService};
pub use dashboard::{dashboard_key, Dashboard, DashboardService, KpiCard};
pub use engine::{quote_ident, SqliteQueryEngine};
