//! Data Models
//!
//! Configuration and request/response structures.

pub mod response;
pub mod settings;

pub use response::*;
pub use settings::*;
