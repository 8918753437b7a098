//! HTTP Client Factory
//!
//! Builds the reqwest client shared by HTTP-backed providers.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// Build a `reqwest::Client` with a whole-request timeout.
///
/// Proxy settings come from the standard environment variables
/// (`HTTPS_PROXY`, `NO_PROXY`), which reqwest honours by default.
pub fn build_http_client(timeout_secs: u64) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::Other {
            message: format!("Failed to build HTTP client: {}", e),
        })
}
