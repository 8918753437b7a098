//! Run Context
//!
//! Per-request control handle passed to the orchestrator alongside the state.
//! Cancellation is observed between stages only; a stage that is already
//! running always finishes and its update is merged.

use tokio_util::sync::CancellationToken;

/// Execution control for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunContext {
    request_id: String,
    cancellation: CancellationToken,
}

impl RunContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use a caller-owned token, e.g. a child of a server shutdown token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Token to cancel this run from elsewhere (timeouts, client disconnect).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
