//! Stage Contract
//!
//! Every processing step implements [`Stage`]: read a snapshot of the request
//! state, return a partial update. `run` is total. A stage that hits a
//! failure reports it inside the update (`errors` plus safe defaults) instead
//! of returning an error, so the orchestrator never has a fault to catch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::RequestState;
use crate::update::StateUpdate;

/// Identifies a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Classification,
    Synthesis,
    Execution,
    ResultCheck,
    Narrative,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Classification => write!(f, "classification"),
            StageKind::Synthesis => write!(f, "synthesis"),
            StageKind::Execution => write!(f, "execution"),
            StageKind::ResultCheck => write!(f, "result_check"),
            StageKind::Narrative => write!(f, "narrative"),
        }
    }
}

/// A single pipeline step.
///
/// Implementations must not keep a reference to the state after returning
/// and must never leave it contradictory (for example a valid query flag
/// without query text).
#[async_trait]
pub trait Stage: Send + Sync {
    /// Which step this is.
    fn kind(&self) -> StageKind;

    /// Compute the partial update for the current state.
    async fn run(&self, state: &RequestState) -> StateUpdate;
}
