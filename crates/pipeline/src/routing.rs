//! Routing and Retry Policy
//!
//! The request state machine:
//!
//! ```text
//! Start → Classifying → (Synthesizing → Executing → Checking)* → Narrating → Done
//! ```
//!
//! Transitions read only what the stages wrote into the state: the category
//! after classification and the validation flag after a result check. The
//! decision whether a failed check retries lives in [`RetryPolicy`], which
//! the result-check stage applies when it builds its update.

use serde::{Deserialize, Serialize};

use query_cascade_core::{CheckOutcome, QueryCategory, RequestState, StageKind};

// ============================================================================
// Pipeline Step
// ============================================================================

/// Position in the request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Start,
    Classifying,
    Synthesizing,
    Executing,
    Checking,
    Narrating,
    Done,
}

impl PipelineStep {
    /// The stage that runs in this step, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            PipelineStep::Start | PipelineStep::Done => None,
            PipelineStep::Classifying => Some(StageKind::Classification),
            PipelineStep::Synthesizing => Some(StageKind::Synthesis),
            PipelineStep::Executing => Some(StageKind::Execution),
            PipelineStep::Checking => Some(StageKind::ResultCheck),
            PipelineStep::Narrating => Some(StageKind::Narrative),
        }
    }

    /// The step that follows once this step's update has been merged.
    pub fn next(self, state: &RequestState) -> PipelineStep {
        match self {
            PipelineStep::Start => PipelineStep::Classifying,
            PipelineStep::Classifying => match state.category() {
                Some(QueryCategory::Qa) | Some(QueryCategory::Dashboard) => {
                    PipelineStep::Synthesizing
                }
                Some(QueryCategory::Summarization) => PipelineStep::Narrating,
                // Classification always sets a category; treat a missing one as qa.
                None => PipelineStep::Synthesizing,
            },
            PipelineStep::Synthesizing => PipelineStep::Executing,
            PipelineStep::Executing => PipelineStep::Checking,
            PipelineStep::Checking => {
                if state.validation_passed() {
                    PipelineStep::Narrating
                } else {
                    PipelineStep::Synthesizing
                }
            }
            PipelineStep::Narrating | PipelineStep::Done => PipelineStep::Done,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStep::Done)
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStep::Start => write!(f, "start"),
            PipelineStep::Classifying => write!(f, "classifying"),
            PipelineStep::Synthesizing => write!(f, "synthesizing"),
            PipelineStep::Executing => write!(f, "executing"),
            PipelineStep::Checking => write!(f, "checking"),
            PipelineStep::Narrating => write!(f, "narrating"),
            PipelineStep::Done => write!(f, "done"),
        }
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Bounded retry budget for the synthesize→execute→check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total synthesis attempts the budget allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Turn a check result into an outcome.
    ///
    /// - passed → `Passed`
    /// - failed with budget left (`retry_count < max_retries`) → `Retry`
    /// - failed with the budget spent → `Accepted` (best effort)
    pub fn decide(&self, passed: bool, issues: Vec<String>, retry_count: u32) -> CheckOutcome {
        if passed {
            CheckOutcome::Passed
        } else if retry_count < self.max_retries {
            CheckOutcome::Retry { issues }
        } else {
            CheckOutcome::Accepted { issues }
        }
    }
}
