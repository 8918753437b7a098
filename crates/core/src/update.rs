//! Partial State Updates
//!
//! A stage never mutates the request state directly. It returns a
//! `StateUpdate`: exactly one stage-specific `StageChange` (the overwrite
//! fields that stage owns) plus a list of error strings that are *appended*
//! to the request's error history. `RequestState::apply` is the only merge.
//!
//! Keeping the append-only data (`errors`, and the query text history that
//! the merge derives from `StageChange::Synthesized`) out of the overwrite
//! payloads means no stage can accidentally truncate the failure history.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::results::{ChartSuggestion, Row};
use crate::state::QueryCategory;

/// Outcome of a result check, as decided by the retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Results look plausible; continue to the narrative.
    Passed,
    /// Results were rejected and budget remains: synthesize again.
    /// Merging this outcome increments the retry counter by one.
    Retry { issues: Vec<String> },
    /// Results were rejected but the retry budget is spent; the best-effort
    /// result is accepted. `issues` are kept for diagnostics only, the
    /// state's validation issues are cleared.
    Accepted { issues: Vec<String> },
}

impl CheckOutcome {
    /// Whether the pipeline moves on to the narrative after this outcome.
    pub fn proceeds(&self) -> bool {
        !matches!(self, CheckOutcome::Retry { .. })
    }
}

/// The overwrite fields a single stage sets.
#[derive(Debug, Clone, PartialEq)]
pub enum StageChange {
    /// Nothing to overwrite (errors only)
    None,
    /// Classification result. Accepted only once per request.
    Classified {
        category: QueryCategory,
        intent: String,
        entities: Map<String, Value>,
    },
    /// A synthesis attempt. `query_text` is `None` when no text was produced
    /// (no dataset bound, synthesizer failure): the current text is cleared
    /// and an empty history entry keeps one entry per attempt. Otherwise it
    /// replaces the current query text and is appended to the history.
    Synthesized {
        query_text: Option<String>,
        valid: bool,
    },
    /// An execution run. Replaces the row set; the row count is derived.
    Executed { rows: Vec<Row> },
    /// A result check.
    Checked(CheckOutcome),
    /// The terminal answer.
    Narrated {
        message: String,
        visualizations: Vec<ChartSuggestion>,
    },
}

/// A stage's partial update: overwrite fields plus appended errors.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub change: StageChange,
    pub errors: Vec<String>,
}

impl StateUpdate {
    pub fn new(change: StageChange) -> Self {
        Self {
            change,
            errors: Vec::new(),
        }
    }

    /// An update that only records errors.
    pub fn none() -> Self {
        Self::new(StageChange::None)
    }

    pub fn classified(
        category: QueryCategory,
        intent: impl Into<String>,
        entities: Map<String, Value>,
    ) -> Self {
        Self::new(StageChange::Classified {
            category,
            intent: intent.into(),
            entities,
        })
    }

    /// A synthesis attempt that produced text.
    ///
    /// Text that is empty after trimming is never reported valid.
    pub fn synthesized(query_text: impl Into<String>, valid: bool) -> Self {
        let query_text = query_text.into();
        let valid = valid && !query_text.trim().is_empty();
        Self::new(StageChange::Synthesized {
            query_text: Some(query_text),
            valid,
        })
    }

    /// A synthesis attempt that produced no text.
    pub fn synthesis_skipped() -> Self {
        Self::new(StageChange::Synthesized {
            query_text: None,
            valid: false,
        })
    }

    pub fn executed(rows: Vec<Row>) -> Self {
        Self::new(StageChange::Executed { rows })
    }

    pub fn checked(outcome: CheckOutcome) -> Self {
        Self::new(StageChange::Checked(outcome))
    }

    pub fn narrated(message: impl Into<String>, visualizations: Vec<ChartSuggestion>) -> Self {
        Self::new(StageChange::Narrated {
            message: message.into(),
            visualizations,
        })
    }

    /// Append an error entry to this update.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Whether the stage reported any failure.
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}
