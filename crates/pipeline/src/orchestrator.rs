//! Pipeline Orchestrator
//!
//! Drives one [`RequestState`] through the state machine in [`routing`]:
//!
//! ```text
//! Start → Classifying → (Synthesizing → Executing → Checking)* → Narrating → Done
//! ```
//!
//! The orchestrator only sequences stages and merges their updates. Every
//! decision (category, validity, retry) is something a stage wrote into the
//! state; the transitions just read it back.
//!
//! A run always reaches `Done` with a non-empty final message. Cancellation
//! is checked between stages, and two guards bound the retry loop even when
//! a custom stage ignores the retry policy.
//!
//! [`routing`]: crate::routing

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use query_cascade_core::{CheckOutcome, RequestState, StageChange, StageKind, StateUpdate};

use crate::config::PipelineConfig;
use crate::context::RunContext;
use crate::response::terminal_message;
use crate::routing::PipelineStep;
use crate::stages::{Collaborators, StageSet};

// ============================================================================
// Trace
// ============================================================================

/// One stage run as observed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    /// Which stage ran
    pub stage: StageKind,
    /// Synthesis attempt the run belonged to (1-based)
    pub attempt: u32,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Error entries the run appended
    pub errors_added: Vec<String>,
    /// When the run started
    pub started_at: DateTime<Utc>,
}

/// Terminal state plus what happened on the way there.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: RequestState,
    /// Stage runs in execution order
    pub trace: Vec<StageRecord>,
    /// Visited steps, from `Start` to `Done`
    pub steps: Vec<PipelineStep>,
}

impl PipelineOutcome {
    /// How many times a given stage ran.
    pub fn runs_of(&self, stage: StageKind) -> usize {
        self.trace.iter().filter(|r| r.stage == stage).count()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.trace.iter().map(|r| r.duration_ms).sum()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Sequences the stages for a request.
///
/// Holds no per-request data, so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct Orchestrator {
    stages: StageSet,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(stages: StageSet, config: PipelineConfig) -> Self {
        Self { stages, config }
    }

    /// Build the standard stages around a set of collaborators.
    pub fn from_collaborators(collaborators: Collaborators, config: PipelineConfig) -> Self {
        let stages = StageSet::from_collaborators(collaborators, &config);
        Self::new(stages, config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a request to its terminal state.
    pub async fn run(&self, state: RequestState, ctx: &RunContext) -> RequestState {
        self.run_traced(state, ctx).await.state
    }

    /// Run a request and keep the per-stage trace.
    pub async fn run_traced(&self, state: RequestState, ctx: &RunContext) -> PipelineOutcome {
        let span = tracing::info_span!(
            "pipeline",
            request_id = %ctx.request_id(),
            category = tracing::field::Empty
        );
        self.drive(state, ctx, span.clone()).instrument(span).await
    }

    async fn drive(
        &self,
        mut state: RequestState,
        ctx: &RunContext,
        span: tracing::Span,
    ) -> PipelineOutcome {
        let ceiling = self.config.stage_run_ceiling();
        let mut step = PipelineStep::Start;
        let mut steps = vec![step];
        let mut trace = Vec::new();
        let mut query_runs = 0usize;

        loop {
            let mut next = step.next(&state);

            let query_step = next.stage().is_some() && next != PipelineStep::Narrating;
            if query_step && query_runs >= ceiling {
                tracing::warn!("Stage run limit of {} reached, skipping to narrative", ceiling);
                state.record_error(format!(
                    "Stage run limit of {} reached; proceeding to narrative",
                    ceiling
                ));
                next = PipelineStep::Narrating;
            }

            if let Some(kind) = next.stage() {
                if ctx.is_cancelled() {
                    tracing::info!("Request cancelled before {} stage", kind);
                    state.record_error(format!("Request cancelled before {} stage", kind));
                    next = PipelineStep::Done;
                }
            }

            step = next;
            steps.push(step);
            let Some(kind) = step.stage() else {
                break;
            };

            let attempt = state.retry_count() + 1;
            let started_at = Utc::now();
            let timer = Instant::now();
            tracing::debug!("Running {} stage (attempt {})", kind, attempt);

            let update = self.stages.get(kind).run(&state).await;
            let update = self.enforce_retry_budget(&state, update);
            let errors_added = update.errors.clone();
            state.apply(update);

            if !errors_added.is_empty() {
                tracing::warn!("{} stage degraded: {:?}", kind, errors_added);
            }
            if kind == StageKind::Classification {
                if let Some(category) = state.category() {
                    span.record("category", tracing::field::display(category));
                }
            }
            if kind != StageKind::Narrative {
                query_runs += 1;
            }

            trace.push(StageRecord {
                stage: kind,
                attempt,
                duration_ms: timer.elapsed().as_millis() as u64,
                errors_added,
                started_at,
            });
        }

        state.ensure_final_message(terminal_message);

        let outcome = PipelineOutcome {
            state,
            trace,
            steps,
        };
        tracing::info!(
            "Pipeline finished: {} stage runs, {} retries, {} errors, {}ms",
            outcome.trace.len(),
            outcome.state.retry_count(),
            outcome.state.errors().len(),
            outcome.total_duration_ms()
        );
        outcome
    }

    /// A retry request that arrives with the budget spent is merged as a
    /// forced acceptance instead.
    fn enforce_retry_budget(&self, state: &RequestState, update: StateUpdate) -> StateUpdate {
        match update.change {
            StageChange::Checked(CheckOutcome::Retry { issues })
                if state.retry_count() >= self.config.max_retries =>
            {
                let mut errors = update.errors;
                errors.push(format!(
                    "Retry budget of {} exhausted; accepting best-effort result",
                    self.config.max_retries
                ));
                StateUpdate {
                    change: StageChange::Checked(CheckOutcome::Accepted { issues }),
                    errors,
                }
            }
            change => StateUpdate {
                change,
                errors: update.errors,
            },
        }
    }
}
