//! Result Check Stage
//!
//! Judges whether the executed rows plausibly answer the question and turns
//! that judgement into a routing outcome through the [`RetryPolicy`].
//!
//! Structural checks run first and cost nothing: an empty result set, or
//! leading rows that are entirely null. The semantic checker then sees a
//! small sample. The result passes only when both agree; a checker that
//! fails outright counts as a pass so the request can still finish.

use std::sync::Arc;

use async_trait::async_trait;

use query_cascade_core::results::row_is_all_null;
use query_cascade_core::{
    CheckOutcome, CheckRequest, CheckVerdict, RequestState, ResultChecker, Stage, StageKind,
    StateUpdate,
};

use crate::routing::RetryPolicy;

pub const NO_RESULTS_ISSUE: &str = "No results returned";
pub const ALL_NULL_ISSUE: &str = "All values are NULL";

pub struct ResultCheckStage {
    checker: Arc<dyn ResultChecker>,
    policy: RetryPolicy,
    null_scan_rows: usize,
    sample_rows: usize,
}

impl ResultCheckStage {
    pub fn new(
        checker: Arc<dyn ResultChecker>,
        policy: RetryPolicy,
        null_scan_rows: usize,
        sample_rows: usize,
    ) -> Self {
        Self {
            checker,
            policy,
            null_scan_rows,
            sample_rows,
        }
    }

    fn structural_issues(&self, state: &RequestState) -> Vec<String> {
        let mut issues = Vec::new();
        if state.row_count() == 0 {
            issues.push(NO_RESULTS_ISSUE.to_string());
            return issues;
        }

        let scanned = &state.rows()[..state.rows().len().min(self.null_scan_rows)];
        if !scanned.is_empty() && scanned.iter().all(row_is_all_null) {
            issues.push(ALL_NULL_ISSUE.to_string());
        }
        issues
    }
}

#[async_trait]
impl Stage for ResultCheckStage {
    fn kind(&self) -> StageKind {
        StageKind::ResultCheck
    }

    async fn run(&self, state: &RequestState) -> StateUpdate {
        let mut issues = self.structural_issues(state);

        let rows = state.rows();
        let request = CheckRequest {
            query: state.query(),
            query_text: state.query_text(),
            row_count: state.row_count(),
            sample_rows: &rows[..rows.len().min(self.sample_rows)],
        };

        let verdict = match self.checker.check_result(request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("Result checker failed, accepting results: {}", e);
                return StateUpdate::checked(CheckOutcome::Passed)
                    .with_error(format!("Result check error: {}", e.detail()));
            }
        };

        let CheckVerdict {
            valid,
            issues: checker_issues,
        } = verdict;
        let passed = valid && issues.is_empty();
        issues.extend(checker_issues);

        let outcome = self.policy.decide(passed, issues, state.retry_count());
        match &outcome {
            CheckOutcome::Passed => StateUpdate::checked(outcome),
            CheckOutcome::Retry { issues } => {
                tracing::info!(
                    "Result check failed (attempt {} of {}), retrying: {:?}",
                    state.retry_count() + 1,
                    self.policy.max_attempts(),
                    issues
                );
                let error = format!("Result check failed: {}", describe(issues));
                StateUpdate::checked(outcome.clone()).with_error(error)
            }
            CheckOutcome::Accepted { issues } => {
                tracing::warn!(
                    "Retry budget of {} spent, accepting best-effort result: {:?}",
                    self.policy.max_retries(),
                    issues
                );
                let error = format!(
                    "Result check failed after {} attempts; accepting best-effort result: {}",
                    state.retry_count() + 1,
                    describe(issues)
                );
                StateUpdate::checked(outcome.clone()).with_error(error)
            }
        }
    }
}

fn describe(issues: &[String]) -> String {
    if issues.is_empty() {
        "results rejected by checker".to_string()
    } else {
        issues.join("; ")
    }
}
