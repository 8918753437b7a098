//! Execution Stage
//!
//! Runs the current query text when the synthesis stage marked it valid.
//! Every outcome replaces the row set, so rows from an earlier attempt never
//! leak into a later check.

use std::sync::Arc;

use async_trait::async_trait;

use query_cascade_core::{QueryExecutor, RequestState, Stage, StageKind, StateUpdate};

pub struct ExecutionStage {
    executor: Arc<dyn QueryExecutor>,
}

impl ExecutionStage {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Stage for ExecutionStage {
    fn kind(&self) -> StageKind {
        StageKind::Execution
    }

    async fn run(&self, state: &RequestState) -> StateUpdate {
        let query_text = match state.query_text() {
            Some(text) if state.query_valid() => text,
            _ => {
                return StateUpdate::executed(Vec::new()).with_error("No valid query to execute");
            }
        };

        match self.executor.execute_query(query_text).await {
            Ok(rows) => {
                tracing::debug!("Query returned {} rows", rows.len());
                StateUpdate::executed(rows)
            }
            Err(e) => {
                tracing::warn!("Query execution failed: {}", e);
                StateUpdate::executed(Vec::new())
                    .with_error(format!("Query execution error: {}", e.detail()))
            }
        }
    }
}
