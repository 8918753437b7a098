//! Chat Service
//!
//! Turns a chat request into an initialized request state, runs the
//! orchestrator under the request timeout and assembles the response.
//!
//! Dataset resolution happens before the pipeline starts: an unknown
//! dataset id fails the request with `AppError::NotFound` instead of
//! producing a degraded answer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use query_cascade_core::{DatasetRef, DatasetSchema, RequestState};
use query_cascade_pipeline::{Orchestrator, PipelineOutcome, PipelineResponse, RunContext};

use crate::models::response::{ChatRequest, ChatResponse};
use crate::storage::cache::ResultCache;
use crate::storage::metadata::MetadataStore;
use crate::utils::error::{AppError, AppResult};

/// Table name for a dataset whose stored schema does not name one
pub fn default_table_name(dataset_id: &str) -> String {
    format!("data_{}", dataset_id)
}

/// Entry point for answering questions
#[derive(Clone)]
pub struct ChatService {
    orchestrator: Orchestrator,
    metadata: Arc<dyn MetadataStore>,
    cache: ResultCache,
    request_timeout: Duration,
}

impl ChatService {
    pub fn new(
        orchestrator: Orchestrator,
        metadata: Arc<dyn MetadataStore>,
        cache: ResultCache,
        request_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            metadata,
            cache,
            request_timeout,
        }
    }

    /// Look up a dataset's schema, cache first.
    pub fn resolve_schema(&self, dataset_id: &str) -> AppResult<DatasetSchema> {
        if let Some(schema) = self.cache.get_schema(dataset_id) {
            return Ok(schema);
        }

        let schema = self
            .metadata
            .get_schema(dataset_id)?
            .ok_or_else(|| AppError::not_found(format!("Dataset not found: {}", dataset_id)))?;
        self.cache.put_schema(&schema);
        Ok(schema)
    }

    /// Build the initial request state for a chat request.
    pub fn build_state(&self, request: &ChatRequest, request_id: &str) -> AppResult<RequestState> {
        let query = request.message.trim();
        if query.is_empty() {
            return Err(AppError::validation("Message must not be empty"));
        }

        let state = RequestState::new(request_id, query);
        match request.dataset_id.as_deref() {
            Some(dataset_id) => {
                let schema = self.resolve_schema(dataset_id)?;
                let table_name = if schema.table_name.trim().is_empty() {
                    default_table_name(dataset_id)
                } else {
                    schema.table_name.clone()
                };
                Ok(state.with_dataset(DatasetRef::new(dataset_id, table_name), Some(schema)))
            }
            None => Ok(state),
        }
    }

    /// Answer a chat request.
    pub async fn chat(&self, request: ChatRequest) -> AppResult<ChatResponse> {
        self.chat_with_cancellation(request, CancellationToken::new()).await
    }

    /// Answer a chat request, also stopping when `parent` is cancelled.
    pub async fn chat_with_cancellation(
        &self,
        request: ChatRequest,
        parent: CancellationToken,
    ) -> AppResult<ChatResponse> {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let state = self.build_state(&request, &request_id)?;
        let ctx = RunContext::new(request_id.clone()).with_cancellation(parent.child_token());

        let outcome = self.run_with_timeout(state, ctx).await?;
        let response = PipelineResponse::from_terminal(&outcome.state, self.orchestrator.config());
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Request {} answered in {}ms ({} stage runs, {} errors)",
            request_id,
            elapsed_ms,
            outcome.trace.len(),
            response.errors.len()
        );
        Ok(ChatResponse::from_pipeline(response, conversation_id, elapsed_ms))
    }

    /// Run the orchestrator, cancelling it when the request budget runs out.
    ///
    /// The stage in flight at the deadline still finishes; the orchestrator
    /// stops at the next stage boundary and produces a terminal state.
    async fn run_with_timeout(
        &self,
        state: RequestState,
        ctx: RunContext,
    ) -> AppResult<PipelineOutcome> {
        let token = ctx.cancellation_token();
        let orchestrator = self.orchestrator.clone();
        let mut handle = tokio::spawn(async move { orchestrator.run_traced(state, &ctx).await });

        match tokio::time::timeout(self.request_timeout, &mut handle).await {
            Ok(joined) => joined.map_err(task_failed),
            Err(_) => {
                tracing::warn!(
                    "Request exceeded {}s; cancelling at the next stage boundary",
                    self.request_timeout.as_secs()
                );
                token.cancel();
                handle.await.map_err(task_failed)
            }
        }
    }
}

fn task_failed(e: tokio::task::JoinError) -> AppError {
    AppError::internal(format!("Pipeline task failed: {}", e))
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("cache", &self.cache)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
