//! Chat Service Integration Tests
//!
//! Tests the request-level behavior around the pipeline:
//! - Dataset resolution through the metadata store and cache
//! - Request validation
//! - Timeouts and caller cancellation stopping at stage boundaries
//! - Response assembly

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use query_cascade::services::{ChatService, SqliteQueryEngine};
use query_cascade::storage::{MetadataStore, ResultCache, SqliteMetadataStore};
use query_cascade::{AppError, ChatRequest};
use query_cascade_core::QueryCategory;
use query_cascade_pipeline::{Orchestrator, PipelineConfig};

use crate::support::{
    collaborators, models, sales_schema, seeded_memory_db, FixedChecker, FixedClassifier,
    RecordingNarrator, SequenceSynthesizer,
};

// ============================================================================
// Helpers
// ============================================================================

const TOP_CATEGORIES: &str =
    "SELECT category, SUM(revenue) AS total FROM data_sales GROUP BY category ORDER BY total DESC";

struct Setup {
    service: ChatService,
    store: Arc<SqliteMetadataStore>,
    synthesizer: Arc<SequenceSynthesizer>,
}

fn setup(classifier: FixedClassifier, cache: ResultCache, timeout: Duration) -> Setup {
    let db = seeded_memory_db();
    let engine = SqliteQueryEngine::new(db.clone());
    let store = Arc::new(SqliteMetadataStore::new(db));
    store.put_schema(&sales_schema(&engine)).unwrap();

    let synthesizer = Arc::new(SequenceSynthesizer::new(&[TOP_CATEGORIES]));
    let models = models(
        classifier,
        synthesizer.clone(),
        FixedChecker::passing(),
        Arc::new(RecordingNarrator::new("Electronics leads the pack.")),
    );
    let orchestrator =
        Orchestrator::from_collaborators(collaborators(&engine, models), PipelineConfig::default());
    let service = ChatService::new(orchestrator, store.clone(), cache, timeout);

    Setup {
        service,
        store,
        synthesizer,
    }
}

fn default_setup() -> Setup {
    setup(
        FixedClassifier::new("qa"),
        ResultCache::new(true, 60, 100),
        Duration::from_secs(30),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_chat_answers_question() {
    let s = default_setup();
    let request = ChatRequest {
        conversation_id: Some("conv-7".to_string()),
        ..ChatRequest::new("  Which category earns the most?  ").with_dataset("sales")
    };

    let response = s.service.chat(request).await.unwrap();

    assert_eq!(response.message, "Electronics leads the pack.");
    assert_eq!(response.conversation_id, "conv-7");
    assert_eq!(response.category, Some(QueryCategory::Qa));
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    let data = response.data.expect("rows attached");
    assert_eq!(data.count, 3);
    assert_eq!(data.query_text.as_deref(), Some(TOP_CATEGORIES));
    assert!(data.query_attempts.is_none());
}

#[tokio::test]
async fn test_conversation_id_generated_when_missing() {
    let s = default_setup();
    let response = s
        .service
        .chat(ChatRequest::new("top categories").with_dataset("sales"))
        .await
        .unwrap();
    assert!(!response.conversation_id.is_empty());
}

#[tokio::test]
async fn test_blank_message_rejected() {
    let s = default_setup();
    let err = s.service.chat(ChatRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(s.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_unknown_dataset_is_not_found() {
    let s = default_setup();
    let err = s
        .service
        .chat(ChatRequest::new("top categories").with_dataset("missing"))
        .await
        .unwrap_err();
    match err {
        AppError::NotFound(message) => assert_eq!(message, "Dataset not found: missing"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_schema_served_from_cache() {
    let s = default_setup();
    let first = s.service.resolve_schema("sales").unwrap();

    assert!(s.store.delete_schema("sales").unwrap());
    let second = s.service.resolve_schema("sales").unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_disabled_cache_reads_store_every_time() {
    let s = setup(
        FixedClassifier::new("qa"),
        ResultCache::disabled(),
        Duration::from_secs(30),
    );
    s.service.resolve_schema("sales").unwrap();

    s.store.delete_schema("sales").unwrap();
    let err = s.service.resolve_schema("sales").unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_timeout_stops_at_next_stage_boundary() {
    let s = setup(
        FixedClassifier::slow("qa", Duration::from_millis(300)),
        ResultCache::disabled(),
        Duration::from_millis(50),
    );

    let response = s
        .service
        .chat(ChatRequest::new("top categories").with_dataset("sales"))
        .await
        .unwrap();

    // Classification finishes; nothing after it runs
    assert_eq!(response.category, Some(QueryCategory::Qa));
    assert_eq!(s.synthesizer.calls(), 0);
    assert!(response.data.is_none());
    assert!(response
        .errors
        .iter()
        .any(|e| e == "Request cancelled before synthesis stage"));
    assert!(response.message.starts_with("I encountered some issues:"));
}

#[tokio::test]
async fn test_caller_cancellation_before_start() {
    let s = default_setup();
    let token = CancellationToken::new();
    token.cancel();

    let response = s
        .service
        .chat_with_cancellation(ChatRequest::new("top categories").with_dataset("sales"), token)
        .await
        .unwrap();

    assert!(response.category.is_none());
    assert_eq!(
        response.errors,
        vec!["Request cancelled before classification stage".to_string()]
    );
}
