//! Pipeline Integration Tests
//!
//! Drives the orchestrator against the SQLite engine with scripted model
//! collaborators:
//! - Question answering with fenced query text
//! - Retry after an invalid query, with prior errors fed back
//! - Write statements never reach the database
//! - Summaries from the profiled schema

use std::sync::Arc;

use serde_json::json;

use query_cascade::services::SqliteQueryEngine;
use query_cascade_core::{ChartType, DatasetRef, QueryCategory, RequestState, StageKind};
use query_cascade_pipeline::{Orchestrator, PipelineConfig, PipelineResponse, RunContext};

use crate::support::{
    collaborators, models, sales_schema, seeded_memory_db, FixedChecker, FixedClassifier,
    RecordingNarrator, SequenceSynthesizer, SALES_TABLE,
};

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    engine: SqliteQueryEngine,
    orchestrator: Orchestrator,
    synthesizer: Arc<SequenceSynthesizer>,
    narrator: Arc<RecordingNarrator>,
}

fn harness(category: &str, queries: &[&str], narrative: &str) -> Harness {
    let engine = SqliteQueryEngine::new(seeded_memory_db());
    let synthesizer = Arc::new(SequenceSynthesizer::new(queries));
    let narrator = Arc::new(RecordingNarrator::new(narrative));
    let models = models(
        FixedClassifier::new(category),
        synthesizer.clone(),
        FixedChecker::passing(),
        narrator.clone(),
    );
    let orchestrator =
        Orchestrator::from_collaborators(collaborators(&engine, models), PipelineConfig::default());
    Harness {
        engine,
        orchestrator,
        synthesizer,
        narrator,
    }
}

fn sales_request(harness: &Harness, query: &str) -> RequestState {
    RequestState::new("req-1", query).with_dataset(
        DatasetRef::new("sales", SALES_TABLE),
        Some(sales_schema(&harness.engine)),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_question_answered_from_sqlite() {
    let h = harness(
        "qa",
        &["```sql\nSELECT category, SUM(revenue) AS total FROM data_sales GROUP BY category ORDER BY total DESC\n```"],
        "Electronics leads with 200 in revenue. A bar chart makes the gap obvious.",
    );
    let state = sales_request(&h, "Which category earns the most?");

    let outcome = h
        .orchestrator
        .run_traced(state, &RunContext::new("req-1"))
        .await;
    let state = &outcome.state;

    assert_eq!(state.category(), Some(QueryCategory::Qa));
    assert!(state.errors().is_empty(), "errors: {:?}", state.errors());
    assert_eq!(state.retry_count(), 0);
    assert_eq!(
        state.query_text(),
        Some("SELECT category, SUM(revenue) AS total FROM data_sales GROUP BY category ORDER BY total DESC")
    );
    assert_eq!(state.row_count(), 3);
    assert_eq!(state.rows()[0]["category"], json!("Electronics"));
    assert_eq!(state.rows()[0]["total"], json!(200.0));
    assert_eq!(state.rows()[2]["category"], json!("Toys"));

    assert_eq!(h.narrator.seen(), vec!["rows:3".to_string()]);
    assert_eq!(state.visualizations().len(), 1);
    let chart = &state.visualizations()[0];
    assert_eq!(chart.chart_type, ChartType::Bar);
    assert_eq!(chart.x_axis, "category");
    assert_eq!(chart.y_axis, "total");

    assert_eq!(outcome.runs_of(StageKind::Synthesis), 1);
    assert_eq!(outcome.runs_of(StageKind::Narrative), 1);
}

#[tokio::test]
async fn test_invalid_column_is_retried_with_error_context() {
    let h = harness(
        "qa",
        &[
            "SELECT revenu FROM data_sales",
            "SELECT category, revenue FROM data_sales ORDER BY revenue DESC LIMIT 2",
        ],
        "The two largest orders were both Electronics.",
    );
    let state = sales_request(&h, "Show the biggest orders");

    let outcome = h
        .orchestrator
        .run_traced(state, &RunContext::new("req-1"))
        .await;
    let state = &outcome.state;

    assert_eq!(h.synthesizer.calls(), 2);
    let prior = h.synthesizer.prior_errors.lock().unwrap().clone();
    assert!(prior[0].is_empty());
    assert!(prior[1].iter().any(|e| e.starts_with("Invalid query:") && e.contains("revenu")));

    assert_eq!(state.retry_count(), 1);
    assert!(state.validation_passed());
    assert_eq!(state.row_count(), 2);
    assert_eq!(state.final_message(), Some("The two largest orders were both Electronics."));

    let response = PipelineResponse::from_terminal(state, h.orchestrator.config());
    let data = response.data.expect("rows attached");
    assert_eq!(data.count, 2);
    assert_eq!(data.query_attempts.map(|a| a.len()), Some(2));
}

#[tokio::test]
async fn test_write_statements_never_run() {
    let h = harness("qa", &["DELETE FROM data_sales"], "Nothing to report.");
    let state = sales_request(&h, "Clear the sales table");

    let outcome = h
        .orchestrator
        .run_traced(state, &RunContext::new("req-1"))
        .await;
    let state = &outcome.state;

    // Two retries, then the best effort is accepted
    assert_eq!(outcome.runs_of(StageKind::Synthesis), 3);
    assert_eq!(state.retry_count(), 2);
    assert!(state.validation_passed());
    assert!(state
        .errors()
        .iter()
        .any(|e| e == "Invalid query: Only read-only queries are allowed"));
    assert!(state.rows().is_empty());

    let rows = h.engine.execute_sql("SELECT COUNT(*) AS n FROM data_sales").unwrap();
    assert_eq!(rows[0]["n"], json!(6));

    let response = PipelineResponse::from_terminal(state, h.orchestrator.config());
    assert!(response.data.is_none());
    assert_eq!(response.message, "Nothing to report.");
}

#[tokio::test]
async fn test_summary_uses_profile_without_querying() {
    let h = harness("summarization", &["SELECT 1"], "Six orders across three categories.");
    let state = sales_request(&h, "Give me an overview of this dataset");

    let outcome = h
        .orchestrator
        .run_traced(state, &RunContext::new("req-1"))
        .await;

    assert_eq!(outcome.state.category(), Some(QueryCategory::Summarization));
    assert_eq!(h.synthesizer.calls(), 0);
    assert_eq!(outcome.runs_of(StageKind::Execution), 0);
    assert_eq!(h.narrator.seen(), vec!["profile:6".to_string()]);
    assert!(outcome.state.visualizations().is_empty());
}

#[tokio::test]
async fn test_question_without_dataset_degrades() {
    let h = harness("qa", &["SELECT 1"], "I need a dataset to answer that.");
    let state = RequestState::new("req-1", "What were sales last month?");

    let outcome = h
        .orchestrator
        .run_traced(state, &RunContext::new("req-1"))
        .await;
    let state = &outcome.state;

    assert_eq!(h.synthesizer.calls(), 0);
    assert!(state
        .errors()
        .iter()
        .any(|e| e.contains("No dataset bound to this request")));
    assert!(state.final_message().is_some());
}
