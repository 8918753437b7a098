//! Application Wiring Integration Tests
//!
//! Uses a file-backed SQLite database in a temporary directory:
//! - Registering a table as a dataset and listing it
//! - Re-registration refreshing the cached schema
//! - Dashboards generated, cached and refreshed
//! - Health reporting, with and without contacting the provider
//! - Config files created, updated and re-read

use std::sync::Arc;

use tempfile::TempDir;

use query_cascade::storage::{apply_env_overrides, ConfigService, Database};
use query_cascade::{AppConfig, AppError, AppState, ChatRequest, SettingsUpdate};

use query_cascade_core::ChartType;

use crate::support::{
    models, seed, FixedChecker, FixedClassifier, RecordingNarrator, SequenceSynthesizer,
    StubProvider, SALES_TABLE,
};

// ============================================================================
// Helpers
// ============================================================================

fn create_state() -> (TempDir, AppState) {
    create_state_with(None)
}

fn create_state_with(provider: Option<StubProvider>) -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("query-cascade.db")).unwrap();
    seed(&db);

    let models = models(
        FixedClassifier::new("qa"),
        Arc::new(SequenceSynthesizer::new(&["SELECT COUNT(*) AS orders FROM data_sales"])),
        FixedChecker::passing(),
        Arc::new(RecordingNarrator::new("There are orders.")),
    );
    let models = match provider {
        Some(provider) => models.with_provider(Arc::new(provider)),
        None => models,
    };
    let state = AppState::build(AppConfig::default(), db, models);
    (dir, state)
}

// ============================================================================
// Datasets
// ============================================================================

#[tokio::test]
async fn test_register_list_and_ask() {
    let (_dir, state) = create_state();

    let schema = state.register_table(SALES_TABLE, "sales").unwrap();
    assert_eq!(schema.row_count, 6);
    assert_eq!(schema.table_name, SALES_TABLE);
    assert!(schema.date_columns.contains(&"order_date".to_string()));
    assert!(schema.numerical_columns.contains(&"revenue".to_string()));

    let datasets = state.list_datasets().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].dataset_id, "sales");
    assert_eq!(datasets[0].table_name, SALES_TABLE);
    assert_eq!(datasets[0].row_count, 6);

    let response = state
        .chat()
        .chat(ChatRequest::new("How many orders?").with_dataset("sales"))
        .await
        .unwrap();
    let data = response.data.expect("rows attached");
    assert_eq!(data.results[0]["orders"], serde_json::json!(6));
}

#[test]
fn test_reregistering_refreshes_cached_schema() {
    let (_dir, state) = create_state();
    state.register_table(SALES_TABLE, "sales").unwrap();
    assert_eq!(state.chat().resolve_schema("sales").unwrap().row_count, 6);

    {
        let conn = state.database().get_connection().unwrap();
        conn.execute(
            "INSERT INTO data_sales VALUES ('2024-04-01', 'Toys', 22.0, 2)",
            [],
        )
        .unwrap();
    }
    state.register_table(SALES_TABLE, "sales").unwrap();

    assert_eq!(state.chat().resolve_schema("sales").unwrap().row_count, 7);
}

#[test]
fn test_register_missing_table() {
    let (_dir, state) = create_state();
    let err = state.register_table("data_nope", "nope").unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(state.list_datasets().unwrap().is_empty());
}

// ============================================================================
// Dashboards
// ============================================================================

fn add_sales(state: &AppState, rows: &str) {
    let conn = state.database().get_connection().unwrap();
    conn.execute_batch(&format!("INSERT INTO data_sales VALUES {};", rows))
        .unwrap();
}

#[test]
fn test_dashboard_generated_and_cached() {
    let (_dir, state) = create_state();
    // Eight rows over three categories makes `category` categorical
    add_sales(
        &state,
        "('2024-01-05', 'Toys', 30.0, 1), ('2024-03-15', 'Electronics', 60.0, 2)",
    );
    state.register_table(SALES_TABLE, "sales").unwrap();

    let dashboard = state.dashboard("sales", false).unwrap();
    assert_eq!(dashboard.dataset_id, "sales");
    assert_eq!(dashboard.kpis[0].title, "Total Records");
    assert_eq!(dashboard.kpis[0].value, serde_json::json!(8));
    assert!(dashboard.kpis.iter().any(|k| k.title == "Unique category"));
    let types: Vec<ChartType> = dashboard.charts.iter().map(|c| c.chart_type).collect();
    assert_eq!(types, vec![ChartType::Bar, ChartType::Line, ChartType::Table]);
    assert_eq!(dashboard.charts[0].data[0]["category"], "Electronics");

    // Served from the cache until refreshed
    add_sales(&state, "('2024-04-01', 'Garden', 500.0, 9)");
    let cached = state.dashboard("sales", false).unwrap();
    assert_eq!(cached, dashboard);

    let refreshed = state.dashboard("sales", true).unwrap();
    assert_ne!(refreshed.charts[0].data, dashboard.charts[0].data);
    assert_eq!(refreshed.charts[0].data[0]["category"], "Garden");
}

#[test]
fn test_reregistering_drops_cached_dashboard() {
    let (_dir, state) = create_state();
    state.register_table(SALES_TABLE, "sales").unwrap();
    let first = state.dashboard("sales", false).unwrap();
    assert_eq!(first.kpis[0].value, serde_json::json!(6));

    add_sales(&state, "('2024-04-01', 'Toys', 22.0, 2)");
    state.register_table(SALES_TABLE, "sales").unwrap();

    let second = state.dashboard("sales", false).unwrap();
    assert_eq!(second.kpis[0].value, serde_json::json!(7));
}

#[test]
fn test_dashboard_unknown_dataset() {
    let (_dir, state) = create_state();
    let err = state.dashboard("missing", false).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (_dir, state) = create_state();
    let health = state.health(false).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.service, "query-cascade");
    assert!(health.database);
    assert!(health.config);
    assert!(health.llm.is_none());
    assert!(health.llm_model.is_none());
}

#[tokio::test]
async fn test_health_reports_provider() {
    let (_dir, state) = create_state_with(Some(StubProvider::new(true)));

    let health = state.health(false).await;
    assert_eq!(health.llm_model.as_deref(), Some("stub-model"));
    assert_eq!(
        health.llm_endpoint.as_deref(),
        Some("http://localhost:11434/v1")
    );
    assert!(health.llm.is_none());

    let health = state.health(true).await;
    assert_eq!(health.llm, Some(true));
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn test_health_degraded_when_provider_unreachable() {
    let (_dir, state) = create_state_with(Some(StubProvider::new(false)));

    let health = state.health(true).await;
    assert_eq!(health.llm, Some(false));
    assert_eq!(health.status, "degraded");
    assert!(health.database);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut service = ConfigService::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(service.get_config(), &AppConfig::default());

    service
        .update_config(SettingsUpdate {
            model: Some("llama3.1".to_string()),
            base_url: Some("http://localhost:11434/v1".to_string()),
            max_retries: Some(1),
            ..Default::default()
        })
        .unwrap();

    let reopened = ConfigService::open(&path).unwrap();
    assert_eq!(reopened.get_config().llm.model, "llama3.1");
    assert_eq!(reopened.get_config().pipeline.max_retries, 1);
}

#[test]
fn test_invalid_update_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut service = ConfigService::open(&path).unwrap();

    let result = service.update_config(SettingsUpdate {
        log_level: Some("loud".to_string()),
        ..Default::default()
    });
    assert!(result.is_err());
    assert_eq!(service.get_config().log_level, "info");

    let reopened = ConfigService::open(&path).unwrap();
    assert_eq!(reopened.get_config().log_level, "info");
}

#[test]
fn test_env_overrides() {
    let config = apply_env_overrides(AppConfig::default(), |key| match key {
        "QUERY_CASCADE_MODEL" => Some("gpt-4o".to_string()),
        "QUERY_CASCADE_LOG_LEVEL" => Some("  ".to_string()),
        _ => None,
    });
    assert_eq!(config.llm.model, "gpt-4o");
    assert_eq!(config.log_level, "info");
}
