//! Shared fixtures and scripted model collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map;

use query_cascade::services::SqliteQueryEngine;
use query_cascade::storage::Database;
use query_cascade::ModelCollaborators;
use query_cascade_core::{
    CheckRequest, CheckVerdict, Classification, CoreError, CoreResult, DatasetSchema, Narrative,
    NarrativeInput, NarrativeRequest, NarrativeSynthesizer, QueryClassifier, QuerySynthesizer,
    ResultChecker, SynthesisRequest,
};
use query_cascade_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig,
};
use query_cascade_pipeline::Collaborators;

// ============================================================================
// Fixtures
// ============================================================================

pub const SALES_TABLE: &str = "data_sales";

pub const SEED_SQL: &str = "CREATE TABLE data_sales (
        order_date TEXT,
        category TEXT,
        revenue REAL,
        units INTEGER
    );
    INSERT INTO data_sales VALUES
        ('2024-01-05', 'Electronics', 120.0, 2),
        ('2024-01-09', 'Electronics', 80.0, 1),
        ('2024-02-11', 'Toys', 35.5, 3),
        ('2024-02-20', 'Toys', 14.5, 1),
        ('2024-03-02', 'Garden', 50.0, 5),
        ('2024-03-15', 'Garden', 10.0, 4);";

pub fn seed(db: &Database) {
    let conn = db.get_connection().expect("connection");
    conn.execute_batch(SEED_SQL).expect("seed sales table");
}

pub fn seeded_memory_db() -> Database {
    let db = Database::new_in_memory().expect("Failed to create in-memory test database");
    seed(&db);
    db
}

pub fn sales_schema(engine: &SqliteQueryEngine) -> DatasetSchema {
    engine
        .profile_table(SALES_TABLE, "sales")
        .expect("profile sales table")
}

// ============================================================================
// Classifier
// ============================================================================

pub struct FixedClassifier {
    category: String,
    delay: Option<Duration>,
}

impl FixedClassifier {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            delay: None,
        }
    }

    pub fn slow(category: &str, delay: Duration) -> Self {
        Self {
            category: category.to_string(),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl QueryClassifier for FixedClassifier {
    async fn classify(
        &self,
        query: &str,
        _schema: Option<&DatasetSchema>,
    ) -> CoreResult<Classification> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Classification {
            category: self.category.clone(),
            intent: Some(query.to_string()),
            entities: Map::new(),
        })
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Hands out queries in order, repeating the last one.
pub struct SequenceSynthesizer {
    queries: Mutex<VecDeque<String>>,
    last: String,
    pub prior_errors: Mutex<Vec<Vec<String>>>,
}

impl SequenceSynthesizer {
    pub fn new(queries: &[&str]) -> Self {
        Self {
            queries: Mutex::new(queries.iter().map(|q| q.to_string()).collect()),
            last: queries.last().map(|q| q.to_string()).unwrap_or_default(),
            prior_errors: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prior_errors.lock().unwrap().len()
    }
}

#[async_trait]
impl QuerySynthesizer for SequenceSynthesizer {
    async fn synthesize_query(&self, request: SynthesisRequest<'_>) -> CoreResult<String> {
        self.prior_errors
            .lock()
            .unwrap()
            .push(request.prior_errors.to_vec());
        let next = self.queries.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.last.clone()))
    }
}

// ============================================================================
// Checker
// ============================================================================

pub struct FixedChecker {
    verdict: Result<CheckVerdict, String>,
}

impl FixedChecker {
    pub fn passing() -> Self {
        Self {
            verdict: Ok(CheckVerdict::pass()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            verdict: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl ResultChecker for FixedChecker {
    async fn check_result(&self, _request: CheckRequest<'_>) -> CoreResult<CheckVerdict> {
        self.verdict.clone().map_err(CoreError::provider)
    }
}

// ============================================================================
// Narrator
// ============================================================================

/// Returns a fixed text and records what kind of input it saw.
pub struct RecordingNarrator {
    text: String,
    pub inputs: Mutex<Vec<String>>,
}

impl RecordingNarrator {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl NarrativeSynthesizer for RecordingNarrator {
    async fn synthesize_narrative(&self, request: NarrativeRequest<'_>) -> CoreResult<Narrative> {
        let seen = match request.input {
            NarrativeInput::Rows { row_count, .. } => format!("rows:{}", row_count),
            NarrativeInput::Profile { schema } => {
                format!("profile:{}", schema.map(|s| s.row_count).unwrap_or(0))
            }
        };
        self.inputs.lock().unwrap().push(seen);
        Ok(Narrative::text(self.text.clone()))
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn models(
    classifier: FixedClassifier,
    synthesizer: Arc<SequenceSynthesizer>,
    checker: FixedChecker,
    narrator: Arc<RecordingNarrator>,
) -> ModelCollaborators {
    ModelCollaborators {
        classifier: Arc::new(classifier),
        synthesizer,
        checker: Arc::new(checker),
        narrator,
        provider: None,
    }
}

pub fn collaborators(engine: &SqliteQueryEngine, models: ModelCollaborators) -> Collaborators {
    let engine = Arc::new(engine.clone());
    Collaborators {
        classifier: models.classifier,
        synthesizer: models.synthesizer,
        validator: engine.clone(),
        executor: engine,
        checker: models.checker,
        narrator: models.narrator,
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Provider that only answers health checks.
pub struct StubProvider {
    config: ProviderConfig,
    reachable: bool,
}

impl StubProvider {
    pub fn new(reachable: bool) -> Self {
        Self {
            config: ProviderConfig {
                base_url: Some("http://localhost:11434/v1".to_string()),
                model: "stub-model".to_string(),
                ..Default::default()
            },
            reachable,
        }
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_message(
        &self,
        _messages: Vec<Message>,
        _system: Option<String>,
        _request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        Err(LlmError::Other {
            message: "stub provider does not answer".to_string(),
        })
    }

    async fn health_check(&self) -> LlmResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(LlmError::NetworkError {
                message: "connection refused".to_string(),
            })
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
