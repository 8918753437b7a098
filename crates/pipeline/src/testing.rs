//! Scripted collaborator fakes shared by the stage and orchestrator tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use query_cascade_core::{
    CheckRequest, CheckVerdict, Classification, CoreError, CoreResult, DatasetRef, DatasetSchema,
    Narrative, NarrativeInput, NarrativeRequest, NarrativeSynthesizer, QueryClassifier,
    QueryExecutor, QuerySynthesizer, QueryValidation, QueryValidator, RequestState, ResultChecker,
    Row, SynthesisRequest,
};

use crate::stages::Collaborators;

pub fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

pub fn revenue_rows() -> Vec<Row> {
    rows(vec![
        json!({"category": "Electronics", "revenue": 52000.0}),
        json!({"category": "Toys", "revenue": 31000.5}),
        json!({"category": "Garden", "revenue": 18000.0}),
    ])
}

pub fn sales_schema() -> DatasetSchema {
    let mut schema = DatasetSchema {
        dataset_id: "sales".to_string(),
        filename: "sales.csv".to_string(),
        table_name: "data_sales".to_string(),
        row_count: 1000,
        column_count: 2,
        columns: vec!["category".to_string(), "revenue".to_string()],
        categorical_columns: vec!["category".to_string()],
        numerical_columns: vec!["revenue".to_string()],
        ..Default::default()
    };
    schema
        .column_types
        .insert("category".to_string(), "TEXT".to_string());
    schema
        .column_types
        .insert("revenue".to_string(), "REAL".to_string());
    schema
}

pub fn sales_state(query: &str) -> RequestState {
    RequestState::new("req-test", query).with_dataset(
        DatasetRef::new("sales", "data_sales"),
        Some(sales_schema()),
    )
}

fn to_result<T: Clone>(scripted: &Result<T, String>) -> CoreResult<T> {
    scripted.clone().map_err(CoreError::provider)
}

// ============================================================================
// Classifier
// ============================================================================

pub struct ScriptedClassifier {
    result: Result<Classification, String>,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn label(category: &str) -> Self {
        Self {
            result: Ok(Classification {
                category: category.to_string(),
                intent: Some(format!("{} intent", category)),
                entities: Default::default(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueryClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _query: &str,
        _schema: Option<&DatasetSchema>,
    ) -> CoreResult<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        to_result(&self.result)
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Returns scripted responses in order, then repeats the last one.
pub struct ScriptedSynthesizer {
    responses: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Result<String, String>>,
    pub calls: AtomicUsize,
    pub prior_errors_seen: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSynthesizer {
    pub fn sequence(responses: Vec<Result<&str, &str>>) -> Self {
        let responses: VecDeque<Result<String, String>> = responses
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        let last = responses
            .back()
            .cloned()
            .unwrap_or_else(|| Err("no scripted response".to_string()));
        Self {
            responses: Mutex::new(responses),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
            prior_errors_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::sequence(vec![Ok(text)])
    }
}

#[async_trait]
impl QuerySynthesizer for ScriptedSynthesizer {
    async fn synthesize_query(&self, request: SynthesisRequest<'_>) -> CoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prior_errors_seen
            .lock()
            .unwrap()
            .push(request.prior_errors.to_vec());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => to_result(&response),
            None => to_result(&self.last.lock().unwrap()),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Accepts text starting with SELECT.
pub struct KeywordValidator;

#[async_trait]
impl QueryValidator for KeywordValidator {
    async fn validate_query_text(&self, query_text: &str) -> QueryValidation {
        if query_text.trim_start().to_ascii_uppercase().starts_with("SELECT") {
            QueryValidation::valid()
        } else {
            QueryValidation::invalid("syntax error at or near start of query")
        }
    }
}

pub struct ScriptedExecutor {
    result: Result<Vec<Row>, String>,
    pub calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            result: Ok(rows),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute_query(&self, _query_text: &str) -> CoreResult<Vec<Row>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(CoreError::engine)
    }
}

// ============================================================================
// Checker
// ============================================================================

pub struct ScriptedChecker {
    verdicts: Mutex<VecDeque<Result<CheckVerdict, String>>>,
    last: Result<CheckVerdict, String>,
    pub calls: AtomicUsize,
    pub sample_sizes: Mutex<Vec<usize>>,
}

impl ScriptedChecker {
    pub fn sequence(verdicts: Vec<Result<CheckVerdict, String>>) -> Self {
        let last = verdicts.last().cloned().unwrap_or(Ok(CheckVerdict::pass()));
        Self {
            verdicts: Mutex::new(verdicts.into()),
            last,
            calls: AtomicUsize::new(0),
            sample_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn passing() -> Self {
        Self::sequence(vec![Ok(CheckVerdict::pass())])
    }

    pub fn rejecting(issue: &str) -> Self {
        Self::sequence(vec![Ok(CheckVerdict::fail(vec![issue.to_string()]))])
    }

    pub fn failing(message: &str) -> Self {
        Self::sequence(vec![Err(message.to_string())])
    }
}

#[async_trait]
impl ResultChecker for ScriptedChecker {
    async fn check_result(&self, request: CheckRequest<'_>) -> CoreResult<CheckVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sample_sizes
            .lock()
            .unwrap()
            .push(request.sample_rows.len());
        let next = self.verdicts.lock().unwrap().pop_front();
        to_result(&next.unwrap_or_else(|| self.last.clone()))
    }
}

// ============================================================================
// Narrator
// ============================================================================

/// What the narrator was handed, for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum SeenInput {
    Rows { rows: usize, row_count: usize },
    Profile { has_schema: bool },
}

pub struct ScriptedNarrator {
    result: Result<Narrative, String>,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<SeenInput>>,
}

impl ScriptedNarrator {
    pub fn text(text: &str) -> Self {
        Self::returning(Narrative::text(text))
    }

    pub fn returning(narrative: Narrative) -> Self {
        Self {
            result: Ok(narrative),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NarrativeSynthesizer for ScriptedNarrator {
    async fn synthesize_narrative(&self, request: NarrativeRequest<'_>) -> CoreResult<Narrative> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let seen = match request.input {
            NarrativeInput::Rows { rows, row_count } => SeenInput::Rows {
                rows: rows.len(),
                row_count,
            },
            NarrativeInput::Profile { schema } => SeenInput::Profile {
                has_schema: schema.is_some(),
            },
        };
        self.inputs.lock().unwrap().push(seen);
        to_result(&self.result)
    }
}

// ============================================================================
// Bundles
// ============================================================================

/// Handles to every fake so tests can inspect call counts afterwards.
pub struct Fakes {
    pub classifier: Arc<ScriptedClassifier>,
    pub synthesizer: Arc<ScriptedSynthesizer>,
    pub executor: Arc<ScriptedExecutor>,
    pub checker: Arc<ScriptedChecker>,
    pub narrator: Arc<ScriptedNarrator>,
}

impl Fakes {
    pub fn new(
        classifier: ScriptedClassifier,
        synthesizer: ScriptedSynthesizer,
        executor: ScriptedExecutor,
        checker: ScriptedChecker,
        narrator: ScriptedNarrator,
    ) -> Self {
        Self {
            classifier: Arc::new(classifier),
            synthesizer: Arc::new(synthesizer),
            executor: Arc::new(executor),
            checker: Arc::new(checker),
            narrator: Arc::new(narrator),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            classifier: self.classifier.clone(),
            synthesizer: self.synthesizer.clone(),
            validator: Arc::new(KeywordValidator),
            executor: self.executor.clone(),
            checker: self.checker.clone(),
            narrator: self.narrator.clone(),
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}
