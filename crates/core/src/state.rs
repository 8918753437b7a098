//! Request State
//!
//! The single record threaded through the pipeline for one request. It is
//! created fresh per request, owned exclusively by the orchestrator while the
//! request runs, and dropped once the response has been assembled.
//!
//! Fields are private: the identity fields (`query`, dataset reference and
//! schema) can only be set at construction, and everything else changes only
//! through [`RequestState::apply`], which enforces the merge rules:
//!
//! - overwrite fields are replaced field by field
//! - `errors` and `query_text_history` only ever grow; every synthesis
//!   attempt adds exactly one history entry (empty when no text was produced)
//! - `category` is fixed by the first classification
//! - `retry_count` only moves up, one step per `CheckOutcome::Retry`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::results::{ChartSuggestion, Row};
use crate::schema::DatasetSchema;
use crate::update::{CheckOutcome, StageChange, StateUpdate};

// ============================================================================
// Query Category
// ============================================================================

/// What kind of answer a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    /// A question answered from query results
    Qa,
    /// A description of the dataset as a whole, no query needed
    Summarization,
    /// Chart-oriented question, answered from query results
    Dashboard,
}

impl QueryCategory {
    /// Parse a classifier label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "qa" => Some(QueryCategory::Qa),
            "summarization" => Some(QueryCategory::Summarization),
            "dashboard" => Some(QueryCategory::Dashboard),
            _ => None,
        }
    }

    /// Whether this category goes through query synthesis and execution.
    pub fn needs_query(&self) -> bool {
        match self {
            QueryCategory::Qa | QueryCategory::Dashboard => true,
            QueryCategory::Summarization => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::Qa => "qa",
            QueryCategory::Summarization => "summarization",
            QueryCategory::Dashboard => "dashboard",
        }
    }
}

impl std::fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Dataset Reference
// ============================================================================

/// Which dataset a request is about and where the engine exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub dataset_id: String,
    pub table_name: String,
}

impl DatasetRef {
    pub fn new(dataset_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            table_name: table_name.into(),
        }
    }
}

// ============================================================================
// Request State
// ============================================================================

/// Mutable per-request pipeline state.
#[derive(Debug, Clone, Serialize)]
pub struct RequestState {
    request_id: String,
    query: String,
    dataset_ref: Option<DatasetRef>,
    dataset_schema: Option<DatasetSchema>,

    category: Option<QueryCategory>,
    intent: Option<String>,
    entities: Map<String, Value>,

    query_text: Option<String>,
    query_text_history: Vec<String>,
    query_valid: bool,

    rows: Vec<Row>,
    row_count: usize,

    validation_passed: bool,
    validation_issues: Vec<String>,
    retry_count: u32,

    errors: Vec<String>,

    final_message: Option<String>,
    visualizations: Vec<ChartSuggestion>,
}

impl RequestState {
    /// Create a zero-initialized state for a dataset-less request.
    pub fn new(request_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            query: query.into(),
            dataset_ref: None,
            dataset_schema: None,
            category: None,
            intent: None,
            entities: Map::new(),
            query_text: None,
            query_text_history: Vec::new(),
            query_valid: false,
            rows: Vec::new(),
            row_count: 0,
            validation_passed: false,
            validation_issues: Vec::new(),
            retry_count: 0,
            errors: Vec::new(),
            final_message: None,
            visualizations: Vec::new(),
        }
    }

    /// Bind a dataset and its profiled schema. Builder-style, so it can only
    /// happen before the state is handed to the pipeline.
    pub fn with_dataset(mut self, dataset_ref: DatasetRef, schema: Option<DatasetSchema>) -> Self {
        self.dataset_ref = Some(dataset_ref);
        self.dataset_schema = schema;
        self
    }

    // ------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------

    /// Merge a stage's partial update into the state.
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate { change, errors } = update;

        match change {
            StageChange::None => {}
            StageChange::Classified {
                category,
                intent,
                entities,
            } => match self.category {
                None => {
                    self.category = Some(category);
                    self.intent = Some(intent);
                    self.entities = entities;
                }
                Some(existing) => {
                    self.errors.push(format!(
                        "Classification already fixed as '{}'; ignored '{}'",
                        existing, category
                    ));
                }
            },
            StageChange::Synthesized { query_text, valid } => match query_text {
                Some(text) => {
                    self.query_valid = valid && !text.trim().is_empty();
                    self.query_text_history.push(text.clone());
                    self.query_text = Some(text);
                }
                None => {
                    self.query_valid = false;
                    self.query_text = None;
                    self.query_text_history.push(String::new());
                }
            },
            StageChange::Executed { rows } => {
                self.row_count = rows.len();
                self.rows = rows;
            }
            StageChange::Checked(outcome) => match outcome {
                CheckOutcome::Passed | CheckOutcome::Accepted { .. } => {
                    self.validation_passed = true;
                    self.validation_issues.clear();
                }
                CheckOutcome::Retry { issues } => {
                    self.validation_passed = false;
                    self.validation_issues = issues;
                    self.retry_count += 1;
                }
            },
            StageChange::Narrated {
                message,
                visualizations,
            } => {
                self.final_message = Some(message);
                self.visualizations = visualizations;
            }
        }

        self.errors.extend(errors);
    }

    /// Append an error observed outside of any stage (e.g. cancellation).
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Set the final message if no stage produced a non-empty one.
    pub fn ensure_final_message(&mut self, fallback: impl FnOnce(&Self) -> String) {
        if self.final_message().is_none() {
            let message = fallback(self);
            self.final_message = Some(message);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn dataset_ref(&self) -> Option<&DatasetRef> {
        self.dataset_ref.as_ref()
    }

    pub fn dataset_schema(&self) -> Option<&DatasetSchema> {
        self.dataset_schema.as_ref()
    }

    pub fn category(&self) -> Option<QueryCategory> {
        self.category
    }

    pub fn intent(&self) -> Option<&str> {
        self.intent.as_deref()
    }

    pub fn entities(&self) -> &Map<String, Value> {
        &self.entities
    }

    pub fn query_text(&self) -> Option<&str> {
        self.query_text.as_deref()
    }

    pub fn query_text_history(&self) -> &[String] {
        &self.query_text_history
    }

    pub fn query_valid(&self) -> bool {
        self.query_valid
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn validation_passed(&self) -> bool {
        self.validation_passed
    }

    pub fn validation_issues(&self) -> &[String] {
        &self.validation_issues
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The most recent `n` error entries, oldest first.
    pub fn recent_errors(&self, n: usize) -> &[String] {
        let start = self.errors.len().saturating_sub(n);
        &self.errors[start..]
    }

    /// The terminal answer, if one has been produced. Blank text counts as
    /// absent.
    pub fn final_message(&self) -> Option<&str> {
        self.final_message
            .as_deref()
            .filter(|message| !message.trim().is_empty())
    }

    pub fn visualizations(&self) -> &[ChartSuggestion] {
        &self.visualizations
    }
}
