//! Collaborator Capabilities
//!
//! The pipeline stages delegate the actual work to external collaborators:
//! a classifier, a query synthesizer, a query engine (static validation and
//! execution), a result checker and a narrative synthesizer. Each is a trait
//! object injected at construction time, so the pipeline never reaches for a
//! global client or connection.
//!
//! Implementations must be safe to share across concurrent requests.
//! Serializing access to a single-writer engine connection is the
//! implementation's concern (pooling, a mutex), not the pipeline's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreResult;
use crate::results::{Row, VisualizationHint};
use crate::schema::{DatasetSchema, SchemaSummary};

// ============================================================================
// Classification
// ============================================================================

/// Raw classifier output. `category` is the unvalidated label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub entities: Map<String, Value>,
}

#[async_trait]
pub trait QueryClassifier: Send + Sync {
    async fn classify(
        &self,
        query: &str,
        schema: Option<&DatasetSchema>,
    ) -> CoreResult<Classification>;
}

// ============================================================================
// Query Synthesis
// ============================================================================

/// Everything the synthesizer needs to write query text.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub intent: &'a str,
    pub entities: &'a Map<String, Value>,
    pub schema: &'a DatasetSchema,
    pub table_name: &'a str,
    /// Most recent error entries when retrying, oldest first. Empty on the
    /// first attempt.
    pub prior_errors: &'a [String],
}

#[async_trait]
pub trait QuerySynthesizer: Send + Sync {
    async fn synthesize_query(&self, request: SynthesisRequest<'_>) -> CoreResult<String>;
}

// ============================================================================
// Query Engine
// ============================================================================

/// Static validity of query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryValidation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl QueryValidation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Static check of query text without executing it.
#[async_trait]
pub trait QueryValidator: Send + Sync {
    async fn validate_query_text(&self, query_text: &str) -> QueryValidation;
}

/// Runs query text against the dataset.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute_query(&self, query_text: &str) -> CoreResult<Vec<Row>>;
}

// ============================================================================
// Result Check
// ============================================================================

/// Input to the semantic result checker.
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest<'a> {
    pub query: &'a str,
    pub query_text: Option<&'a str>,
    pub row_count: usize,
    pub sample_rows: &'a [Row],
}

/// The checker's judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckVerdict {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl CheckVerdict {
    pub fn pass() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    pub fn fail(issues: Vec<String>) -> Self {
        Self {
            valid: false,
            issues,
        }
    }
}

#[async_trait]
pub trait ResultChecker: Send + Sync {
    async fn check_result(&self, request: CheckRequest<'_>) -> CoreResult<CheckVerdict>;
}

// ============================================================================
// Narrative
// ============================================================================

/// What the narrative is built from.
#[derive(Debug, Clone, Copy)]
pub enum NarrativeInput<'a> {
    /// Query results (qa / dashboard path), already capped
    Rows { rows: &'a [Row], row_count: usize },
    /// The dataset profile only (summarization path); absent for
    /// dataset-less requests
    Profile { schema: Option<&'a DatasetSchema> },
}

#[derive(Debug, Clone)]
pub struct NarrativeRequest<'a> {
    pub query: &'a str,
    pub input: NarrativeInput<'a>,
    pub metadata: Option<SchemaSummary>,
}

/// Narrative synthesizer output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    #[serde(default)]
    pub visualization_hints: Vec<VisualizationHint>,
}

impl Narrative {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visualization_hints: Vec::new(),
        }
    }
}

#[async_trait]
pub trait NarrativeSynthesizer: Send + Sync {
    async fn synthesize_narrative(&self, request: NarrativeRequest<'_>) -> CoreResult<Narrative>;
}
