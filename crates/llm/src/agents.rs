//! Model-Backed Pipeline Collaborators
//!
//! Implementations of the core capability traits on top of any
//! [`LlmProvider`]. Each collaborator makes a single model call per
//! invocation (no agentic loops) and reports failures as `CoreError`, which
//! the pipeline stages turn into degraded updates.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use query_cascade_core::{
    ChartType, CheckRequest, CheckVerdict, Classification, CoreError, CoreResult, DatasetSchema,
    Narrative, NarrativeInput, NarrativeRequest, NarrativeSynthesizer, QueryClassifier,
    QuerySynthesizer, ResultChecker, SynthesisRequest, VisualizationHint,
};

use crate::json::extract_json_object;
use crate::prompts;
use crate::provider::LlmProvider;
use crate::types::{LlmRequestOptions, Message};

/// Temperature for structured (JSON) replies.
pub const STRUCTURED_TEMPERATURE: f32 = 0.1;
/// Temperature for narrative prose.
pub const NARRATIVE_TEMPERATURE: f32 = 0.3;

/// Send one user prompt and return the trimmed reply text.
async fn complete(
    provider: &dyn LlmProvider,
    system: &str,
    user: String,
    options: LlmRequestOptions,
) -> CoreResult<String> {
    let response = provider
        .send_message(vec![Message::user(user)], Some(system.to_string()), options)
        .await?;
    Ok(response.text().trim().to_string())
}

async fn complete_json(
    provider: &dyn LlmProvider,
    system: &str,
    user: String,
) -> CoreResult<Map<String, Value>> {
    let options = LlmRequestOptions::with_temperature(STRUCTURED_TEMPERATURE).json();
    let reply = complete(provider, system, user, options).await?;
    Ok(extract_json_object(&reply)?)
}

// ============================================================================
// Classifier
// ============================================================================

/// Classifies a question into a category label plus intent and entities.
pub struct LlmClassifier {
    provider: Arc<dyn LlmProvider>,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl QueryClassifier for LlmClassifier {
    async fn classify(
        &self,
        query: &str,
        schema: Option<&DatasetSchema>,
    ) -> CoreResult<Classification> {
        let user = prompts::classification_user(query, schema);
        let reply =
            complete_json(self.provider.as_ref(), prompts::CLASSIFICATION_SYSTEM, user).await?;

        let category = reply
            .get("query_type")
            .and_then(Value::as_str)
            .unwrap_or("qa")
            .to_string();
        let intent = reply
            .get("intent")
            .and_then(Value::as_str)
            .map(str::to_string);
        let entities = reply
            .get("entities")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        tracing::debug!("Classifier reply: query_type={}, intent={:?}", category, intent);
        Ok(Classification {
            category,
            intent,
            entities,
        })
    }
}

// ============================================================================
// Query Synthesizer
// ============================================================================

/// Writes SQLite query text for the classified intent.
pub struct LlmQuerySynthesizer {
    provider: Arc<dyn LlmProvider>,
}

impl LlmQuerySynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl QuerySynthesizer for LlmQuerySynthesizer {
    async fn synthesize_query(&self, request: SynthesisRequest<'_>) -> CoreResult<String> {
        let user = prompts::synthesis_user(
            request.intent,
            request.entities,
            request.schema,
            request.table_name,
            request.prior_errors,
        );
        if !request.prior_errors.is_empty() {
            tracing::info!(
                "Re-synthesizing query with {} prior error(s) as context",
                request.prior_errors.len()
            );
        }
        // Fence stripping and validation happen in the synthesis stage
        complete(
            self.provider.as_ref(),
            prompts::SYNTHESIS_SYSTEM,
            user,
            LlmRequestOptions::with_temperature(STRUCTURED_TEMPERATURE),
        )
        .await
    }
}

// ============================================================================
// Result Checker
// ============================================================================

/// Asks the model whether a result plausibly answers the question.
pub struct LlmResultChecker {
    provider: Arc<dyn LlmProvider>,
}

impl LlmResultChecker {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

/// Interpret a checker reply. A missing `valid` key counts as valid.
pub fn parse_verdict(reply: &Map<String, Value>) -> CoreResult<CheckVerdict> {
    let valid = match reply.get("valid") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(CoreError::parse(format!(
                "Checker reply has a non-boolean 'valid': {}",
                other
            )))
        }
    };

    let mut issues: Vec<String> = match reply.get("issues") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };

    if !valid {
        if let Some(suggestion) = reply
            .get("suggestion")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
        {
            issues.push(format!("Suggestion: {}", suggestion));
        }
    }

    Ok(CheckVerdict { valid, issues })
}

#[async_trait]
impl ResultChecker for LlmResultChecker {
    async fn check_result(&self, request: CheckRequest<'_>) -> CoreResult<CheckVerdict> {
        let user = prompts::check_user(
            request.query,
            request.query_text,
            request.row_count,
            request.sample_rows,
        );
        let reply = complete_json(self.provider.as_ref(), prompts::CHECK_SYSTEM, user).await?;
        parse_verdict(&reply)
    }
}

// ============================================================================
// Narrator
// ============================================================================

/// Writes the user-facing answer from results or from the dataset profile.
pub struct LlmNarrator {
    provider: Arc<dyn LlmProvider>,
}

impl LlmNarrator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

/// Chart kind named explicitly in the narrative, if any.
pub fn chart_hint_from_text(text: &str) -> Option<VisualizationHint> {
    let lower = text.to_lowercase();
    let chart_type = [
        ("line chart", ChartType::Line),
        ("pie chart", ChartType::Pie),
        ("area chart", ChartType::Area),
        ("scatter plot", ChartType::Scatter),
        ("bar chart", ChartType::Bar),
    ]
    .into_iter()
    .find(|(phrase, _)| lower.contains(phrase))
    .map(|(_, chart_type)| chart_type)?;

    Some(VisualizationHint {
        chart_type: Some(chart_type),
        title: None,
    })
}

#[async_trait]
impl NarrativeSynthesizer for LlmNarrator {
    async fn synthesize_narrative(&self, request: NarrativeRequest<'_>) -> CoreResult<Narrative> {
        let (system, user) = match request.input {
            NarrativeInput::Rows { rows, row_count } => (
                prompts::INSIGHT_SYSTEM,
                prompts::insight_user(request.query, rows, row_count, request.metadata.as_ref()),
            ),
            NarrativeInput::Profile { schema } => (
                prompts::SUMMARIZATION_SYSTEM,
                prompts::summarization_user(request.query, schema, request.metadata.as_ref()),
            ),
        };

        let text = complete(
            self.provider.as_ref(),
            system,
            user,
            LlmRequestOptions::with_temperature(NARRATIVE_TEMPERATURE),
        )
        .await?;

        let visualization_hints = match request.input {
            NarrativeInput::Rows { .. } => chart_hint_from_text(&text).into_iter().collect(),
            NarrativeInput::Profile { .. } => Vec::new(),
        };

        Ok(Narrative {
            text,
            visualization_hints,
        })
    }
}
