//! Synthesis Stage
//!
//! Turns the classified intent into query text for the bound dataset and
//! checks it statically before anything is executed. On a retry the most
//! recent error entries are handed back to the synthesizer as corrective
//! context.

use std::sync::Arc;

use async_trait::async_trait;

use query_cascade_core::{
    QuerySynthesizer, QueryValidator, RequestState, Stage, StageKind, StateUpdate,
    SynthesisRequest,
};

/// Remove a markdown code fence (```sql ... ```) around query text.
///
/// Text without a fence is returned trimmed. Prose before or after the
/// fenced block is dropped.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_open = &trimmed[open + 3..];
    // The rest of the opening line is a language tag
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}

pub struct SynthesisStage {
    synthesizer: Arc<dyn QuerySynthesizer>,
    validator: Arc<dyn QueryValidator>,
    prior_error_context: usize,
}

impl SynthesisStage {
    pub fn new(
        synthesizer: Arc<dyn QuerySynthesizer>,
        validator: Arc<dyn QueryValidator>,
        prior_error_context: usize,
    ) -> Self {
        Self {
            synthesizer,
            validator,
            prior_error_context,
        }
    }
}

#[async_trait]
impl Stage for SynthesisStage {
    fn kind(&self) -> StageKind {
        StageKind::Synthesis
    }

    async fn run(&self, state: &RequestState) -> StateUpdate {
        let (Some(dataset_ref), Some(schema)) = (state.dataset_ref(), state.dataset_schema())
        else {
            return StateUpdate::synthesis_skipped()
                .with_error("No dataset bound to this request; cannot synthesize a query");
        };

        let prior_errors: &[String] = if state.retry_count() > 0 {
            state.recent_errors(self.prior_error_context)
        } else {
            &[]
        };

        let request = SynthesisRequest {
            intent: state.intent().unwrap_or(state.query()),
            entities: state.entities(),
            schema,
            table_name: &dataset_ref.table_name,
            prior_errors,
        };

        let raw = match self.synthesizer.synthesize_query(request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Query synthesis failed: {}", e);
                return StateUpdate::synthesis_skipped()
                    .with_error(format!("Query synthesis error: {}", e.detail()));
            }
        };

        let query_text = strip_code_fences(&raw);
        if query_text.is_empty() {
            return StateUpdate::synthesized(query_text, false)
                .with_error("Query synthesizer returned empty query text");
        }

        let validation = self.validator.validate_query_text(&query_text).await;
        if validation.valid {
            tracing::debug!(
                "Synthesized query (attempt {}): {}",
                state.retry_count() + 1,
                query_text
            );
            StateUpdate::synthesized(query_text, true)
        } else {
            let reason = validation
                .reason
                .unwrap_or_else(|| "rejected by validator".to_string());
            StateUpdate::synthesized(query_text, false)
                .with_error(format!("Invalid query: {}", reason))
        }
    }
}
