//! Response Assembly
//!
//! Reads a terminal [`RequestState`] into the transport-neutral shape callers
//! return to clients. Nothing here runs a stage or changes the state.

use serde::{Deserialize, Serialize};

use query_cascade_core::{ChartSuggestion, QueryCategory, RequestState, Row};

use crate::config::PipelineConfig;

const GENERIC_FAILURE_MESSAGE: &str = "I couldn't generate a response. Please try again.";

/// Message used when no stage produced a final answer.
pub fn terminal_message(state: &RequestState) -> String {
    if state.errors().is_empty() {
        return GENERIC_FAILURE_MESSAGE.to_string();
    }

    let mut message = String::from("I encountered some issues:\n");
    for error in state.errors() {
        message.push_str("- ");
        message.push_str(error);
        message.push('\n');
    }
    message
}

/// Query results attached to a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    /// Result rows, capped for transport
    pub results: Vec<Row>,
    /// Total rows the query returned
    pub count: usize,
    /// The query text that produced `results`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    /// Every attempted query text, only when more than one attempt ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_attempts: Option<Vec<String>>,
}

/// What a caller reads from a finished pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<QueryCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    #[serde(default)]
    pub visualizations: Vec<ChartSuggestion>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PipelineResponse {
    /// Build the response from a terminal state.
    pub fn from_terminal(state: &RequestState, config: &PipelineConfig) -> Self {
        let message = state
            .final_message()
            .map(str::to_string)
            .unwrap_or_else(|| terminal_message(state));

        let data = if state.rows().is_empty() {
            None
        } else {
            let history = state.query_text_history();
            Some(ResultData {
                results: state
                    .rows()
                    .iter()
                    .take(config.response_row_limit)
                    .cloned()
                    .collect(),
                count: state.row_count(),
                query_text: state.query_text().map(str::to_string),
                query_attempts: (history.len() > 1).then(|| history.to_vec()),
            })
        };

        Self {
            message,
            category: state.category(),
            data,
            visualizations: state.visualizations().to_vec(),
            errors: state.errors().to_vec(),
        }
    }

    /// Whether any stage degraded while producing this response.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
