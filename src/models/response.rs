//! Request / Response Types
//!
//! What callers send to the chat service and what they get back.

use serde::{Deserialize, Serialize};

use query_cascade_core::{ChartSuggestion, QueryCategory};
use query_cascade_pipeline::{PipelineResponse, ResultData};

/// A natural-language question, optionally bound to a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
    /// Generated when absent
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            dataset_id: None,
            conversation_id: None,
        }
    }

    pub fn with_dataset(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = Some(dataset_id.into());
        self
    }
}

/// Answer to a chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<QueryCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    #[serde(default)]
    pub visualizations: Vec<ChartSuggestion>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub processing_time_ms: u64,
}

impl ChatResponse {
    pub fn from_pipeline(
        response: PipelineResponse,
        conversation_id: String,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            message: response.message,
            conversation_id,
            category: response.category,
            data: response.data,
            visualizations: response.visualizations,
            errors: response.errors,
            processing_time_ms,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub database: bool,
    pub config: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_endpoint: Option<String>,
    /// Set only when the provider was contacted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<bool>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.database && self.config && self.llm != Some(false)
    }
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: "query-cascade".to_string(),
            database: false,
            config: false,
            llm_model: None,
            llm_endpoint: None,
            llm: None,
        }
    }
}
