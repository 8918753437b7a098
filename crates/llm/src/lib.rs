//! Query Cascade LLM
//!
//! Model access for the pipeline collaborators:
//! - `LlmProvider` trait and the OpenAI-compatible chat-completions provider
//!   (OpenAI, DeepSeek, Ollama, vLLM and other compatible gateways)
//! - JSON reply extraction for structured prompts
//! - Prompt templates
//! - Model-backed classifier, query synthesizer, result checker and narrator

pub mod agents;
pub mod http_client;
pub mod json;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod types;

// Re-export main types
pub use agents::{LlmClassifier, LlmNarrator, LlmQuerySynthesizer, LlmResultChecker};
pub use http_client::build_http_client;
pub use json::extract_json_object;
pub use openai::OpenAICompatibleProvider;
pub use provider::LlmProvider;
pub use types::*;
