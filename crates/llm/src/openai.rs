//! OpenAI-Compatible Provider
//!
//! Implementation of the LlmProvider trait for any endpoint that speaks the
//! OpenAI chat completions protocol (OpenAI itself, Azure-style gateways,
//! local servers such as Ollama or vLLM). Non-streaming only.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, StopReason,
    UsageStats,
};
use crate::http_client::build_http_client;

const PROVIDER_NAME: &str = "openai-compatible";

/// Provider for OpenAI-compatible chat completion APIs
pub struct OpenAICompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAICompatibleProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs)?;
        tracing::info!(
            "LLM provider initialized: url={}, model={}",
            config.resolved_base_url(),
            config.model
        );
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.resolved_base_url())
    }

    fn is_local(&self) -> bool {
        let url = self.config.resolved_base_url();
        url.contains("://localhost") || url.contains("://127.0.0.1")
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": request_options
                .max_tokens_override
                .unwrap_or(self.config.max_tokens),
            "temperature": request_options
                .temperature_override
                .unwrap_or(self.config.temperature),
            "stream": false,
        });

        let mut openai_messages: Vec<serde_json::Value> = Vec::new();
        if let Some(sys) = system {
            openai_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }
        for msg in messages {
            openai_messages.push(self.message_to_openai(msg));
        }
        body["messages"] = serde_json::json!(openai_messages);

        if request_options.json_response {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    /// Convert a Message to OpenAI API format
    fn message_to_openai(&self, message: &Message) -> serde_json::Value {
        serde_json::json!({
            "role": message.role.as_str(),
            "content": message.content
        })
    }

    /// Parse a response from the API
    fn parse_response(&self, response: &OpenAIResponse) -> LlmResponse {
        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone());

        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(|r| StopReason::from(r.as_str()))
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .as_ref()
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        LlmResponse {
            content,
            stop_reason,
            usage,
            model: response
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAICompatibleProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Some(key),
            // Local servers usually run without auth
            _ if self.is_local() => None,
            _ => return Err(missing_api_key_error(PROVIDER_NAME)),
        };

        let body = self.build_request_body(&messages, system.as_deref(), &request_options);
        let url = self.completions_url();
        tracing::debug!("LLM send_message POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, PROVIDER_NAME));
        }

        let openai_response: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&openai_response))
    }

    async fn health_check(&self) -> LlmResult<()> {
        let messages = vec![Message::user("ping")];
        let options = LlmRequestOptions {
            max_tokens_override: Some(1),
            ..Default::default()
        };
        self.send_message(messages, None, options).await?;
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Chat completions response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAICompatibleProvider::new(test_config()).unwrap();
        assert_eq!(provider.name(), "openai-compatible");
        assert_eq!(provider.model(), "gpt-4o-mini");
        assert_eq!(
            provider.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert!(!provider.is_local());
    }

    #[test]
    fn test_local_base_url() {
        let config = ProviderConfig {
            api_key: None,
            base_url: Some("http://localhost:11434/v1/".to_string()),
            ..test_config()
        };
        let provider = OpenAICompatibleProvider::new(config).unwrap();
        assert!(provider.is_local());
        assert_eq!(
            provider.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body() {
        let provider = OpenAICompatibleProvider::new(test_config()).unwrap();
        let options = LlmRequestOptions::with_temperature(0.3).json();
        let body = provider.build_request_body(
            &[Message::user("Hello!")],
            Some("You are terse."),
            &options,
        );

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], false);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello!");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_message_conversion() {
        let provider = OpenAICompatibleProvider::new(test_config()).unwrap();
        let openai_msg = provider.message_to_openai(&Message::assistant("Hi"));
        assert_eq!(openai_msg["role"], "assistant");
        assert_eq!(openai_msg["content"], "Hi");
    }

    #[test]
    fn test_parse_response() {
        let provider = OpenAICompatibleProvider::new(test_config()).unwrap();
        let raw = r#"{
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"role": "assistant", "content": "SELECT 1"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let response = provider.parse_response(&parsed);

        assert_eq!(response.text(), "SELECT 1");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.model, "gpt-4o-mini-2024");
    }

    #[test]
    fn test_parse_empty_choices() {
        let provider = OpenAICompatibleProvider::new(test_config()).unwrap();
        let parsed: OpenAIResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let response = provider.parse_response(&parsed);
        assert_eq!(response.text(), "");
        assert_eq!(response.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_missing_api_key_for_remote_endpoint() {
        let config = ProviderConfig {
            api_key: None,
            ..test_config()
        };
        let provider = OpenAICompatibleProvider::new(config).unwrap();
        let err = provider
            .send_message(vec![Message::user("hi")], None, LlmRequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed { .. }));
    }
}
