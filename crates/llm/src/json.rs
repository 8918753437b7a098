//! JSON Reply Extraction
//!
//! Models asked for JSON often wrap it in markdown fences or surround it
//! with prose. These helpers dig the first JSON object out of a reply.

use serde_json::{Map, Value};

use crate::types::{LlmError, LlmResult};

/// Locate the first JSON object in a text that may contain markdown fences.
pub fn find_json_object(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let after_fence = &text[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Some(after_fence[..end].trim());
        }
    }
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip optional language identifier on first line
        let after_lang = match after_fence.find('\n') {
            Some(nl) => &after_fence[nl + 1..],
            None => after_fence,
        };
        if let Some(end) = after_lang.find("```") {
            let content = after_lang[..end].trim();
            if content.starts_with('{') {
                return Some(content);
            }
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
        _ => None,
    }
}

/// Parse the first JSON object of a model reply.
pub fn extract_json_object(text: &str) -> LlmResult<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::ParseError {
            message: "Model returned an empty reply where JSON was expected".to_string(),
        });
    }

    let candidate = find_json_object(trimmed).ok_or_else(|| LlmError::ParseError {
        message: format!("No JSON object found in reply: {}", preview(trimmed)),
    })?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(LlmError::ParseError {
            message: format!("Expected a JSON object, got {}", type_name(&other)),
        }),
        Err(e) => {
            tracing::warn!("Failed to parse JSON reply: {}", e);
            Err(LlmError::ParseError {
                message: format!("Invalid JSON in reply: {}", e),
            })
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_CHARS).collect();
        format!("{}...", cut)
    }
}
