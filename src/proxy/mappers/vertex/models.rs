// Vertex AI text generation data models

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ProxyError;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_TOP_K: u32 = 40;

/// Inbound simplified text request.
///
/// Field values are forwarded as the caller sent them; the only check is
/// that `prompt` is present. A JSON `null` in an optional field counts as
/// not supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub prompt: Value,
    pub model: String,
    pub system_instruction: Option<Value>,
    pub temperature: Value,
    pub max_output_tokens: Value,
    pub top_p: Value,
    pub top_k: Value,
}

impl TextRequest {
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, ProxyError> {
        let prompt = payload.get("prompt").cloned().ok_or(ProxyError::MissingPrompt)?;

        let supplied = |key: &str| payload.get(key).filter(|v| !v.is_null()).cloned();

        let model = match payload.get("model") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => DEFAULT_MODEL.to_string(),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            prompt,
            model,
            system_instruction: supplied("system_instruction"),
            temperature: supplied("temperature").unwrap_or_else(|| json!(DEFAULT_TEMPERATURE)),
            max_output_tokens: supplied("max_output_tokens")
                .unwrap_or_else(|| json!(DEFAULT_MAX_OUTPUT_TOKENS)),
            top_p: supplied("top_p").unwrap_or_else(|| json!(DEFAULT_TOP_P)),
            top_k: supplied("top_k").unwrap_or_else(|| json!(DEFAULT_TOP_K)),
        })
    }
}

/// `generateContent` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: Value,
    pub max_output_tokens: Value,
    pub top_p: Value,
    pub top_k: Value,
}
