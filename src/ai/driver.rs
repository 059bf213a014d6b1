//! Driver contract shared by all AI provider backends (spec §4.9).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatKind {
    Text,
    JsonObject,
    JsonSchema,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseFormat {
    pub kind: ResponseFormatKind,
    /// Present only for `JsonSchema`: `{name, schema, strict}`.
    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub strict: bool,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self { kind: ResponseFormatKind::JsonObject, schema_name: None, schema: None, strict: false }
    }

    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        Self { kind: ResponseFormatKind::JsonSchema, schema_name: Some(name.into()), schema: Some(schema), strict: true }
    }
}

/// xAI-only extension: routes a chat request through xAI's built-in search
/// instead of user-supplied tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchParameters {
    pub mode: String,
    pub return_citations: bool,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SamplingParams {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default)]
    pub search_parameters: Option<SearchParameters>,
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
    #[serde(default)]
    pub sampling: SamplingParams,
    pub prompt_slug: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentBlock {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Response {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Response {
    /// Concatenates content block text with newlines, per spec §4.8 step 7.
    pub fn text(&self) -> String {
        self.content.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageResponse {
    pub content: Vec<ImageBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageBlock {
    pub mime_type: String,
    pub data_base64: String,
}

/// A non-2xx response from a driver. `body` is the raw response payload only
/// — never the outgoing request body or headers, so an API key sent in an
/// `Authorization` header can never leak through this type.
#[derive(Debug, Error, Clone)]
#[error("provider returned status {status}")]
pub struct ProviderError {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("unsupported request: {0}")]
    Unsupported(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("deadline exceeded")]
    Timeout,
    #[error("decode error: {0}")]
    Decode(String),
}

pub struct Capabilities {
    pub supports_tools: bool,
    pub supports_search: bool,
    pub supports_images: bool,
    pub supports_json_schema: bool,
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;
    async fn complete(&self, request: Request, timeout: Duration) -> Result<Response, DriverError>;

    async fn generate_image(&self, _request: ImageRequest, _timeout: Duration) -> Result<ImageResponse, DriverError> {
        Err(DriverError::Unsupported(format!("{} does not support image generation", self.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_joins_blocks_with_newline() {
        let response = Response {
            content: vec![ContentBlock { text: "a".to_string() }, ContentBlock { text: "b".to_string() }],
            ..Default::default()
        };
        assert_eq!(response.text(), "a\nb");
    }

    #[test]
    fn provider_error_display_never_includes_body() {
        let err = ProviderError { status: 401, body: "sk-leaked-key-should-not-print".to_string() };
        assert_eq!(err.to_string(), "provider returned status 401");
    }
}
