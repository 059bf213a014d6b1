//! xAI driver: chat completions, the tool-enabled `/responses` shape, and
//! image generation (spec §4.9).

use crate::ai::driver::{
    Capabilities, ContentBlock, Driver, DriverError, ImageBlock, ImageRequest, ImageResponse, ProviderError,
    Request, Response, Role,
};
use crate::ai::tracer::{NoopTraceSink, TraceEntry, TraceSink};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_IMAGE_MODEL: &str = "grok-2-image";

pub struct XaiDriver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    tracer: Arc<dyn TraceSink>,
}

impl XaiDriver {
    pub fn new(client: reqwest::Client, base_url: Option<&str>, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key: api_key.to_string(),
            tracer: Arc::new(NoopTraceSink),
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn TraceSink>) -> Self {
        self.tracer = tracer;
        self
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn uses_responses_endpoint(request: &Request) -> bool {
        request.tools.is_some() || request.search_parameters.is_some()
    }

    async fn chat_completions(&self, request: &Request, timeout: Duration) -> Result<(u16, Value, String), DriverError> {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": Self::role_str(m.role), "content": m.content }))
            .collect();
        let body = json!({ "model": request.model, "messages": messages });
        self.post(&format!("{}/chat/completions", self.base_url), &body, &request.model, timeout).await
    }

    async fn responses(&self, request: &Request, timeout: Duration) -> Result<(u16, Value, String), DriverError> {
        let input: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": Self::role_str(m.role), "content": m.content }))
            .collect();

        let mut body = json!({ "model": request.model, "input": input });
        if let Some(tools) = &request.tools {
            body["tools"] = json!(tools.iter().map(|t| json!({ "type": t.tool_type })).collect::<Vec<_>>());
        }
        if let Some(params) = &request.search_parameters {
            body["search_parameters"] = json!({
                "mode": params.mode,
                "return_citations": params.return_citations,
                "sources": params.sources,
            });
        }

        self.post(&format!("{}/responses", self.base_url), &body, &request.model, timeout).await
    }

    async fn post(&self, url: &str, body: &Value, model: &str, timeout: Duration) -> Result<(u16, Value, String), DriverError> {
        let started = std::time::Instant::now();
        let response = self.client.post(url).bearer_auth(&self.api_key).json(body).timeout(timeout).send().await?;
        let status = response.status();
        let raw_text = response.text().await.unwrap_or_default();
        let duration_ms = started.elapsed().as_millis() as u64;

        self.tracer.trace(&TraceEntry {
            timestamp_millis: 0,
            driver: "xai".to_string(),
            endpoint: url.to_string(),
            method: "POST".to_string(),
            model: model.to_string(),
            request_body: body.to_string(),
            status_code: status.as_u16(),
            response_body: raw_text.clone(),
            error: None,
            duration_ms,
        });

        if !status.is_success() {
            return Err(DriverError::Provider(ProviderError { status: status.as_u16(), body: raw_text }));
        }

        let decoded: Value = serde_json::from_str(&raw_text).map_err(|e| DriverError::Decode(e.to_string()))?;
        Ok((status.as_u16(), decoded, raw_text))
    }
}

#[async_trait]
impl Driver for XaiDriver {
    fn name(&self) -> &'static str {
        "xai"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { supports_tools: true, supports_search: true, supports_images: true, supports_json_schema: false }
    }

    async fn complete(&self, request: Request, timeout: Duration) -> Result<Response, DriverError> {
        if Self::uses_responses_endpoint(&request) {
            let (_, decoded, _) = self.responses(&request, timeout).await?;
            let content = decoded
                .get("output")
                .and_then(|o| o.as_array())
                .map(|items| {
                    items
                        .iter()
                        .flat_map(|item| item.get("content").and_then(|c| c.as_array()).cloned().unwrap_or_default())
                        .filter_map(|block| block.get("output_text").and_then(|t| t.as_str()).map(|t| ContentBlock { text: t.to_string() }))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            Ok(Response { content, finish_reason: None, usage: None, tool_calls: vec![] })
        } else {
            let (_, decoded, _) = self.chat_completions(&request, timeout).await?;
            let text = decoded
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();
            let finish_reason = decoded
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("finish_reason"))
                .and_then(|v| v.as_str())
                .map(str::to_string);

            Ok(Response { content: vec![ContentBlock { text }], finish_reason, usage: None, tool_calls: vec![] })
        }
    }

    async fn generate_image(&self, request: ImageRequest, timeout: Duration) -> Result<ImageResponse, DriverError> {
        let model = if request.model.is_empty() { DEFAULT_IMAGE_MODEL.to_string() } else { request.model.clone() };
        let body = json!({ "model": model, "prompt": request.prompt });
        let url = format!("{}/images/generations", self.base_url);

        debug!(url = %url, "xai image generation");
        let response = self.client.post(&url).bearer_auth(&self.api_key).json(&body).timeout(timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DriverError::Provider(ProviderError { status: status.as_u16(), body: text }));
        }

        let decoded: Value = response.json().await?;
        let raw = decoded
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("b64_json").and_then(|v| v.as_str()).or_else(|| d.get("url").and_then(|v| v.as_str())))
            .ok_or_else(|| DriverError::Decode("missing image payload in xai response".to_string()))?;

        let data_base64 = strip_data_url_prefix(raw).to_string();

        Ok(ImageResponse { content: vec![ImageBlock { mime_type: "image/png".to_string(), data_base64 }] })
    }
}

/// xAI images may arrive as raw base64 or as a `data:image/png;base64,...`
/// URL; strips the prefix so callers always get bare base64.
fn strip_data_url_prefix(value: &str) -> &str {
    match value.find("base64,") {
        Some(idx) => &value[idx + "base64,".len()..],
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::driver::{Message, SamplingParams, SearchParameters};
    use std::collections::HashMap;

    #[test]
    fn strips_data_url_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url_prefix("AAAA"), "AAAA");
    }

    #[test]
    fn tool_enabled_request_routes_to_responses_endpoint() {
        let request = Request {
            model: "grok-4".to_string(),
            messages: vec![Message { role: Role::User, content: "hi".to_string() }],
            tools: None,
            search_parameters: Some(SearchParameters { mode: "auto".to_string(), return_citations: true, sources: vec!["web".to_string()] }),
            response_format: None,
            sampling: SamplingParams::default(),
            prompt_slug: "search".to_string(),
            metadata: HashMap::new(),
        };
        assert!(XaiDriver::uses_responses_endpoint(&request));
    }

    #[test]
    fn plain_request_routes_to_chat_completions() {
        let request = Request {
            model: "grok-4".to_string(),
            messages: vec![Message { role: Role::User, content: "hi".to_string() }],
            tools: None,
            search_parameters: None,
            response_format: None,
            sampling: SamplingParams::default(),
            prompt_slug: "search".to_string(),
            metadata: HashMap::new(),
        };
        assert!(!XaiDriver::uses_responses_endpoint(&request));
    }
}
