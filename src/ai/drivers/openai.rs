//! OpenAI driver: chat completions + image generation (spec §4.9).

use crate::ai::driver::{
    Capabilities, ContentBlock, Driver, DriverError, ImageBlock, ImageRequest, ImageResponse, ProviderError,
    Request, Response, ResponseFormatKind, Role,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiDriver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiDriver {
    pub fn new(client: reqwest::Client, base_url: Option<&str>, api_key: &str) -> Self {
        Self { client, base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(), api_key: api_key.to_string() }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn build_body(&self, request: &Request) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": Self::role_str(m.role), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });

        if let Some(tools) = &request.tools {
            let flattened: Vec<Value> = tools
                .iter()
                .map(|t| {
                    let mut entry = serde_json::Map::new();
                    entry.insert("type".to_string(), Value::String(t.tool_type.clone()));
                    if let Value::Object(config) = &t.config {
                        for (k, v) in config {
                            entry.insert(k.clone(), v.clone());
                        }
                    }
                    Value::Object(entry)
                })
                .collect();
            body["tools"] = Value::Array(flattened);
        }

        if let Some(format) = &request.response_format {
            body["response_format"] = match format.kind {
                ResponseFormatKind::Text => json!({ "type": "text" }),
                ResponseFormatKind::JsonObject => json!({ "type": "json_object" }),
                ResponseFormatKind::JsonSchema => json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": format.schema_name.clone().unwrap_or_default(),
                        "schema": format.schema.clone().unwrap_or(Value::Null),
                        "strict": format.strict,
                    }
                }),
            };
        }

        if let Some(temperature) = request.sampling.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.sampling.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = request.sampling.top_p {
            body["top_p"] = json!(top_p);
        }

        body
    }
}

#[async_trait]
impl Driver for OpenAiDriver {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { supports_tools: true, supports_search: false, supports_images: true, supports_json_schema: true }
    }

    async fn complete(&self, request: Request, timeout: Duration) -> Result<Response, DriverError> {
        if request.search_parameters.is_some() {
            return Err(DriverError::Unsupported("openai does not support search_parameters".to_string()));
        }

        let body = self.build_body(&request);
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %request.model, "openai chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DriverError::Provider(ProviderError { status: status.as_u16(), body: text }));
        }

        let decoded: Value = response.json().await?;
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

    async fn generate_image(&self, request: ImageRequest, timeout: Duration) -> Result<ImageResponse, DriverError> {
        let is_dalle = request.model.to_lowercase().contains("dall-e") || request.model.to_lowercase().contains("dalle");

        let mut body = json!({
            "model": request.model,
            "prompt": request.prompt,
        });

        if is_dalle {
            body["response_format"] = json!("b64_json");
            let quality = request.quality.as_deref().filter(|q| *q == "standard" || *q == "hd").unwrap_or("standard");
            body["quality"] = json!(quality);
        } else {
            if let Some(output_format) = &request.output_format {
                body["output_format"] = json!(output_format);
            }
            if let Some(background) = &request.background {
                body["background"] = json!(background);
            }
        }

        let url = format!("{}/images/generations", self.base_url);
        let response = self.client.post(&url).bearer_auth(&self.api_key).json(&body).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DriverError::Provider(ProviderError { status: status.as_u16(), body: text }));
        }

        let decoded: Value = response.json().await?;
        let b64 = decoded
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("b64_json"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::Decode("missing b64_json in image response".to_string()))?;

        let mime = if is_dalle { "image/png".to_string() } else { format!("image/{}", request.output_format.as_deref().unwrap_or("png")) };

        Ok(ImageResponse { content: vec![ImageBlock { mime_type: mime, data_base64: b64.to_string() }] })
    }
}
