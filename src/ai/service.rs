//! AIService: search / generate / bulk-search request handling (spec §4.8).

use crate::ai::config::Depth;
use crate::ai::driver::{
    DriverError, Message, ProviderError, Request, ResponseFormat, Role, SearchParameters, ToolDefinition,
};
use crate::ai::prompt::{Prompt, PromptError, PromptRegistry, ResponseSchema};
use crate::ai::registry::{ProviderRegistry, ResolveError};
use crate::ai::renderer::{PromptRenderer, RenderError};
use crate::ai::schema::{self, SchemaCatalog};
use crate::ai::tracer::{NoopTraceSink, TraceEntry, TraceSink};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Auth,
    RateLimit,
    Unavailable,
    BadRequest,
    Error,
    Timeout,
}

/// Public error mapping surfaced to callers (spec §4.8 "Error classification").
#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct SearchError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

/// The model returned decodable text that failed downstream decode or
/// schema validation. Carries the best-effort parsed value (for callers that
/// want to display partial content) alongside the raw bytes.
#[derive(Debug, Error)]
#[error("response failed validation: {err}")]
pub struct RawResponseError {
    pub err: String,
    pub raw: String,
    pub value: Option<Value>,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("missing required variable: {0}")]
    MissingVariable(String),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    RawResponse(#[from] RawResponseError),
}

#[derive(Debug, Clone, Default)]
pub struct CommonRequest {
    pub role: String,
    pub prompt_slug: String,
    pub depth: Option<Depth>,
    pub model_override: String,
    pub timeout_seconds: Option<u64>,
    pub use_tools: bool,
    pub include_raw: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub common: CommonRequest,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub common: CommonRequest,
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct BulkSearchRequest {
    pub common: CommonRequest,
    pub names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AiResponse {
    pub value: Value,
    pub raw: Option<String>,
}

pub struct AiServiceConfig {
    pub default_timeout: Duration,
    pub capture_raw_enabled: bool,
    pub capture_raw_max_bytes: usize,
    pub bulk_prompt_slug: String,
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            capture_raw_enabled: false,
            capture_raw_max_bytes: 16 * 1024,
            bulk_prompt_slug: "bulk_search".to_string(),
        }
    }
}

pub struct AiService {
    prompts: Arc<dyn PromptRegistry>,
    providers: Arc<ProviderRegistry>,
    schemas: Arc<dyn SchemaCatalog>,
    tracer: Arc<dyn TraceSink>,
    config: AiServiceConfig,
}

impl AiService {
    pub fn new(prompts: Arc<dyn PromptRegistry>, providers: Arc<ProviderRegistry>, schemas: Arc<dyn SchemaCatalog>, config: AiServiceConfig) -> Self {
        Self { prompts, providers, schemas, tracer: Arc::new(NoopTraceSink), config }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn TraceSink>) -> Self {
        self.tracer = tracer;
        self
    }

    pub async fn search(&self, request: SearchRequest) -> Result<AiResponse, AiError> {
        let mut vars = HashMap::new();
        vars.insert("input".to_string(), request.name.clone());
        let (value, raw) = self.run(&request.common, vars, "{{input}}").await?;
        Ok(AiResponse { value, raw })
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<AiResponse, AiError> {
        let prompt = self.prompts.get(&request.common.prompt_slug)?;
        for required in &prompt.required_variables {
            match request.variables.get(required) {
                Some(v) if !v.trim().is_empty() => {}
                _ => return Err(AiError::MissingVariable(required.clone())),
            }
        }
        let (value, raw) = self.run(&request.common, request.variables, "{{concept}}").await?;
        Ok(AiResponse { value, raw })
    }

    /// Defers to `generate` against a dedicated bulk prompt; on schema
    /// failure attempts a lenient decode of a partial `items[]` array so
    /// callers can still get the names that came back cleanly.
    pub async fn bulk_search(&self, request: BulkSearchRequest) -> Result<AiResponse, AiError> {
        let mut names: Vec<String> = request.names.iter().map(|n| n.trim().to_lowercase()).filter(|n| !n.is_empty()).collect();
        names.sort();
        names.dedup();

        let joined = names.iter().map(|n| format!("- {n}")).collect::<Vec<_>>().join("\n");
        let mut variables = HashMap::from([
            ("names".to_string(), joined),
            ("count".to_string(), names.len().to_string()),
        ]);
        if let Some(depth) = request.common.depth {
            variables.insert("depth".to_string(), format!("{depth:?}").to_lowercase());
        }

        let mut common = request.common.clone();
        common.prompt_slug = self.config.bulk_prompt_slug.clone();

        let generate_request = GenerateRequest { common, variables };
        match self.generate(generate_request).await {
            Ok(response) => Ok(response),
            Err(AiError::RawResponse(raw_err)) => match lenient_decode_items(&raw_err.raw) {
                Some(recovered) => {
                    warn!(recovered = recovered.as_array().map(|a| a.len()).unwrap_or(0), "bulk search recovered partial items after schema failure");
                    Ok(AiResponse { value: recovered, raw: Some(raw_err.raw.clone()) })
                }
                None => Err(AiError::RawResponse(raw_err)),
            },
            Err(other) => Err(other),
        }
    }

    async fn run(&self, common: &CommonRequest, vars: HashMap<String, String>, default_user_template: &str) -> Result<(Value, Option<String>), AiError> {
        let prompt = self.prompts.get(&common.prompt_slug)?;

        let system = PromptRenderer::render_system(&prompt.system_template, &vars)?;
        let user_template = prompt.user_template_for(common.depth.map(depth_key), default_user_template);
        let user = PromptRenderer::render_user(user_template, &vars)?;

        let resolved = self.providers.resolve(&common.role, &prompt, &common.model_override, common.depth)?;
        let driver_name = resolved.driver.name();

        let tools = if common.use_tools { Some(build_tools(&prompt.tools)) } else { None };
        let mut search_parameters = if common.use_tools && driver_name == "xai" { build_search_parameters(&prompt.tools) } else { None };

        let mut tools = tools;
        if driver_name != "xai" {
            tools = None;
            search_parameters = None;
        } else if search_parameters.is_some() {
            tools = None;
        }

        let response_format = self.choose_response_format(&prompt, driver_name);

        let timeout = effective_timeout(common.timeout_seconds, self.config.default_timeout);

        let request = Request {
            model: resolved.model.clone(),
            messages: vec![
                Message { role: Role::System, content: system },
                Message { role: Role::User, content: user },
            ],
            tools,
            search_parameters,
            response_format: response_format.clone(),
            sampling: Default::default(),
            prompt_slug: prompt.slug.clone(),
            metadata: HashMap::new(),
        };

        let response = self.complete_with_fallback(resolved.driver.clone(), request, response_format, driver_name, timeout).await?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(AiError::Search(SearchError { code: ErrorCode::Error, message: "empty response content".to_string(), details: None }));
        }

        let parsed: Result<Value, _> = serde_json::from_str(&text);
        let value = match parsed {
            Ok(v) => v,
            Err(e) => {
                return Err(AiError::RawResponse(RawResponseError { err: e.to_string(), raw: text, value: None }));
            }
        };

        if let Some(schema) = &prompt.response_schema {
            if let Err(e) = schema::validate(schema, self.schemas.as_ref(), &value) {
                return Err(AiError::RawResponse(RawResponseError { err: e.to_string(), raw: text, value: Some(value) }));
            }
        }

        let raw = if self.config.capture_raw_enabled && common.include_raw {
            Some(truncate(&text, self.config.capture_raw_max_bytes))
        } else {
            None
        };

        Ok((value, raw))
    }

    fn choose_response_format(&self, prompt: &Prompt, driver_name: &str) -> Option<ResponseFormat> {
        if driver_name == "openai" {
            if let Some(schema_spec) = &prompt.response_schema {
                let schema_name = prompt.slug.replace(['-', '.'], "_");
                let schema_value = match schema_spec {
                    ResponseSchema::Inline(v) => Some(v.clone()),
                    ResponseSchema::Ref { reference } => self.schemas.get(reference).cloned(),
                };
                if let Some(schema_value) = schema_value {
                    return Some(ResponseFormat::json_schema(schema_name, schema_value));
                }
            }
        }
        Some(ResponseFormat::json_object())
    }

    /// Issues the completion; if the driver is OpenAI, the format was
    /// `json_schema`, and the call fails with HTTP 400 mentioning
    /// `json_schema`/`response_format`, retries once with `json_object`.
    async fn complete_with_fallback(
        &self,
        driver: Arc<dyn crate::ai::driver::Driver>,
        mut request: Request,
        response_format: Option<ResponseFormat>,
        driver_name: &str,
        timeout: Duration,
    ) -> Result<crate::ai::driver::Response, AiError> {
        let is_json_schema = matches!(response_format, Some(ref f) if f.kind == crate::ai::driver::ResponseFormatKind::JsonSchema);

        match driver.complete(request.clone(), timeout).await {
            Ok(response) => Ok(response),
            Err(DriverError::Provider(ProviderError { status: 400, body })) if driver_name == "openai" && is_json_schema => {
                let lowered = body.to_lowercase();
                if lowered.contains("json_schema") || lowered.contains("response_format") {
                    warn!("downgrading openai json_schema response_format to json_object after 400");
                    request.response_format = Some(ResponseFormat::json_object());
                    driver.complete(request, timeout).await.map_err(classify)
                } else {
                    Err(classify(DriverError::Provider(ProviderError { status: 400, body })))
                }
            }
            Err(e) => Err(classify(e)),
        }
    }
}

fn classify(error: DriverError) -> AiError {
    let code = match &error {
        DriverError::Provider(ProviderError { status, .. }) => match status {
            401 | 403 => ErrorCode::Auth,
            429 => ErrorCode::RateLimit,
            500..=599 => ErrorCode::Unavailable,
            400..=499 => ErrorCode::BadRequest,
            _ => ErrorCode::Error,
        },
        DriverError::Timeout => ErrorCode::Timeout,
        DriverError::Unsupported(_) => ErrorCode::BadRequest,
        DriverError::Transport(_) | DriverError::Decode(_) => ErrorCode::Error,
    };
    AiError::Search(SearchError { code, message: error.to_string(), details: None })
}

fn depth_key(depth: Depth) -> &'static str {
    match depth {
        Depth::Fast => "fast",
        Depth::Quick => "quick",
        Depth::Deep => "deep",
    }
}

fn effective_timeout(requested: Option<u64>, default_timeout: Duration) -> Duration {
    let secs = requested.unwrap_or(default_timeout.as_secs().max(1));
    let secs = secs.min(MAX_TIMEOUT_SECS);
    Duration::from_secs(secs.max(1))
}

fn build_tools(tool_types: &[String]) -> Vec<ToolDefinition> {
    tool_types.iter().map(|t| ToolDefinition { tool_type: t.clone(), config: Value::Null }).collect()
}

/// Maps prompt tool types to xAI search sources: `web_search`/`live_search`
/// → `web`, `x_search` → `x`.
fn build_search_parameters(tool_types: &[String]) -> Option<SearchParameters> {
    let mut sources: Vec<String> = Vec::new();
    for t in tool_types {
        let source = match t.as_str() {
            "web_search" | "live_search" => Some("web"),
            "x_search" => Some("x"),
            _ => None,
        };
        if let Some(source) = source {
            if !sources.iter().any(|s| s == source) {
                sources.push(source.to_string());
            }
        }
    }
    if sources.is_empty() {
        None
    } else {
        Some(SearchParameters { mode: "auto".to_string(), return_citations: true, sources })
    }
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        text.to_string()
    } else {
        let mut end = max_bytes;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }
}

/// Best-effort lenient decode for bulk search fallback: accepts any
/// `items[]` array whose entries carry non-empty `name`/`summary`.
fn lenient_decode_items(raw: &str) -> Option<Value> {
    let parsed: Value = serde_json::from_str(raw).ok()?;
    let items = parsed.get("items")?.as_array()?;

    let recovered: Vec<Value> = items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?;
            let summary = item.get("summary")?.as_str()?;
            if name.trim().is_empty() || summary.trim().is_empty() {
                return None;
            }
            let mut out = serde_json::Map::new();
            out.insert("name".to_string(), Value::String(name.to_string()));
            out.insert("summary".to_string(), Value::String(summary.to_string()));
            if let Some(likely) = item.get("likely_available").and_then(|v| v.as_bool()) {
                out.insert("likely_available".to_string(), Value::Bool(likely));
            }
            if let Some(risk) = item.get("risk_level").and_then(|v| v.as_str()) {
                out.insert("risk_level".to_string(), Value::String(risk.to_string()));
            }
            if let Some(confidence) = item.get("confidence").and_then(|v| v.as_f64()) {
                out.insert("confidence".to_string(), serde_json::json!(confidence));
            }
            Some(Value::Object(out))
        })
        .collect();

    if recovered.is_empty() {
        None
    } else {
        Some(serde_json::json!({ "items": recovered }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_timeout_caps_at_five_minutes() {
        let d = effective_timeout(Some(10_000), Duration::from_secs(60));
        assert_eq!(d, Duration::from_secs(MAX_TIMEOUT_SECS));
    }

    #[test]
    fn effective_timeout_falls_back_to_default() {
        let d = effective_timeout(None, Duration::from_secs(45));
        assert_eq!(d, Duration::from_secs(45));
    }

    #[test]
    fn search_parameters_maps_tool_types_to_xai_sources() {
        let params = build_search_parameters(&["web_search".to_string(), "x_search".to_string(), "live_search".to_string()]).unwrap();
        assert_eq!(params.sources, vec!["web".to_string(), "x".to_string()]);
        assert_eq!(params.mode, "auto");
        assert!(params.return_citations);
    }

    #[test]
    fn no_search_tools_yields_no_search_parameters() {
        assert!(build_search_parameters(&["other".to_string()]).is_none());
    }

    #[test]
    fn lenient_decode_recovers_valid_items_and_skips_incomplete_ones() {
        let raw = serde_json::json!({
            "items": [
                {"name": "a", "summary": "ok", "likely_available": true},
                {"name": "", "summary": "missing name"},
                {"summary": "missing name field entirely"},
            ]
        })
        .to_string();
        let recovered = lenient_decode_items(&raw).unwrap();
        let items = recovered.get("items").unwrap().as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("name").unwrap(), "a");
    }

    #[test]
    fn lenient_decode_returns_none_when_nothing_recoverable() {
        assert!(lenient_decode_items("{\"items\": []}").is_none());
        assert!(lenient_decode_items("not json").is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo";
        let truncated = truncate(s, 2);
        assert!(s.starts_with(&truncated));
    }

    mod scenario_g {
        use super::*;
        use crate::ai::config::{AiConfig, CredentialConfig, ProviderInstanceConfig, SelectionPolicy};
        use crate::ai::driver::{Capabilities, Driver, Response};
        use crate::ai::prompt::{ProviderHints, StaticPromptRegistry};
        use crate::ai::registry::DriverFactory;
        use async_trait::async_trait;
        use std::collections::HashMap as Map;
        use std::sync::Mutex as StdMutex;

        struct RecordingDriver {
            last: StdMutex<Option<Request>>,
        }

        #[async_trait]
        impl Driver for RecordingDriver {
            fn name(&self) -> &'static str {
                "anthropic"
            }
            fn capabilities(&self) -> Capabilities {
                Capabilities { supports_tools: true, supports_search: false, supports_images: false, supports_json_schema: false }
            }
            async fn complete(&self, request: Request, _timeout: Duration) -> Result<Response, DriverError> {
                *self.last.lock().unwrap() = Some(request);
                Ok(Response { content: vec![crate::ai::driver::ContentBlock { text: "{\"ok\":true}".to_string() }], ..Default::default() })
            }
        }

        struct RecordingFactory {
            driver: Arc<RecordingDriver>,
        }

        impl DriverFactory for RecordingFactory {
            fn build(&self, _provider_type: &str, _base_url: Option<&str>, _api_key: &str, _timeout: Duration) -> Result<Arc<dyn Driver>, ResolveError> {
                Ok(self.driver.clone())
            }
        }

        #[tokio::test]
        async fn non_xai_driver_strips_tools_and_search_parameters() {
            let driver = Arc::new(RecordingDriver { last: StdMutex::new(None) });
            let factory = Arc::new(RecordingFactory { driver: driver.clone() });

            let provider = ProviderInstanceConfig {
                enabled: true,
                ai_provider_type: "anthropic".to_string(),
                selection_policy: SelectionPolicy::Priority,
                default_credential: None,
                base_url: None,
                models: Map::from([("default".to_string(), "m1".to_string())]),
                capabilities: vec![],
                roles: vec![],
                credentials: vec![CredentialConfig { enabled: true, label: None, api_key: "key".to_string(), priority: 0 }],
            };
            let ai_config = AiConfig { providers: Map::from([("only".to_string(), provider)]), ..Default::default() };
            let registry = Arc::new(ProviderRegistry::new(ai_config, Duration::from_secs(30), factory));

            let mut prompts = StaticPromptRegistry::new();
            prompts.insert(Prompt {
                slug: "search".to_string(),
                system_template: "be terse".to_string(),
                user_template: Some("{{input}}".to_string()),
                depth_variants: Map::new(),
                tools: vec!["web_search".to_string()],
                required_variables: vec![],
                response_schema: None,
                provider_hints: ProviderHints::default(),
            });

            let service = AiService::new(Arc::new(prompts), registry, Arc::new(crate::ai::schema::StaticSchemaCatalog::new()), AiServiceConfig::default());

            let request = SearchRequest {
                common: CommonRequest { prompt_slug: "search".to_string(), use_tools: true, ..Default::default() },
                name: "example".to_string(),
            };
            service.search(request).await.unwrap();

            let captured = driver.last.lock().unwrap().clone().unwrap();
            assert!(captured.tools.is_none());
            assert!(captured.search_parameters.is_none());
        }
    }
}
