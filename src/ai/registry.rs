//! Resolves `(role, prompt, model_override, depth)` into a concrete driver,
//! model, and credential (spec §4.6).

use crate::ai::config::{AiConfig, CredentialConfig, Depth, ProviderInstanceConfig, SelectionPolicy};
use crate::ai::driver::Driver;
use crate::ai::prompt::Prompt;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("provider {0} is disabled")]
    ProviderDisabled(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("no enabled providers configured")]
    NoEnabledProviders,
    #[error("no provider routing configured")]
    NoProviderRouting,
    #[error("unsupported ai_provider_type: {0}")]
    UnsupportedProviderType(String),
    #[error("model not configured")]
    ModelNotConfigured,
}

pub struct ResolvedProvider {
    pub provider_id: String,
    pub provider_cfg: ProviderInstanceConfig,
    pub credential: CredentialConfig,
    pub driver: Arc<dyn Driver>,
    pub model: String,
    pub base_url: Option<String>,
}

/// Factory for turning an `ai_provider_type` + base URL + API key into a
/// driver instance. Kept separate from `ProviderRegistry` so drivers stay
/// pluggable without the registry knowing about `reqwest::Client` wiring.
pub trait DriverFactory: Send + Sync {
    fn build(&self, provider_type: &str, base_url: Option<&str>, api_key: &str, timeout: Duration) -> Result<Arc<dyn Driver>, ResolveError>;
}

pub struct ProviderRegistry {
    config: AiConfig,
    default_timeout: Duration,
    factory: Arc<dyn DriverFactory>,
    driver_cache: RwLock<HashMap<String, Arc<dyn Driver>>>,
    round_robin_counters: RwLock<HashMap<String, usize>>,
}

impl ProviderRegistry {
    pub fn new(config: AiConfig, default_timeout: Duration, factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            config,
            default_timeout,
            factory,
            driver_cache: RwLock::new(HashMap::new()),
            round_robin_counters: RwLock::new(HashMap::new()),
        }
    }

    fn resolve_provider_id(&self, role: &str) -> Result<String, ResolveError> {
        if !role.is_empty() {
            if let Some(slug) = self.config.routing.get(role) {
                let provider = self
                    .config
                    .providers
                    .get(slug)
                    .ok_or_else(|| ResolveError::UnknownProvider(slug.clone()))?;
                if !provider.enabled {
                    return Err(ResolveError::ProviderDisabled(slug.clone()));
                }
                return Ok(slug.clone());
            }

            if let Some((slug, _)) = self
                .config
                .providers
                .iter()
                .find(|(_, cfg)| cfg.enabled && cfg.supports_role(role))
            {
                return Ok(slug.clone());
            }
        }

        if let Some(slug) = &self.config.default_provider {
            let provider = self
                .config
                .providers
                .get(slug)
                .ok_or_else(|| ResolveError::UnknownProvider(slug.clone()))?;
            if !provider.enabled {
                return Err(ResolveError::ProviderDisabled(slug.clone()));
            }
            return Ok(slug.clone());
        }

        let enabled: Vec<&String> = self.config.providers.iter().filter(|(_, cfg)| cfg.enabled).map(|(slug, _)| slug).collect();
        match enabled.len() {
            0 => Err(ResolveError::NoEnabledProviders),
            1 => Ok(enabled[0].clone()),
            _ => Err(ResolveError::NoProviderRouting),
        }
    }

    fn select_credential(&self, provider_id: &str, provider: &ProviderInstanceConfig) -> CredentialConfig {
        let usable: Vec<&CredentialConfig> = provider.credentials.iter().filter(|c| c.is_usable()).collect();
        if usable.is_empty() {
            // No usable credential: the resolved key must be label-or-"0", not
            // the normal "p<priority>" fallback `credential_key` uses elsewhere.
            return match provider.credentials.first().cloned() {
                Some(c) if c.label.is_some() => c,
                Some(mut c) => {
                    c.label = Some("0".to_string());
                    c
                }
                None => CredentialConfig { enabled: false, label: Some("0".to_string()), api_key: String::new(), priority: 0 },
            };
        }

        if let Some(default_label) = &provider.default_credential {
            if let Some(found) = usable.iter().find(|c| {
                c.label.as_deref().map(|l| l.trim().eq_ignore_ascii_case(default_label.trim())).unwrap_or(false)
            }) {
                return (*found).clone();
            }
        }

        let max_priority = usable.iter().map(|c| c.priority).max().unwrap_or(0);
        let tie_set: Vec<&CredentialConfig> = usable.into_iter().filter(|c| c.priority == max_priority).collect();

        match provider.selection_policy {
            SelectionPolicy::Priority => tie_set[0].clone(),
            SelectionPolicy::RoundRobin => {
                let key = format!("{provider_id}:{max_priority}");
                let mut counters = self.round_robin_counters.write().unwrap();
                let index = counters.entry(key).or_insert(0);
                let chosen = tie_set[*index % tie_set.len()].clone();
                *index += 1;
                chosen
            }
        }
    }

    fn resolve_model(&self, provider: &ProviderInstanceConfig, prompt: &Prompt, model_override: &str, depth: Option<Depth>) -> Result<String, ResolveError> {
        if !model_override.is_empty() {
            return Ok(model_override.to_string());
        }

        let tier = depth.map(Depth::tier).unwrap_or("default");
        if let Some(model) = provider.models.get(tier) {
            return Ok(model.clone());
        }

        if let Some(preferred) = prompt.provider_hints.preferred_models.first() {
            return Ok(preferred.to_string());
        }

        provider.models.get("default").cloned().ok_or(ResolveError::ModelNotConfigured)
    }

    fn driver_for(&self, provider_id: &str, credential_key: &str, provider_type: &str, base_url: Option<&str>, api_key: &str) -> Result<Arc<dyn Driver>, ResolveError> {
        let cache_key = format!("{provider_id}:{credential_key}");
        if let Some(driver) = self.driver_cache.read().unwrap().get(&cache_key) {
            return Ok(driver.clone());
        }

        let driver = self.factory.build(provider_type, base_url, api_key, self.default_timeout)?;
        self.driver_cache.write().unwrap().insert(cache_key, driver.clone());
        Ok(driver)
    }

    pub fn resolve(&self, role: &str, prompt: &Prompt, model_override: &str, depth: Option<Depth>) -> Result<ResolvedProvider, ResolveError> {
        let provider_id = self.resolve_provider_id(role)?;
        let provider_cfg = self.config.providers.get(&provider_id).expect("resolved provider id must exist").clone();

        let credential = self.select_credential(&provider_id, &provider_cfg);
        let credential_key = credential.credential_key();
        let model = self.resolve_model(&provider_cfg, prompt, model_override, depth)?;

        let driver = self.driver_for(&provider_id, &credential_key, &provider_cfg.ai_provider_type, provider_cfg.base_url.as_deref(), &credential.api_key)?;

        debug!(provider = %provider_id, credential = %credential_key, model = %model, "resolved ai provider");

        Ok(ResolvedProvider { provider_id, base_url: provider_cfg.base_url.clone(), provider_cfg, credential, driver, model })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::driver::{Capabilities, DriverError, Request, Response};
    use async_trait::async_trait;

    struct StubDriver(&'static str);

    #[async_trait]
    impl Driver for StubDriver {
        fn name(&self) -> &'static str {
            self.0
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities { supports_tools: true, supports_search: self.0 == "xai", supports_images: false, supports_json_schema: self.0 == "openai" }
        }
        async fn complete(&self, _request: Request, _timeout: Duration) -> Result<Response, DriverError> {
            Ok(Response::default())
        }
    }

    struct StubFactory;

    impl DriverFactory for StubFactory {
        fn build(&self, provider_type: &str, _base_url: Option<&str>, _api_key: &str, _timeout: Duration) -> Result<Arc<dyn Driver>, ResolveError> {
            match provider_type {
                "openai" => Ok(Arc::new(StubDriver("openai"))),
                "xai" => Ok(Arc::new(StubDriver("xai"))),
                other => Err(ResolveError::UnsupportedProviderType(other.to_string())),
            }
        }
    }

    fn provider(enabled: bool, ai_provider_type: &str) -> ProviderInstanceConfig {
        ProviderInstanceConfig {
            enabled,
            ai_provider_type: ai_provider_type.to_string(),
            selection_policy: SelectionPolicy::Priority,
            default_credential: None,
            base_url: None,
            models: HashMap::from([("default".to_string(), "m-default".to_string()), ("reasoning".to_string(), "m-reasoning".to_string())]),
            capabilities: vec![],
            roles: vec!["search".to_string()],
            credentials: vec![CredentialConfig { enabled: true, label: None, api_key: "key".to_string(), priority: 0 }],
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            slug: "search".to_string(),
            system_template: "be terse".to_string(),
            user_template: Some("{{input}}".to_string()),
            depth_variants: HashMap::new(),
            tools: vec![],
            required_variables: vec![],
            response_schema: None,
            provider_hints: crate::ai::prompt::ProviderHints { preferred_models: crate::ai::config::PreferredModels(vec!["prompt-model".to_string()]) },
        }
    }

    #[test]
    fn single_enabled_provider_resolves_without_routing() {
        let config = AiConfig { providers: HashMap::from([("only".to_string(), provider(true, "openai"))]), ..Default::default() };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        let resolved = registry.resolve("", &prompt(), "", None).unwrap();
        assert_eq!(resolved.provider_id, "only");
        assert_eq!(resolved.driver.name(), "openai");
    }

    #[test]
    fn zero_enabled_providers_is_an_error() {
        let config = AiConfig::default();
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        assert_eq!(registry.resolve("", &prompt(), "", None), Err(ResolveError::NoEnabledProviders));
    }

    #[test]
    fn two_enabled_providers_without_routing_is_an_error() {
        let config = AiConfig {
            providers: HashMap::from([("a".to_string(), provider(true, "openai")), ("b".to_string(), provider(true, "xai"))]),
            ..Default::default()
        };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        assert_eq!(registry.resolve("", &prompt(), "", None), Err(ResolveError::NoProviderRouting));
    }

    #[test]
    fn model_override_wins_scenario_f_style() {
        let config = AiConfig { providers: HashMap::from([("only".to_string(), provider(true, "openai"))]), ..Default::default() };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        let resolved = registry.resolve("", &prompt(), "override-model", None).unwrap();
        assert_eq!(resolved.model, "override-model");
    }

    #[test]
    fn scenario_f_deep_depth_prefers_reasoning_tier() {
        let config = AiConfig { providers: HashMap::from([("only".to_string(), provider(true, "openai"))]), ..Default::default() };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        let resolved = registry.resolve("", &prompt(), "", Some(Depth::Deep)).unwrap();
        assert_eq!(resolved.model, "m-reasoning");
    }

    #[test]
    fn model_falls_back_to_prompt_preferred_then_default() {
        let mut cfg = provider(true, "openai");
        cfg.models.remove("reasoning");
        let config = AiConfig { providers: HashMap::from([("only".to_string(), cfg)]), ..Default::default() };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        let resolved = registry.resolve("", &prompt(), "", Some(Depth::Deep)).unwrap();
        assert_eq!(resolved.model, "prompt-model");
    }

    #[test]
    fn no_depth_uses_configured_default_tier_over_prompt_preferred() {
        let config = AiConfig { providers: HashMap::from([("only".to_string(), provider(true, "openai"))]), ..Default::default() };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        let resolved = registry.resolve("", &prompt(), "", None).unwrap();
        assert_eq!(resolved.model, "m-default");
    }

    #[test]
    fn no_usable_credential_resolves_key_to_zero() {
        let mut cfg = provider(true, "openai");
        cfg.credentials = vec![CredentialConfig { enabled: true, label: None, api_key: String::new(), priority: 0 }];
        let config = AiConfig { providers: HashMap::from([("only".to_string(), cfg)]), ..Default::default() };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        let resolved = registry.resolve("", &prompt(), "", None).unwrap();
        assert_eq!(resolved.credential.credential_key(), "0");
    }

    #[test]
    fn disabled_routed_provider_is_rejected() {
        let mut cfg = provider(false, "openai");
        cfg.roles = vec![];
        let config = AiConfig {
            providers: HashMap::from([("disabled".to_string(), cfg)]),
            routing: HashMap::from([("search".to_string(), "disabled".to_string())]),
            ..Default::default()
        };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));
        assert_eq!(registry.resolve("search", &prompt(), "", None), Err(ResolveError::ProviderDisabled("disabled".to_string())));
    }

    #[test]
    fn round_robin_cycles_through_tie_set() {
        let mut cfg = provider(true, "openai");
        cfg.selection_policy = SelectionPolicy::RoundRobin;
        cfg.credentials = vec![
            CredentialConfig { enabled: true, label: Some("a".to_string()), api_key: "ka".to_string(), priority: 1 },
            CredentialConfig { enabled: true, label: Some("b".to_string()), api_key: "kb".to_string(), priority: 1 },
        ];
        let config = AiConfig { providers: HashMap::from([("only".to_string(), cfg)]), ..Default::default() };
        let registry = ProviderRegistry::new(config, Duration::from_secs(30), Arc::new(StubFactory));

        let first = registry.resolve("", &prompt(), "", None).unwrap();
        let second = registry.resolve("", &prompt(), "", None).unwrap();
        assert_ne!(first.credential.credential_key(), second.credential.credential_key());
    }
}
