//! Provider/credential configuration surface (spec §3, §6 configuration keys).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Selection policy used to pick among a provider's usable credentials when
/// more than one sits at the same priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    Priority,
    RoundRobin,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::Priority
    }
}

/// Depth tier a request resolves to before model lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Fast,
    Quick,
    Deep,
}

impl Depth {
    /// Maps a depth to the model tier key used in `ProviderInstanceConfig::models`.
    pub fn tier(self) -> &'static str {
        match self {
            Depth::Fast => "fast",
            Depth::Deep => "reasoning",
            Depth::Quick => "default",
        }
    }
}

/// `provider_hints.preferred_models` may arrive as a bare string, a list of
/// strings, or (from looser upstream JSON) a list with non-string entries
/// mixed in. Parsed once at load time into this tagged form so every other
/// call site deals with a plain `Vec<String>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreferredModels(pub Vec<String>);

impl PreferredModels {
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

impl<'de> Deserialize<'de> for PreferredModels {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<serde_json::Value>),
        }

        let raw = Raw::deserialize(deserializer)?;
        let models = match raw {
            Raw::One(s) => vec![s],
            Raw::Many(values) => values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        };
        Ok(PreferredModels(models))
    }
}

/// One configured credential within a provider. `Debug` redacts `api_key` so
/// config dumps and error messages never leak it.
#[derive(Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub priority: i32,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("enabled", &self.enabled)
            .field("label", &self.label)
            .field("api_key", &if self.api_key.is_empty() { "[empty]" } else { "[REDACTED]" })
            .field("priority", &self.priority)
            .finish()
    }
}

impl CredentialConfig {
    /// Usable iff it is (labeled and enabled) or unlabeled, and carries a key.
    pub fn is_usable(&self) -> bool {
        let enabled_or_unlabeled = self.label.is_none() || self.enabled;
        enabled_or_unlabeled && !self.api_key.is_empty()
    }

    /// Key used for driver caching: the label if present, else `"p<priority>"`.
    pub fn credential_key(&self) -> String {
        match &self.label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("p{}", self.priority),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Configuration for a single named provider instance (e.g. `"openai-prod"`).
#[derive(Clone, Deserialize, Serialize)]
pub struct ProviderInstanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub ai_provider_type: String,
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
    #[serde(default)]
    pub default_credential: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub models: HashMap<String, String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
}

impl std::fmt::Debug for ProviderInstanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderInstanceConfig")
            .field("enabled", &self.enabled)
            .field("ai_provider_type", &self.ai_provider_type)
            .field("selection_policy", &self.selection_policy)
            .field("default_credential", &self.default_credential)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("capabilities", &self.capabilities)
            .field("roles", &self.roles)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl ProviderInstanceConfig {
    pub fn supports_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Top-level AI provider configuration surface (spec §6).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default)]
    pub default_provider: Option<String>,
    #[serde(default)]
    pub default_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub cache_ttl_seconds: Option<u64>,
    #[serde(default)]
    pub prompts_dir: Option<String>,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderInstanceConfig>,
    #[serde(default)]
    pub routing: HashMap<String, String>,
    #[serde(default)]
    pub fallbacks: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub capture_raw_enabled: bool,
    #[serde(default)]
    pub capture_raw_max_bytes: Option<usize>,
}
