//! Prompt definitions and the registry that resolves them by slug (spec §3, §4.7).

use crate::ai::config::PreferredModels;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderHints {
    #[serde(default)]
    pub preferred_models: PreferredModels,
}

/// A response schema either embedded inline or referenced by id through a
/// `SchemaCatalog`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResponseSchema {
    Ref { #[serde(rename = "$ref")] reference: String },
    Inline(Value),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Prompt {
    pub slug: String,
    pub system_template: String,
    #[serde(default)]
    pub user_template: Option<String>,
    /// Depth-specific user template variants, e.g. `"deep" -> "..."`.
    #[serde(default)]
    pub depth_variants: HashMap<String, String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub required_variables: Vec<String>,
    #[serde(default)]
    pub response_schema: Option<ResponseSchema>,
    #[serde(default)]
    pub provider_hints: ProviderHints,
}

impl Prompt {
    /// Picks the depth variant if present, else `user_template`, else `default`.
    pub fn user_template_for(&self, depth: Option<&str>, default: &str) -> &str {
        if let Some(depth) = depth {
            if let Some(variant) = self.depth_variants.get(depth) {
                return variant;
            }
        }
        self.user_template.as_deref().unwrap_or(default)
    }
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt not found: {0}")]
    NotFound(String),
}

/// Source of truth for prompt definitions, keyed by unique slug.
pub trait PromptRegistry: Send + Sync {
    fn get(&self, slug: &str) -> Result<Prompt, PromptError>;
}

/// In-memory registry backed by a `HashMap`, suitable for prompts loaded
/// from `prompts_dir` at startup.
#[derive(Default)]
pub struct StaticPromptRegistry {
    prompts: HashMap<String, Prompt>,
}

impl StaticPromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prompt: Prompt) {
        self.prompts.insert(prompt.slug.clone(), prompt);
    }
}

impl PromptRegistry for StaticPromptRegistry {
    fn get(&self, slug: &str) -> Result<Prompt, PromptError> {
        self.prompts.get(slug).cloned().ok_or_else(|| PromptError::NotFound(slug.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_prompt() -> Prompt {
        Prompt {
            slug: "search".to_string(),
            system_template: "be terse".to_string(),
            user_template: Some("{{input}}".to_string()),
            depth_variants: HashMap::from([("deep".to_string(), "deeply: {{input}}".to_string())]),
            tools: vec![],
            required_variables: vec![],
            response_schema: None,
            provider_hints: ProviderHints::default(),
        }
    }

    #[test]
    fn depth_variant_wins_over_default_template() {
        let prompt = sample_prompt();
        assert_eq!(prompt.user_template_for(Some("deep"), "fallback"), "deeply: {{input}}");
        assert_eq!(prompt.user_template_for(Some("fast"), "fallback"), "{{input}}");
    }

    #[test]
    fn registry_roundtrips_by_slug() {
        let mut registry = StaticPromptRegistry::new();
        registry.insert(sample_prompt());
        assert_eq!(registry.get("search").unwrap().slug, "search");
        assert!(matches!(registry.get("missing"), Err(PromptError::NotFound(_))));
    }
}
