use super::RegistryChecker;
use crate::model::{CheckType, Source};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap());

pub struct NpmChecker {
    base_url: String,
}

impl NpmChecker {
    pub fn new() -> Self {
        Self { base_url: "https://registry.npmjs.org".to_string() }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for NpmChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryChecker for NpmChecker {
    fn check_type(&self) -> CheckType {
        CheckType::Npm
    }

    fn source(&self) -> Source {
        Source::Npm
    }

    fn endpoint_host(&self) -> &str {
        "registry.npmjs.org"
    }

    fn supports_name(&self, name: &str) -> bool {
        !name.is_empty() && name.len() <= 214 && !name.contains('/') && NAME_PATTERN.is_match(name)
    }

    fn request_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn parse_body(&self, body: &Value) -> Vec<(String, Value)> {
        let mut extra = Vec::new();
        if let Some(name) = body.get("name") {
            extra.push(("name".to_string(), name.clone()));
        }
        if let Some(latest) = body.get("dist-tags").and_then(|t| t.get("latest")) {
            extra.push(("latest_version".to_string(), latest.clone()));
        }
        if let Some(description) = body.get("description") {
            extra.push(("description".to_string(), description.clone()));
        }
        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        let checker = NpmChecker::new();
        assert!(checker.supports_name("express"));
        assert!(checker.supports_name("my-package_1.0"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let checker = NpmChecker::new();
        assert!(!checker.supports_name(""));
        assert!(!checker.supports_name("has/slash"));
        assert!(!checker.supports_name("-leading-dash"));
    }
}
