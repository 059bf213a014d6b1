use super::RegistryChecker;
use crate::model::{CheckType, Source};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap());

pub struct PypiChecker {
    base_url: String,
}

impl PypiChecker {
    pub fn new() -> Self {
        Self { base_url: "https://pypi.org".to_string() }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for PypiChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryChecker for PypiChecker {
    fn check_type(&self) -> CheckType {
        CheckType::Pypi
    }

    fn source(&self) -> Source {
        Source::Pypi
    }

    fn endpoint_host(&self) -> &str {
        "pypi.org"
    }

    fn supports_name(&self, name: &str) -> bool {
        !name.is_empty() && name.len() <= 200 && NAME_PATTERN.is_match(name)
    }

    fn request_url(&self, name: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, name)
    }

    fn parse_body(&self, body: &Value) -> Vec<(String, Value)> {
        let mut extra = Vec::new();
        let info = body.get("info");
        if let Some(name) = info.and_then(|i| i.get("name")) {
            extra.push(("name".to_string(), name.clone()));
        }
        if let Some(version) = info.and_then(|i| i.get("version")) {
            extra.push(("latest_version".to_string(), version.clone()));
        }
        if let Some(summary) = info.and_then(|i| i.get("summary")) {
            extra.push(("summary".to_string(), summary.clone()));
        }
        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        let checker = PypiChecker::new();
        assert!(checker.supports_name("requests"));
        assert!(checker.supports_name("my.package-1"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let checker = PypiChecker::new();
        assert!(!checker.supports_name(""));
        assert!(!checker.supports_name("Has_Upper"));
    }
}
