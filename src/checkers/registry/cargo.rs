use super::RegistryChecker;
use crate::model::{CheckType, Source, TOOL_VERSION};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap());

pub struct CargoChecker {
    base_url: String,
}

impl CargoChecker {
    pub fn new() -> Self {
        Self { base_url: "https://crates.io".to_string() }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for CargoChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryChecker for CargoChecker {
    fn check_type(&self) -> CheckType {
        CheckType::Cargo
    }

    fn source(&self) -> Source {
        Source::Cargo
    }

    fn endpoint_host(&self) -> &str {
        "crates.io"
    }

    fn supports_name(&self, name: &str) -> bool {
        !name.is_empty() && name.len() <= 64 && NAME_PATTERN.is_match(name)
    }

    fn request_url(&self, name: &str) -> String {
        format!("{}/api/v1/crates/{}", self.base_url, name)
    }

    fn apply_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("User-Agent", format!("namelens/{}", TOOL_VERSION))
    }

    fn parse_body(&self, body: &Value) -> Vec<(String, Value)> {
        let mut extra = Vec::new();
        let krate = body.get("crate");
        if let Some(name) = krate.and_then(|c| c.get("name")) {
            extra.push(("name".to_string(), name.clone()));
        }
        if let Some(version) = krate.and_then(|c| c.get("max_version")) {
            extra.push(("latest_version".to_string(), version.clone()));
        }
        if let Some(description) = krate.and_then(|c| c.get("description")) {
            extra.push(("description".to_string(), description.clone()));
        }
        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_e_numeric_leading_char_is_invalid() {
        let checker = CargoChecker::new();
        assert!(!checker.supports_name("1crate"));
    }

    #[test]
    fn valid_name_passes() {
        let checker = CargoChecker::new();
        assert!(checker.supports_name("serde_json"));
    }
}
