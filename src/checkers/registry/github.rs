use super::RegistryChecker;
use crate::model::{CheckType, Source};
use serde_json::Value;

pub struct GithubChecker {
    base_url: String,
    token: Option<String>,
}

impl GithubChecker {
    pub fn new() -> Self {
        Self { base_url: "https://api.github.com".to_string(), token: None }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl Default for GithubChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryChecker for GithubChecker {
    fn check_type(&self) -> CheckType {
        CheckType::Github
    }

    fn source(&self) -> Source {
        Source::Github
    }

    fn endpoint_host(&self) -> &str {
        "api.github.com"
    }

    fn supports_name(&self, name: &str) -> bool {
        if name.is_empty() || name.len() > 39 {
            return false;
        }
        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return false;
        }
        name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    }

    fn request_url(&self, name: &str) -> String {
        format!("{}/users/{}", self.base_url, name)
    }

    fn apply_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("token {token}")),
            None => builder,
        }
    }

    fn parse_body(&self, body: &Value) -> Vec<(String, Value)> {
        let mut extra = Vec::new();
        if let Some(login) = body.get("login") {
            extra.push(("name".to_string(), login.clone()));
        }
        if let Some(url) = body.get("html_url") {
            extra.push(("url".to_string(), url.clone()));
        }
        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_leading_trailing_and_double_dash() {
        let checker = GithubChecker::new();
        assert!(!checker.supports_name("-octocat"));
        assert!(!checker.supports_name("octocat-"));
        assert!(!checker.supports_name("octo--cat"));
    }

    #[test]
    fn accepts_valid_username() {
        let checker = GithubChecker::new();
        assert!(checker.supports_name("octocat"));
        assert!(checker.supports_name("octo-cat-42"));
    }
}
