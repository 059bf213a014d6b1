//! Shared data model for availability checks (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default tool version reported in provenance and User-Agent headers.
pub const TOOL_VERSION: &str = match option_env!("CARGO_PKG_VERSION") {
    Some(v) => v,
    None => "unknown",
};

/// Availability tag for a single namespace check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Unknown,
    Available,
    Taken,
    Error,
    RateLimited,
    Unsupported,
}

/// Which namespace a check targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Domain,
    Npm,
    Pypi,
    Cargo,
    Github,
}

impl CheckType {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::Domain => "domain",
            CheckType::Npm => "npm",
            CheckType::Pypi => "pypi",
            CheckType::Cargo => "cargo",
            CheckType::Github => "github",
        }
    }
}

/// Provenance source tag — distinct from `CheckType` because a domain check
/// may resolve via rdap, whois, or dns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Rdap,
    Whois,
    Dns,
    Npm,
    Pypi,
    Cargo,
    Github,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Rdap => "rdap",
            Source::Whois => "whois",
            Source::Dns => "dns",
            Source::Npm => "npm",
            Source::Pypi => "pypi",
            Source::Cargo => "cargo",
            Source::Github => "github",
        }
    }
}

/// Metadata attached to every `CheckResult` (spec §3 Provenance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub check_id: String,
    pub requested_at: i64,
    pub resolved_at: i64,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_expires_at: Option<i64>,
    pub tool_version: String,
}

impl Provenance {
    /// Starts a fresh provenance record with a new check id and `requested_at = now`.
    pub fn new(source: Source) -> Self {
        let now = now_millis();
        Self {
            check_id: uuid::Uuid::new_v4().to_string(),
            requested_at: now,
            resolved_at: now,
            source,
            server: None,
            from_cache: false,
            cache_expires_at: None,
            tool_version: TOOL_VERSION.to_string(),
        }
    }

    pub fn finish(mut self) -> Self {
        self.resolved_at = now_millis();
        self
    }
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A single namespace availability result (spec §3 CheckResult).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub check_type: CheckType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tld: Option<String>,
    pub available: Availability,
    pub status_code: u16,
    pub message: String,
    #[serde(default)]
    pub extra_data: HashMap<String, serde_json::Value>,
    pub provenance: Provenance,
}

impl CheckResult {
    pub fn new(
        name: impl Into<String>,
        check_type: CheckType,
        available: Availability,
        status_code: u16,
        message: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            name: name.into(),
            check_type,
            tld: None,
            available,
            status_code,
            message: message.into(),
            extra_data: HashMap::new(),
            provenance: provenance.finish(),
        }
    }

    pub fn with_tld(mut self, tld: impl Into<String>) -> Self {
        self.tld = Some(tld.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_data.insert(key.into(), value);
        self
    }
}

/// Per-endpoint rate limit bookkeeping (spec §3 RateLimitState).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitState {
    pub request_count: u32,
    pub window_start: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_until: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_429_at: Option<i64>,
}

/// TLD -> ordered RDAP server list, plus bootstrap publication metadata
/// (spec §3 BootstrapEntry).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub tld_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_requested_before_resolved() {
        let p = Provenance::new(Source::Rdap).finish();
        assert!(p.requested_at <= p.resolved_at);
        assert!(!p.check_id.is_empty());
        assert!(!p.tool_version.is_empty());
    }

    #[test]
    fn check_result_source_tags_round_trip() {
        for src in [Source::Rdap, Source::Whois, Source::Dns, Source::Npm, Source::Pypi, Source::Cargo, Source::Github] {
            let s = serde_json::to_string(&src).unwrap();
            let back: Source = serde_json::from_str(&s).unwrap();
            assert_eq!(back.as_str(), src.as_str());
        }
    }
}
