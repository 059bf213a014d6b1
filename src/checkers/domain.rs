//! DomainChecker: the RDAP → WHOIS → DNS fallback ladder (spec §4.4).
//!
//! Modeled as an explicit `Probe -> Answer | NextLevel` state machine per
//! the Design Notes rather than nested conditionals: each private
//! `try_*` method owns its own cache admissibility, provenance stamping,
//! and TTL choice.

use crate::cache_policy::CachePolicy;
use crate::checkers::dns::DnsProbe;
use crate::checkers::rdap::{RdapOutcome, RdapProbe};
use crate::checkers::whois::{self, WhoisResolver};
use crate::checkers::{last_label_tld, CheckerError};
use crate::model::{Availability, CheckResult, CheckType, Provenance, Source};
use crate::rate_limit::RateLimiter;
use crate::store::{BootstrapStore, ResultCache, Store};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-TLD and per-subsystem configuration the ladder consults.
pub struct DomainConfig {
    pub rdap_overrides: HashMap<String, Vec<String>>,
    pub whois_server_overrides: HashMap<String, String>,
    /// `None` = WHOIS allowed for every TLD.
    pub whois_allowed_tlds: Option<HashSet<String>>,
    pub dns_fallback_enabled: bool,
    pub whois_cache_ttl: Option<Duration>,
    pub dns_cache_ttl: Option<Duration>,
    pub whois_connect_timeout: Duration,
    pub whois_read_timeout: Duration,
}

impl Default for DomainConfig {
    fn default() -> Self {
        let mut rdap_overrides = HashMap::new();
        rdap_overrides.insert(
            "app".to_string(),
            vec!["https://pubapi.registry.google/rdap/".to_string(), "https://rdap.net/".to_string()],
        );
        rdap_overrides.insert(
            "dev".to_string(),
            vec!["https://pubapi.registry.google/rdap/".to_string(), "https://rdap.net/".to_string()],
        );
        Self {
            rdap_overrides,
            whois_server_overrides: HashMap::new(),
            whois_allowed_tlds: None,
            dns_fallback_enabled: true,
            whois_cache_ttl: None,
            dns_cache_ttl: None,
            whois_connect_timeout: Duration::from_secs(5),
            whois_read_timeout: Duration::from_secs(10),
        }
    }
}

impl DomainConfig {
    fn whois_allowed(&self, tld: &str) -> bool {
        match &self.whois_allowed_tlds {
            None => true,
            Some(set) => set.contains(tld),
        }
    }
}

pub struct DomainChecker<S: Store> {
    store: Arc<S>,
    rate_limiter: RateLimiter<S>,
    cache_policy: CachePolicy,
    rdap_probe: RdapProbe,
    whois_resolver: WhoisResolver,
    dns_probe: Option<DnsProbe>,
    config: DomainConfig,
}

impl<S: Store> DomainChecker<S> {
    pub fn new(store: Arc<S>, client: reqwest::Client, cache_policy: CachePolicy, config: DomainConfig) -> Self {
        let rate_limiter = RateLimiter::new(store.clone());
        let whois_resolver = WhoisResolver::new(config.whois_connect_timeout, config.whois_read_timeout);
        let dns_probe = if config.dns_fallback_enabled { DnsProbe::new().ok() } else { None };
        Self {
            store,
            rate_limiter,
            cache_policy,
            rdap_probe: RdapProbe::new(client),
            whois_resolver,
            dns_probe,
            config,
        }
    }

    pub async fn check(&self, name: &str) -> Result<CheckResult, CheckerError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() || !name.contains('.') {
            return Err(CheckerError::InvalidName(name));
        }
        let tld = last_label_tld(&name).ok_or_else(|| CheckerError::InvalidName(name.clone()))?.to_string();

        if let Some(cached) = self.try_cache(&name, &tld).await {
            return Ok(cached);
        }

        let override_servers = self.config.rdap_overrides.get(&tld).cloned();
        let servers = match &override_servers {
            Some(servers) => servers.clone(),
            None => self.store.get_servers(&tld).await,
        };

        if !servers.is_empty() {
            let result = self.try_rdap(&name, &tld, &servers).await;
            self.maybe_cache(&name, &tld, &result).await;
            return Ok(result);
        }

        if self.config.whois_allowed(&tld) {
            let result = self.try_whois(&name, &tld).await;
            self.maybe_cache(&name, &tld, &result).await;
            return Ok(result);
        }

        if self.config.dns_fallback_enabled && self.dns_probe.is_some() {
            let result = self.try_dns(&name, &tld).await;
            self.maybe_cache(&name, &tld, &result).await;
            return Ok(result);
        }

        let provenance = Provenance::new(Source::Rdap);
        Ok(CheckResult::new(&name, CheckType::Domain, Availability::Unsupported, 0, "no rdap server for tld", provenance)
            .with_tld(tld))
    }

    async fn try_cache(&self, name: &str, tld: &str) -> Option<CheckResult> {
        let cached = self.store.get(name, CheckType::Domain, Some(tld)).await?;
        let source = cached.provenance.source;
        let admissible = match source {
            Source::Rdap => true,
            Source::Whois => self.config.whois_allowed(tld),
            Source::Dns => self.config.dns_fallback_enabled,
            _ => false,
        };
        if !admissible {
            return None;
        }

        let mut result = cached;
        result.provenance = Provenance::new(source).finish();
        result.provenance.from_cache = true;
        if let Some(server) = result.extra_data.get("resolution_server").and_then(|v| v.as_str()) {
            result.provenance.server = Some(server.to_string());
        }
        debug!(name, tld, ?source, "served from cache");
        Some(result)
    }

    async fn maybe_cache(&self, name: &str, tld: &str, result: &CheckResult) {
        let source = result.provenance.source;
        if !self.cache_policy.is_cache_admissible(source, result.available) {
            return;
        }
        let ttl = match source {
            Source::Whois => self.config.whois_cache_ttl.unwrap_or_else(|| self.cache_policy.ttl_for(result.available, None)),
            Source::Dns => self.config.dns_cache_ttl.unwrap_or_else(|| self.cache_policy.ttl_for(result.available, None)),
            _ => self.cache_policy.ttl_for(result.available, None),
        };
        self.store.put(name, CheckType::Domain, Some(tld), result.clone(), ttl.as_secs()).await;
    }

    async fn try_rdap(&self, name: &str, tld: &str, servers: &[String]) -> CheckResult {
        let mut last: Option<CheckResult> = None;

        for server in servers {
            let admission = self.rate_limiter.allow(server).await;
            if !admission.allowed {
                last = Some(self.rdap_result(name, tld, server, Availability::RateLimited, 429, "rate limited", None));
                continue;
            }
            self.rate_limiter.record(server).await;

            match self.rdap_probe.query(server, name).await {
                Ok(RdapOutcome::Available) => {
                    return self.rdap_result(name, tld, server, Availability::Available, 404, "available", None);
                }
                Ok(RdapOutcome::Taken(domain)) => {
                    return self.rdap_result(name, tld, server, Availability::Taken, 200, "taken", Some(domain));
                }
                Ok(RdapOutcome::RateLimited(retry_after)) => {
                    if let Some(retry_after) = retry_after {
                        self.rate_limiter.record_429(server, Some(retry_after)).await;
                    }
                    last = Some(self.rdap_result(name, tld, server, Availability::RateLimited, 429, "rate limited", None));
                }
                Ok(RdapOutcome::Unexpected(status)) if status >= 500 => {
                    last = Some(self.rdap_result(name, tld, server, Availability::Error, status, "server error", None));
                }
                Ok(RdapOutcome::Unexpected(_)) => {
                    last = Some(self.rdap_result(name, tld, server, Availability::Unknown, 0, "unexpected response", None));
                }
                Err(e) => {
                    last = Some(self.rdap_result(name, tld, server, Availability::Error, 0, &e.to_string(), None));
                }
            }
        }

        last.unwrap_or_else(|| {
            let provenance = Provenance::new(Source::Rdap);
            CheckResult::new(name, CheckType::Domain, Availability::Error, 0, "no rdap servers responded successfully", provenance)
                .with_tld(tld)
        })
    }

    fn rdap_result(
        &self,
        name: &str,
        tld: &str,
        server: &str,
        available: Availability,
        status: u16,
        message: &str,
        domain: Option<crate::checkers::rdap::RdapDomain>,
    ) -> CheckResult {
        let mut provenance = Provenance::new(Source::Rdap);
        provenance.server = Some(server.to_string());
        let mut result = CheckResult::new(name, CheckType::Domain, available, status, message, provenance)
            .with_tld(tld)
            .with_extra("resolution_source", json!("rdap"))
            .with_extra("resolution_server", json!(server));

        if let Some(domain) = domain {
            result = result
                .with_extra("status", json!(domain.status))
                .with_extra("name_servers", json!(domain.name_servers));
            if let Some(registrar) = domain.registrar {
                result = result.with_extra("registrar", json!(registrar));
            }
            if let Some(expiration) = domain.expiration_date {
                result = result.with_extra("expiration", json!(expiration));
            }
        }
        result
    }

    async fn try_whois(&self, name: &str, tld: &str) -> CheckResult {
        let override_server = self.config.whois_server_overrides.get(tld).map(|s| s.as_str());
        let server = match self.whois_resolver.resolve_server(tld, override_server).await {
            Some(server) => server,
            None => {
                let provenance = Provenance::new(Source::Whois);
                return CheckResult::new(name, CheckType::Domain, Availability::Unknown, 0, "no whois server found", provenance)
                    .with_tld(tld)
                    .with_extra("resolution_source", json!("whois"));
            }
        };

        let key = whois::limiter_key(Some(&server));
        let admission = self.rate_limiter.allow(&key).await;
        if !admission.allowed {
            let mut provenance = Provenance::new(Source::Whois);
            provenance.server = Some(server.clone());
            return CheckResult::new(name, CheckType::Domain, Availability::RateLimited, 429, "rate limited", provenance)
                .with_tld(tld)
                .with_extra("resolution_source", json!("whois"))
                .with_extra("resolution_server", json!(server));
        }
        self.rate_limiter.record(&key).await;

        match self.whois_resolver.check(&server, name).await {
            Ok(outcome) => {
                let mut provenance = Provenance::new(Source::Whois);
                provenance.server = Some(outcome.server.clone());
                let message = match outcome.available {
                    Availability::Available => "whois: available",
                    Availability::Taken => "whois: taken",
                    _ => "whois: ambiguous body",
                };
                CheckResult::new(name, CheckType::Domain, outcome.available, 0, message, provenance)
                    .with_tld(tld)
                    .with_extra("resolution_source", json!("whois"))
                    .with_extra("resolution_server", json!(outcome.server))
                    .with_extra("whois_server", json!(outcome.server))
                    .with_extra("whois_raw_hash", json!(outcome.raw_hash))
            }
            Err(e) => {
                let text = e.to_string();
                let lower = text.to_lowercase();
                let available = if lower.contains("whois server") || lower.contains("no whois server") {
                    Availability::Unknown
                } else {
                    Availability::Error
                };
                let mut provenance = Provenance::new(Source::Whois);
                provenance.server = Some(server.clone());
                CheckResult::new(name, CheckType::Domain, available, 0, &text, provenance)
                    .with_tld(tld)
                    .with_extra("resolution_source", json!("whois"))
                    .with_extra("resolution_server", json!(server))
            }
        }
    }

    async fn try_dns(&self, name: &str, tld: &str) -> CheckResult {
        let provenance = Provenance::new(Source::Dns);
        let Some(probe) = &self.dns_probe else {
            return CheckResult::new(name, CheckType::Domain, Availability::Unknown, 0, "dns resolver unavailable", provenance)
                .with_tld(tld)
                .with_extra("resolution_source", json!("dns"));
        };
        let (available, message) = probe.check(name).await;
        CheckResult::new(name, CheckType::Domain, available, 0, message, provenance)
            .with_tld(tld)
            .with_extra("resolution_source", json!("dns"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn checker_with_servers(server_uri: &str, tld: &str) -> DomainChecker<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.put_servers(tld, vec![server_uri.to_string()]).await;
        DomainChecker::new(store, reqwest::Client::new(), CachePolicy::new(), DomainConfig::default())
    }

    #[tokio::test]
    async fn scenario_a_not_found_is_available() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/domain/.*$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let checker = checker_with_servers(&server.uri(), "com").await;
        let result = checker.check("example.com").await.unwrap();
        assert_eq!(result.available, Availability::Available);
        assert_eq!(result.status_code, 404);
        assert_eq!(result.provenance.source, Source::Rdap);
        assert_eq!(result.extra_data.get("resolution_source").unwrap(), "rdap");
    }

    #[tokio::test]
    async fn scenario_b_found_is_taken_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/domain/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "objectClassName": "domain",
                "ldhName": "example.com",
                "status": ["active"]
            })))
            .mount(&server)
            .await;

        let checker = checker_with_servers(&server.uri(), "com").await;
        let result = checker.check("example.com").await.unwrap();
        assert_eq!(result.available, Availability::Taken);
        assert_eq!(result.status_code, 200);
        assert_eq!(result.extra_data.get("status").unwrap(), &serde_json::json!(["active"]));
    }

    #[tokio::test]
    async fn invalid_name_without_dot_is_rejected_before_any_request() {
        let store = Arc::new(MemoryStore::new());
        let checker = DomainChecker::new(store, reqwest::Client::new(), CachePolicy::new(), DomainConfig::default());
        let err = checker.check("nodot").await.unwrap_err();
        assert!(matches!(err, CheckerError::InvalidName(_)));
    }
}
