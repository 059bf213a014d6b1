//! HTTP registry checkers (npm, PyPI, Cargo, GitHub) — spec §4.5.

pub mod cargo;
pub mod github;
pub mod npm;
pub mod pypi;

use crate::cache_policy::CachePolicy;
use crate::checkers::CheckerError;
use crate::model::{Availability, CheckResult, CheckType, Provenance, Source};
use crate::rate_limit::RateLimiter;
use crate::store::{ResultCache, Store};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Shared contract: pre-flight name validation (no HTTP for invalid names),
/// then a cache/rate-limit/probe/cache round trip.
#[async_trait]
pub trait RegistryChecker: Send + Sync {
    fn check_type(&self) -> CheckType;
    fn source(&self) -> Source;
    fn endpoint_host(&self) -> &str;
    fn supports_name(&self, name: &str) -> bool;
    fn request_url(&self, name: &str) -> String;

    /// Applies registry-specific headers (GitHub's `Authorization`, Cargo's
    /// `User-Agent`) beyond the shared `Accept: application/json`.
    fn apply_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
    }

    /// Parses a 200 JSON body into `extra_data` entries.
    fn parse_body(&self, body: &Value) -> Vec<(String, Value)>;
}

/// Runs the shared per-call flow described in spec §4.5 against any
/// `RegistryChecker` implementation.
pub struct RegistryRunner<S: Store> {
    client: reqwest::Client,
    store: Arc<S>,
    rate_limiter: RateLimiter<S>,
    cache_policy: CachePolicy,
}

impl<S: Store> RegistryRunner<S> {
    pub fn new(client: reqwest::Client, store: Arc<S>) -> Self {
        let rate_limiter = RateLimiter::new(store.clone());
        Self { client, store, rate_limiter, cache_policy: CachePolicy::new() }
    }

    pub async fn check(&self, checker: &dyn RegistryChecker, name: &str) -> Result<CheckResult, CheckerError> {
        let normalized = name.trim().to_lowercase();
        if !checker.supports_name(&normalized) {
            return Err(CheckerError::InvalidName(normalized));
        }

        if let Some(cached) = self.store.get(&normalized, checker.check_type(), None).await {
            debug!(name = %normalized, "registry check served from cache");
            return Ok(cached);
        }

        let endpoint = checker.endpoint_host().to_string();
        let admission = self.rate_limiter.allow(&endpoint).await;
        if !admission.allowed {
            let provenance = Provenance::new(checker.source());
            let result = CheckResult::new(&normalized, checker.check_type(), Availability::RateLimited, 429, "rate limited", provenance);
            self.cache(checker, &normalized, &result).await;
            return Ok(result);
        }
        self.rate_limiter.record(&endpoint).await;

        let url = checker.request_url(&normalized);
        let mut builder = self.client.get(&url).header("Accept", "application/json");
        builder = checker.apply_headers(builder);

        let result = match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                match status {
                    404 => self.terminal(checker, &normalized, Availability::Available, 404, "available", None).await,
                    200 => {
                        let body: Option<Value> = response.json().await.ok();
                        let extra = body.as_ref().map(|b| checker.parse_body(b)).unwrap_or_default();
                        self.terminal(checker, &normalized, Availability::Taken, 200, "taken", Some(extra)).await
                    }
                    429 => {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(crate::util::parse_retry_after);
                        if let Some(wait) = retry_after {
                            self.rate_limiter.record_429(&endpoint, Some(wait)).await;
                        }
                        self.terminal(checker, &normalized, Availability::RateLimited, 429, "rate limited", None).await
                    }
                    403 if checker.check_type() == CheckType::Github => {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(crate::util::parse_retry_after);
                        if let Some(wait) = retry_after {
                            self.rate_limiter.record_429(&endpoint, Some(wait)).await;
                        }
                        self.terminal(checker, &normalized, Availability::RateLimited, 403, "rate limited", None).await
                    }
                    other => self.terminal(checker, &normalized, Availability::Error, other, "unexpected response", None).await,
                }
            }
            Err(e) => self.terminal(checker, &normalized, Availability::Error, 0, &e.to_string(), None).await,
        };

        Ok(result)
    }

    async fn terminal(
        &self,
        checker: &dyn RegistryChecker,
        name: &str,
        available: Availability,
        status: u16,
        message: &str,
        extra: Option<Vec<(String, Value)>>,
    ) -> CheckResult {
        let provenance = Provenance::new(checker.source());
        let mut result = CheckResult::new(name, checker.check_type(), available, status, message, provenance);
        for (key, value) in extra.unwrap_or_default() {
            result = result.with_extra(key, value);
        }
        self.cache(checker, name, &result).await;
        result
    }

    async fn cache(&self, checker: &dyn RegistryChecker, name: &str, result: &CheckResult) {
        let ttl = self.cache_policy.ttl_for(result.available, None);
        self.store.put(name, checker.check_type(), None, result.clone(), ttl.as_secs()).await;
    }
}
