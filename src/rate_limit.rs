//! Per-endpoint fixed-window rate limiting with 429-driven backoff (spec §4.1).

use crate::model::now_millis;
use crate::store::RateLimitStore;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Effective admission limit for one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct EndpointLimit {
    pub requests_per_window: u32,
    pub window: Duration,
}

impl EndpointLimit {
    const fn per_minute(n: u32) -> Self {
        Self { requests_per_window: n, window: Duration::from_secs(60) }
    }

    const fn new(n: u32, window_secs: u64) -> Self {
        Self { requests_per_window: n, window: Duration::from_secs(window_secs) }
    }
}

static DEFAULT_LIMITS: Lazy<HashMap<&'static str, EndpointLimit>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("rdap.verisign.com", EndpointLimit::per_minute(30));
    m.insert("rdap.google.com", EndpointLimit::per_minute(30));
    m.insert("rdap.nic.io", EndpointLimit::new(10, 10));
    m.insert("whois", EndpointLimit::new(30, 3600));
    m.insert("registry.npmjs.org", EndpointLimit::per_minute(100));
    m.insert("pypi.org", EndpointLimit::per_minute(100));
    m.insert("api.github.com", EndpointLimit::new(60, 3600));
    m
});

const UNKNOWN_DEFAULT: EndpointLimit = EndpointLimit::per_minute(30);

fn default_limit_for(endpoint: &str) -> EndpointLimit {
    if let Some(l) = DEFAULT_LIMITS.get(endpoint) {
        return *l;
    }
    if let Some(stripped) = endpoint.strip_prefix("whois.") {
        let _ = stripped;
        if let Some(l) = DEFAULT_LIMITS.get("whois") {
            return *l;
        }
    }
    UNKNOWN_DEFAULT
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    pub wait: Duration,
}

/// Token-bucket-ish limiter operating over an externally-owned
/// `RateLimitStore`. `Allow` and `Record` are intentionally non-atomic
/// (spec §4.1 Concurrency): the design tolerates one-step overshoot per
/// endpoint in exchange for not serializing all traffic.
pub struct RateLimiter<S: RateLimitStore> {
    store: Arc<S>,
    overrides: RwLock<HashMap<String, EndpointLimit>>,
    safety_margin: RwLock<f64>,
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            overrides: RwLock::new(HashMap::new()),
            safety_margin: RwLock::new(1.0),
        }
    }

    fn effective_limit(&self, endpoint: &str) -> EndpointLimit {
        let base = {
            let overrides = self.overrides.read().unwrap();
            overrides.get(endpoint).copied().unwrap_or_else(|| default_limit_for(endpoint))
        };
        let margin = *self.safety_margin.read().unwrap();
        if margin >= 1.0 {
            return base;
        }
        let scaled = ((base.requests_per_window as f64) * margin).floor() as u32;
        EndpointLimit { requests_per_window: scaled.max(1), window: base.window }
    }

    /// Installs per-minute overrides, replacing the relevant defaults.
    pub fn apply_overrides(&self, overrides: &HashMap<String, u32>) {
        let mut guard = self.overrides.write().unwrap();
        for (endpoint, rpm) in overrides {
            guard.insert(endpoint.clone(), EndpointLimit::per_minute(*rpm));
        }
    }

    /// Scales every effective limit by `margin ∈ (0,1]`, flooring with a
    /// minimum of 1 (spec invariant 5).
    pub fn apply_safety_margin(&self, margin: f64) {
        let margin = margin.clamp(f64::EPSILON, 1.0);
        *self.safety_margin.write().unwrap() = margin;
    }

    pub async fn allow(&self, endpoint: &str) -> Admission {
        let now = now_millis();
        let limit = self.effective_limit(endpoint);
        let mut state = self.store.get_rate_limit(endpoint).await;

        if let Some(backoff_until) = state.backoff_until {
            if now < backoff_until {
                return Admission { allowed: false, wait: Duration::from_millis((backoff_until - now).max(0) as u64) };
            }
        }

        let window_ms = limit.window.as_millis() as i64;
        if state.window_start != 0 && now >= state.window_start + window_ms {
            state.window_start = 0;
            state.request_count = 0;
            self.store.update_rate_limit(endpoint, state.clone()).await;
        }

        if state.request_count >= limit.requests_per_window {
            let window_end = state.window_start + window_ms;
            return Admission { allowed: false, wait: Duration::from_millis((window_end - now).max(0) as u64) };
        }

        Admission { allowed: true, wait: Duration::ZERO }
    }

    pub async fn record(&self, endpoint: &str) {
        let mut state = self.store.get_rate_limit(endpoint).await;
        state.request_count += 1;
        if state.window_start == 0 {
            state.window_start = now_millis();
        }
        self.store.update_rate_limit(endpoint, state).await;
    }

    pub async fn record_429(&self, endpoint: &str, retry_after: Option<Duration>) {
        let mut state = self.store.get_rate_limit(endpoint).await;
        state.last_429_at = Some(now_millis());
        if let Some(wait) = retry_after {
            if !wait.is_zero() {
                state.backoff_until = Some(now_millis() + wait.as_millis() as i64);
            }
        }
        debug!(endpoint, ?retry_after, "recorded 429");
        self.store.update_rate_limit(endpoint, state).await;
    }
}
