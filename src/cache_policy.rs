//! TTL selection for cached availability results (spec §4.2).

use crate::model::{Availability, Source};
use std::collections::HashMap;
use std::time::Duration;

/// Per-outcome TTLs plus per-(check-type|tld) overrides.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub available_ttl: Duration,
    pub taken_ttl: Duration,
    pub error_ttl: Duration,
    overrides: HashMap<String, Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            available_ttl: Duration::from_secs(5 * 60),
            taken_ttl: Duration::from_secs(3600),
            error_ttl: Duration::from_secs(30),
            overrides: HashMap::new(),
        }
    }
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a TTL override keyed by an opaque scope string (e.g. a TLD
    /// or check-type name); `ttl_for` prefers this over the base tables.
    pub fn with_override(mut self, scope: impl Into<String>, ttl: Duration) -> Self {
        self.overrides.insert(scope.into(), ttl);
        self
    }

    /// Whether a source is admissible for caching at all. RDAP results are
    /// always cacheable; WHOIS/DNS results are admissible only when they
    /// resolved to a definite Available/Taken answer — ambiguous WHOIS/DNS
    /// reads must not be cached as if authoritative.
    pub fn is_cache_admissible(&self, source: Source, available: Availability) -> bool {
        match source {
            Source::Rdap => true,
            Source::Whois | Source::Dns => matches!(available, Availability::Available | Availability::Taken),
            Source::Npm | Source::Pypi | Source::Cargo | Source::Github => true,
        }
    }

    pub fn ttl_for(&self, available: Availability, scope: Option<&str>) -> Duration {
        if let Some(scope) = scope {
            if let Some(ttl) = self.overrides.get(scope) {
                return *ttl;
            }
        }
        match available {
            Availability::Available => self.available_ttl,
            Availability::Taken => self.taken_ttl,
            Availability::Error | Availability::RateLimited | Availability::Unsupported | Availability::Unknown => {
                self.error_ttl
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_override_wins_over_base_table() {
        let policy = CachePolicy::new().with_override("io", Duration::from_secs(5));
        assert_eq!(policy.ttl_for(Availability::Available, Some("io")), Duration::from_secs(5));
        assert_eq!(policy.ttl_for(Availability::Available, Some("com")), policy.available_ttl);
    }

    #[test]
    fn rdap_always_admissible() {
        let policy = CachePolicy::new();
        assert!(policy.is_cache_admissible(Source::Rdap, Availability::Unknown));
    }

    #[test]
    fn whois_unknown_not_admissible() {
        let policy = CachePolicy::new();
        assert!(!policy.is_cache_admissible(Source::Whois, Availability::Unknown));
        assert!(policy.is_cache_admissible(Source::Whois, Availability::Taken));
    }

    #[test]
    fn error_outcomes_use_error_ttl() {
        let policy = CachePolicy::new();
        assert_eq!(policy.ttl_for(Availability::Error, None), policy.error_ttl);
        assert_eq!(policy.ttl_for(Availability::RateLimited, None), policy.error_ttl);
    }
}
