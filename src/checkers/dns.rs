//! DNS NS-record fallback probe (spec §4.4 DNS path).
//!
//! Always non-authoritative: presence of NS records only means *something*
//! answers for the zone, not that the name is registered at a registry.

use crate::model::Availability;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;

pub struct DnsProbe {
    resolver: TokioAsyncResolver,
}

impl DnsProbe {
    pub fn new() -> Result<Self, hickory_resolver::error::ResolveError> {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Ok(Self { resolver })
    }

    /// Returns `(Availability, message)`: `Unknown` on NXDOMAIN or an empty
    /// answer, `Taken` when any NS record is present.
    pub async fn check(&self, domain: &str) -> (Availability, &'static str) {
        match self.resolver.ns_lookup(domain).await {
            Ok(answer) => {
                if answer.iter().next().is_some() {
                    (Availability::Taken, "dns records present (non-authoritative)")
                } else {
                    (Availability::Unknown, "dns nxdomain (non-authoritative)")
                }
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    (Availability::Unknown, "dns nxdomain (non-authoritative)")
                }
                _ => (Availability::Unknown, "dns nxdomain (non-authoritative)"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_default_config() {
        assert!(DnsProbe::new().is_ok());
    }
}
