//! WHOIS transport, IANA server resolution, and body interpretation
//! (spec §4.4 WHOIS path).

pub mod client;
pub mod interpreter;

pub use client::WhoisClient;
pub use interpreter::WhoisInterpreter;

use crate::checkers::CheckerError;
use crate::model::Availability;
use crate::util::sha256_hex;
use std::time::Duration;
use tracing::debug;

const IANA_WHOIS_SERVER: &str = "whois.iana.org";

/// Result of a complete WHOIS round trip: server used, interpreted
/// availability, and the raw body hash for provenance.
pub struct WhoisOutcome {
    pub server: String,
    pub available: Availability,
    pub raw_hash: String,
}

pub struct WhoisResolver {
    client: WhoisClient,
    interpreter: WhoisInterpreter,
}

impl WhoisResolver {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            client: WhoisClient::new(connect_timeout, read_timeout),
            interpreter: WhoisInterpreter::new(),
        }
    }

    /// Looks up the authoritative WHOIS server for `tld` via IANA referral
    /// lines (`refer:` / `whois:`), unless `override_server` names one.
    pub async fn resolve_server(&self, tld: &str, override_server: Option<&str>) -> Option<String> {
        if let Some(server) = override_server {
            return Some(server.to_string());
        }
        let body = self.client.query(IANA_WHOIS_SERVER, tld).await.ok()?;
        for line in body.lines() {
            let line = line.trim();
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_lowercase();
                if key == "refer" || key == "whois" {
                    let value = value.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
        None
    }

    /// Queries `server` for `domain` and interprets the body.
    pub async fn check(&self, server: &str, domain: &str) -> Result<WhoisOutcome, CheckerError> {
        debug!(server, domain, "whois lookup");
        let body = self.client.query(server, domain).await?;
        let available = self.interpreter.interpret(&body);
        Ok(WhoisOutcome { server: server.to_string(), available, raw_hash: sha256_hex(&body) })
    }
}

/// Key for the rate limiter covering a WHOIS server: `"whois.<server>"`, or
/// `"whois"` when no server is known yet.
pub fn limiter_key(server: Option<&str>) -> String {
    match server {
        Some(s) => format!("whois.{s}"),
        None => "whois".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_key_falls_back_to_group_name() {
        assert_eq!(limiter_key(None), "whois");
        assert_eq!(limiter_key(Some("whois.nic.xyz")), "whois.whois.nic.xyz");
    }
}
