//! Small helpers shared across checkers and AI drivers.

use sha2::{Digest, Sha256};
use std::time::Duration;

/// Parses a `Retry-After` header value as either integer seconds or an
/// HTTP-date. Per spec §9 Open Questions: a non-zero header that parses as
/// neither form means "unknown wait, do not apply backoff" — callers get
/// `None` and must still surface the raw header text themselves.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(when) = httpdate::parse_http_date(value) {
        let now = std::time::SystemTime::now();
        return when.duration_since(now).ok();
    }
    None
}

/// Hex-encoded SHA-256 of `body`, used for `extra_data.whois_raw_hash`.
pub fn sha256_hex(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(&mut out, "{:02x}", b).expect("writing to a String never fails");
    }
    out
}

/// Shared `reqwest::Client` builder, mirroring the teacher's
/// `RdapService::new`/`WhoisService::new` HTTP client setup (fixed timeout,
/// gzip, a constant User-Agent carrying the tool version).
pub fn build_http_client(timeout: Duration, user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent.to_string())
        .gzip(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn unparseable_value_yields_none() {
        assert_eq!(parse_retry_after("whenever"), None);
    }

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
