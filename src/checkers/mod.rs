//! Namespace availability checkers (spec §4.4/§4.5).

pub mod dns;
pub mod domain;
pub mod rdap;
pub mod registry;
pub mod whois;

use thiserror::Error;

/// Programmer/input errors raised before any I/O is attempted — never the
/// vehicle for "name taken" or "registry unreachable", which are values on
/// `CheckResult`, not `Err` variants (spec §7 Propagation policy).
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("unsupported tld: {0}")]
    UnsupportedTld(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out")]
    Timeout,
    #[error("response too large")]
    ResponseTooLarge,
    #[error("invalid utf-8 in response")]
    InvalidUtf8,
    #[error("dns resolution error: {0}")]
    Dns(#[from] hickory_resolver::error::ResolveError),
}

impl From<tokio::time::error::Elapsed> for CheckerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CheckerError::Timeout
    }
}

/// Splits `example.co.uk` into its last label (`uk`), per spec §4.4's
/// explicit "last label" rule — deliberately simpler than a public-suffix
/// list lookup.
pub fn last_label_tld(name: &str) -> Option<&str> {
    name.rsplit('.').next().filter(|s| !s.is_empty())
}
