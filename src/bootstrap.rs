//! RDAP bootstrap discovery (spec §4.3).
//!
//! Unlike the teacher's `build.rs`-time fetch, this runs at runtime against
//! an injected `reqwest::Client` and a `BootstrapStore`, so the same process
//! can refresh the IANA mapping without recompiling.

use crate::model::BootstrapMeta;
use crate::store::BootstrapStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const RDAP_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bootstrap fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bootstrap document returned status {0}")]
    BadStatus(reqwest::StatusCode),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct BootstrapDocument {
    services: Vec<BootstrapEntry>,
    #[serde(rename = "publication")]
    publication: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct BootstrapEntry(Vec<String>, Vec<String>);

/// Current refresh status, returned by `Status()`.
#[derive(Debug, Clone)]
pub enum BootstrapStatus {
    Unfetched,
    Fetched(BootstrapMeta),
}

pub struct BootstrapService<S: BootstrapStore> {
    client: reqwest::Client,
    store: Arc<S>,
    bootstrap_url: String,
}

impl<S: BootstrapStore> BootstrapService<S> {
    pub fn new(client: reqwest::Client, store: Arc<S>) -> Self {
        Self { client, store, bootstrap_url: RDAP_BOOTSTRAP_URL.to_string() }
    }

    /// Overrides the bootstrap document URL; used by tests to point at a
    /// local mock server instead of IANA.
    pub fn with_bootstrap_url(mut self, url: impl Into<String>) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// Fetches the IANA RDAP bootstrap document and (re)populates the store.
    /// Best-effort: a failed fetch leaves any previously stored mapping
    /// intact and is reported to the caller rather than panicking.
    pub async fn update(&self) -> Result<BootstrapMeta, BootstrapError> {
        debug!("fetching RDAP bootstrap document");
        let response = self.client.get(&self.bootstrap_url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "RDAP bootstrap fetch failed");
            return Err(BootstrapError::BadStatus(response.status()));
        }
        let doc: BootstrapDocument = response.json().await?;

        let mut tld_count = 0usize;
        for BootstrapEntry(tlds, servers) in &doc.services {
            if servers.is_empty() {
                continue;
            }
            for tld in tlds {
                self.store.put_servers(tld, servers.clone()).await;
                tld_count += 1;
            }
        }

        let meta = BootstrapMeta {
            version: doc.version,
            publication: doc.publication,
            fetched_at: Some(crate::model::now_millis()),
            source: Some(self.bootstrap_url.clone()),
            tld_count,
        };
        self.store.put_meta(meta.clone()).await;
        info!(tld_count, "RDAP bootstrap document applied");
        Ok(meta)
    }

    pub async fn status(&self) -> BootstrapStatus {
        match self.store.get_meta().await {
            Some(meta) => BootstrapStatus::Fetched(meta),
            None => BootstrapStatus::Unfetched,
        }
    }

    /// Returns ordered candidate RDAP servers for a TLD, case-insensitively.
    pub async fn lookup_servers(&self, tld: &str) -> Vec<String> {
        self.store.get_servers(&tld.to_lowercase()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn update_populates_store_case_insensitively() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rdap/dns.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "services": [[["xyz"], ["https://rdap.nic.xyz/"]]],
                "publication": "2026-01-01T00:00:00Z",
                "version": "1.0"
            })))
            .mount(&server)
            .await;

        let bootstrap = BootstrapService::new(reqwest::Client::new(), Arc::new(MemoryStore::new()))
            .with_bootstrap_url(format!("{}/rdap/dns.json", server.uri()));

        let meta = bootstrap.update().await.unwrap();
        assert_eq!(meta.tld_count, 1);
        assert_eq!(meta.source.as_deref(), Some(format!("{}/rdap/dns.json", server.uri()).as_str()));

        let servers = bootstrap.lookup_servers("XYZ").await;
        assert_eq!(servers, vec!["https://rdap.nic.xyz/".to_string()]);
    }

    #[tokio::test]
    async fn status_unfetched_before_update() {
        let bootstrap = BootstrapService::new(reqwest::Client::new(), Arc::new(MemoryStore::new()));
        matches!(bootstrap.status().await, BootstrapStatus::Unfetched);
    }
}
