//! Store capability contracts (Design Notes §9: "Cyclic/implicit coupling").
//!
//! The core never depends on a concrete persistence implementation. Instead
//! it accepts three narrow capabilities that a caller's store wires together.
//! `store::memory` is a reference implementation used only by this crate's
//! own tests and `demos/` — it is not a production store.

use crate::model::{BootstrapMeta, CheckResult, CheckType, RateLimitState};
use async_trait::async_trait;
use std::collections::HashMap;

/// Reads/writes the TLD -> RDAP server list and bootstrap metadata.
#[async_trait]
pub trait BootstrapStore: Send + Sync {
    async fn put_servers(&self, tld: &str, servers: Vec<String>);
    async fn get_servers(&self, tld: &str) -> Vec<String>;
    async fn put_meta(&self, meta: BootstrapMeta);
    async fn get_meta(&self) -> Option<BootstrapMeta>;
}

/// A cached availability result, keyed by (name, check_type, tld).
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, name: &str, check_type: CheckType, tld: Option<&str>) -> Option<CheckResult>;
    async fn put(
        &self,
        name: &str,
        check_type: CheckType,
        tld: Option<&str>,
        result: CheckResult,
        ttl_secs: u64,
    );
}

/// Per-endpoint rate limit state, owned by the store (spec §3 Ownership).
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get_rate_limit(&self, endpoint: &str) -> RateLimitState;
    async fn update_rate_limit(&self, endpoint: &str, state: RateLimitState);
}

/// Union of the three capabilities; most callers hand the checker one object
/// implementing all three rather than threading three separate handles.
pub trait Store: BootstrapStore + ResultCache + RateLimitStore {}
impl<T: BootstrapStore + ResultCache + RateLimitStore> Store for T {}

pub mod memory {
    //! Simple in-process reference `Store`. Not for production use — it has
    //! no eviction beyond a max-entries guard and no cross-process sharing.

    use super::*;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct MemoryStore {
        servers: RwLock<HashMap<String, Vec<String>>>,
        meta: RwLock<Option<BootstrapMeta>>,
        results: RwLock<HashMap<(String, CheckType, Option<String>), (CheckResult, i64)>>,
        rate_limits: RwLock<HashMap<String, RateLimitState>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl BootstrapStore for MemoryStore {
        async fn put_servers(&self, tld: &str, servers: Vec<String>) {
            self.servers.write().await.insert(tld.to_lowercase(), servers);
        }

        async fn get_servers(&self, tld: &str) -> Vec<String> {
            self.servers
                .read()
                .await
                .get(&tld.to_lowercase())
                .cloned()
                .unwrap_or_default()
        }

        async fn put_meta(&self, meta: BootstrapMeta) {
            *self.meta.write().await = Some(meta);
        }

        async fn get_meta(&self) -> Option<BootstrapMeta> {
            self.meta.read().await.clone()
        }
    }

    #[async_trait]
    impl ResultCache for MemoryStore {
        async fn get(&self, name: &str, check_type: CheckType, tld: Option<&str>) -> Option<CheckResult> {
            let key = (name.to_string(), check_type, tld.map(|s| s.to_string()));
            let guard = self.results.read().await;
            let (result, expires_at) = guard.get(&key)?;
            if crate::model::now_millis() > *expires_at {
                return None;
            }
            Some(result.clone())
        }

        async fn put(
            &self,
            name: &str,
            check_type: CheckType,
            tld: Option<&str>,
            result: CheckResult,
            ttl_secs: u64,
        ) {
            let key = (name.to_string(), check_type, tld.map(|s| s.to_string()));
            let expires_at = crate::model::now_millis() + (ttl_secs as i64 * 1000);
            self.results.write().await.insert(key, (result, expires_at));
        }
    }

    #[async_trait]
    impl RateLimitStore for MemoryStore {
        async fn get_rate_limit(&self, endpoint: &str) -> RateLimitState {
            self.rate_limits
                .read()
                .await
                .get(endpoint)
                .cloned()
                .unwrap_or_default()
        }

        async fn update_rate_limit(&self, endpoint: &str, state: RateLimitState) {
            self.rate_limits.write().await.insert(endpoint.to_string(), state);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn round_trips_bootstrap_servers() {
            let store = MemoryStore::new();
            store.put_servers("COM", vec!["https://rdap.example/".into()]).await;
            assert_eq!(store.get_servers("com").await, vec!["https://rdap.example/".to_string()]);
        }

        #[tokio::test]
        async fn cache_expires_after_ttl() {
            let store = MemoryStore::new();
            let result = CheckResult::new(
                "foo",
                CheckType::Npm,
                crate::model::Availability::Available,
                404,
                "ok",
                crate::model::Provenance::new(crate::model::Source::Npm),
            );
            store.put("foo", CheckType::Npm, None, result, 0).await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            assert!(store.get("foo", CheckType::Npm, None).await.is_none());
        }
    }
}
