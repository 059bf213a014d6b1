//! # namelens-core
//!
//! Name-availability checking across domains (RDAP/WHOIS/DNS) and package
//! registries (npm, PyPI, Cargo, GitHub), plus an AI provider routing core
//! for enriching results with model-backed search and generation.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use namelens_core::checkers::domain::{DomainChecker, DomainConfig};
//! use namelens_core::cache_policy::CachePolicy;
//! use namelens_core::store::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let client = namelens_core::util::build_http_client(std::time::Duration::from_secs(10), "namelens/0.1")?;
//!     let checker = DomainChecker::new(store, client, CachePolicy::new(), DomainConfig::default());
//!     let result = checker.check("example.com").await?;
//!     println!("{:?}: {:?}", result.name, result.available);
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod bootstrap;
pub mod cache_policy;
pub mod checkers;
pub mod model;
pub mod rate_limit;
pub mod store;
pub mod util;

pub use bootstrap::{BootstrapError, BootstrapService, BootstrapStatus};
pub use cache_policy::CachePolicy;
pub use checkers::domain::{DomainChecker, DomainConfig};
pub use checkers::CheckerError;
pub use model::{Availability, CheckResult, CheckType, Provenance, Source, TOOL_VERSION};
pub use rate_limit::{Admission, EndpointLimit, RateLimiter};
pub use store::{BootstrapStore, RateLimitStore, ResultCache, Store};
