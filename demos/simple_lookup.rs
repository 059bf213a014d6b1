//! Simple example of using namelens-core's domain checker.
//!
//! Run with: cargo run --example simple_lookup

use namelens_core::checkers::domain::{DomainChecker, DomainConfig};
use namelens_core::store::memory::MemoryStore;
use namelens_core::CachePolicy;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("namelens_core=info").init();

    println!("namelens-core domain lookup example");
    println!("====================================");

    let store = Arc::new(MemoryStore::new());
    let client = namelens_core::util::build_http_client(Duration::from_secs(10), "namelens-demo/0.1")?;
    let checker = DomainChecker::new(store, client, CachePolicy::new(), DomainConfig::default());

    for domain in ["google.com", "github.com", "rust-lang.org"] {
        println!("\nlooking up: {domain}");
        println!("{}", "-".repeat(50));

        match checker.check(domain).await {
            Ok(result) => {
                println!("  available: {:?}", result.available);
                println!("  source: {:?}", result.provenance.source);
                println!("  from_cache: {}", result.provenance.from_cache);
            }
            Err(e) => println!("  error: {e}"),
        }
    }

    println!("\ndone");
    Ok(())
}
