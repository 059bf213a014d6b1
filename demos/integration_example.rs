//! Integration example showing how to wire up namelens-core in an application.
//!
//! This example demonstrates:
//! - Error handling across the domain and registry checkers
//! - Concurrent batch processing
//! - Cache hit/miss behavior
//! - Custom cache policy configuration

use namelens_core::checkers::domain::{DomainChecker, DomainConfig};
use namelens_core::checkers::registry::cargo::CargoChecker;
use namelens_core::checkers::registry::RegistryRunner;
use namelens_core::model::{Availability, Source};
use namelens_core::store::memory::MemoryStore;
use namelens_core::CachePolicy;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("namelens_core=info").init();

    println!("namelens-core integration example");
    println!("==================================");

    println!("\n1. Basic usage with error handling");
    basic_usage_example().await?;

    println!("\n2. Batch processing");
    batch_processing_example().await?;

    println!("\n3. Caching benefits");
    caching_example().await?;

    println!("\n4. Registry checker with cache admissibility rules");
    registry_checker_example().await?;

    println!("\nall examples completed");
    Ok(())
}

fn client() -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    Ok(namelens_core::util::build_http_client(Duration::from_secs(10), "namelens-demo/0.1")?)
}

async fn basic_usage_example() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let checker = DomainChecker::new(store, client()?, CachePolicy::new(), DomainConfig::default());

    for domain in ["google.com", "not-a-domain", "nonexistent.invalidtld"] {
        print!("   {domain}: ");
        match checker.check(domain).await {
            Ok(result) => println!("{:?} (source {:?})", result.available, result.provenance.source),
            Err(e) => println!("rejected before any request: {e}"),
        }
    }

    Ok(())
}

async fn batch_processing_example() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let checker = Arc::new(DomainChecker::new(store, client()?, CachePolicy::new(), DomainConfig::default()));

    let domains = ["github.com", "stackoverflow.com", "rust-lang.org"];
    println!("   processing {} domains concurrently...", domains.len());
    let start = Instant::now();

    let mut handles = Vec::new();
    for domain in domains {
        let checker = checker.clone();
        let domain = domain.to_string();
        handles.push(tokio::spawn(async move { (domain.clone(), checker.check(&domain).await) }));
    }

    let mut successful = 0;
    let mut failed = 0;
    for handle in handles {
        match handle.await? {
            (domain, Ok(result)) => {
                println!("   {domain}: {:?}", result.available);
                successful += 1;
            }
            (domain, Err(e)) => {
                println!("   {domain}: {e}");
                failed += 1;
            }
        }
    }

    println!("   {successful} successful, {failed} failed in {:?}", start.elapsed());
    Ok(())
}

async fn caching_example() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let checker = DomainChecker::new(store, client()?, CachePolicy::new(), DomainConfig::default());

    println!("   first lookup (cache miss):");
    let start = Instant::now();
    let first = checker.check("example.com").await?;
    println!("     time: {:?}, from_cache: {}", start.elapsed(), first.provenance.from_cache);

    println!("   second lookup (cache hit):");
    let start = Instant::now();
    let second = checker.check("example.com").await?;
    println!("     time: {:?}, from_cache: {}", start.elapsed(), second.provenance.from_cache);

    Ok(())
}

async fn registry_checker_example() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let runner = RegistryRunner::new(client()?, store);
    let checker = CargoChecker::new();

    let policy = CachePolicy::new();
    println!("   rdap results are always cache-admissible: {}", policy.is_cache_admissible(Source::Rdap, Availability::Unknown));

    println!("   checking a crate name");
    let result = runner.check(&checker, "serde").await?;
    match result.available {
        Availability::Taken => println!("   serde is taken, version {:?}", result.extra_data.get("latest_version")),
        other => println!("   unexpected result: {other:?}"),
    }

    Ok(())
}
