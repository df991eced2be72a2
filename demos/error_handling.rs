//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Inspect client-side validation failures
//! - Handle missing records and rejected credentials
//! - Read rate limit hints
//! - Check if errors are retryable
//!
//! Run with: `cargo run --example error_handling`

use petfinder_client::{AnimalQuery, Error, PageLimit, Petfinder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("petfinder_client=info")
        .init();

    let client = Petfinder::builder()
        .credentials_from_env()
        .build()
        .or_else(|_| Petfinder::builder().credentials("demo-key", "demo-secret").build())?;

    println!("=== Example 1: Invalid query parameters ===");
    // Never leaves the process: every violation is reported at once.
    let query = AnimalQuery::new()
        .animal_type("dragon")
        .size("enormous")
        .distance(1_000);
    match client.animals(&query, PageLimit::Pages(1)).await {
        Ok(set) => println!("Unexpected success: {} records", set.len()),
        Err(Error::InvalidParameters { violations }) => {
            for violation in violations {
                println!("  {}", violation);
            }
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Record lookups ===");
    match client.animal("0").await {
        Ok(record) => println!("Found: {}", record["name"]),
        Err(Error::ResourceNotFound { message }) => println!("Not found: {}", message),
        Err(Error::InvalidCredentials { message }) => {
            println!("Credentials rejected: {}", message);
            println!("Set PETFINDER_KEY and PETFINDER_SECRET to real values.");
        }
        Err(Error::RateLimitExceeded {
            rate_limit_info, ..
        }) => {
            let wait = rate_limit_info.and_then(|info| info.wait_hint());
            println!("Rate limited, come back in {:?}", wait);
        }
        Err(e) => {
            println!("Error: {}", e);
            println!("  Status: {:?}", e.status());
            println!("  Retryable: {}", e.is_retryable());
            if let Some(raw) = e.raw_response() {
                println!("  Raw response: {}", raw);
            }
        }
    }

    Ok(())
}
