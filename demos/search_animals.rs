//! Example searching adoptable animals across several pages.
//!
//! This example shows how to:
//! - Configure a client from environment variables
//! - Build a validated animal query
//! - Walk a bounded number of pages
//! - Detect clamped and rate-limited fetches
//!
//! Run with: `PETFINDER_KEY=... PETFINDER_SECRET=... cargo run --example search_animals`

use petfinder_client::{AnimalQuery, PageLimit, Petfinder};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), petfinder_client::Error> {
    tracing_subscriber::fmt()
        .with_env_filter("petfinder_client=info,search_animals=info")
        .init();

    let client = Petfinder::builder()
        .credentials_from_env()
        .timeout(Duration::from_secs(30))
        .request_interval(Duration::from_millis(200))
        .build()?;

    let query = AnimalQuery::new()
        .animal_type("dog")
        .age(["baby", "young"])
        .good_with_children(true)
        .status("adoptable")
        .location("Seattle, WA")
        .distance(50)
        .sort("distance")
        .results_per_page(50);

    let dogs = client.animals(&query, PageLimit::Pages(4)).await?;

    println!("Fetched {} dogs across {} pages", dogs.len(), dogs.pages);
    if let Some(clamp) = dogs.clamp {
        println!(
            "  Asked for {} pages, the server only had {}",
            clamp.requested, clamp.available
        );
    }
    if let Some(error) = &dogs.interrupted {
        println!("  Stopped early: {}", error);
    }
    println!();

    let frame = dogs.to_frame();
    for row in 0..frame.len().min(10) {
        let cell = |column: &str| {
            frame
                .get(row, column)
                .map(|v| v.to_string())
                .unwrap_or_default()
        };
        println!(
            "{:>10}  {:<24} {:<10} {}",
            cell("animal_id"),
            cell("name"),
            cell("organization_id"),
            cell("photos0")
        );
    }

    Ok(())
}
