//! Example turning organizations and their animals into flat tables.
//!
//! This example shows how to:
//! - Search organizations by state
//! - Flatten records into a frame with bare identifier columns
//! - Look up several animals at once, tolerating unknown ids
//! - List breeds for a few animal types
//!
//! Run with: `PETFINDER_KEY=... PETFINDER_SECRET=... cargo run --example organizations_table`

use petfinder_client::{batch_frame, OrganizationQuery, PageLimit, Petfinder, ResourceKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("petfinder_client=info")
        .init();

    let client = Petfinder::builder().credentials_from_env().build()?;

    println!("=== Organizations in Washington ===");
    let query = OrganizationQuery::new().state("WA").sort("name").results_per_page(25);
    let organizations = client.organizations(&query, PageLimit::Pages(1)).await?;
    let frame = organizations.to_frame();

    println!("{} rows, {} columns", frame.len(), frame.columns().len());
    for (id, name) in frame.column("organization_id").iter().zip(frame.column("name")) {
        println!("  {:<8} {}", id, name);
    }
    println!();

    println!("=== Batch lookup ===");
    let entries = client.animals_by_id(["120", "0", "121"]).await?;
    for entry in &entries {
        println!(
            "  {:<6} {} {}",
            entry.id,
            entry.status.as_u16(),
            if entry.is_not_found() { "not found" } else { "found" }
        );
    }
    let frame = batch_frame(ResourceKind::Animal, &entries);
    println!("Batch frame columns: {:?}", frame.columns());
    println!();

    println!("=== Breeds ===");
    let breeds = client.breeds(["rabbit", "horse"]).await?;
    for (animal_type, names) in breeds.iter() {
        println!("  {}: {} breeds", animal_type, names.len());
    }

    Ok(())
}
