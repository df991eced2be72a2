//! # petfinder-client - An async client for the Petfinder adoption API
//!
//! `petfinder-client` authenticates against the Petfinder API, validates
//! search filters before they reach the network, walks multi-page result sets
//! and flattens the nested JSON records into rectangular frames.
//!
//! ## Quick Start
//!
//! ```no_run
//! use petfinder_client::{AnimalQuery, PageLimit, Petfinder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), petfinder_client::Error> {
//!     let client = Petfinder::builder()
//!         .credentials("my-key", "my-secret")
//!         .build()?;
//!
//!     let query = AnimalQuery::new()
//!         .animal_type("dog")
//!         .size(["small", "medium"])
//!         .good_with_children(true)
//!         .location("98115")
//!         .distance(25)
//!         .results_per_page(100);
//!
//!     let dogs = client.animals(&query, PageLimit::Pages(5)).await?;
//!     if let Some(clamp) = dogs.clamp {
//!         println!("only {} pages were available", clamp.available);
//!     }
//!
//!     let frame = dogs.to_frame();
//!     for id in frame.column("animal_id") {
//!         println!("{id}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Validated queries** - Enumerated filters are checked against fixed vocabularies and every violation is reported at once
//! - **Transparent authentication** - Tokens are obtained lazily and refreshed once when the server reports expiry
//! - **Pagination** - Page counts are clamped to what the server has, and a rate limit mid-walk returns the pages already fetched
//! - **Bounded retries** - Transient 5xx failures are retried up to three attempts per request
//! - **Tabular output** - Records of every resource kind flatten into frames with bare identifier columns
//! - **Pluggable transport** - Any [`Transport`] implementation can stand in for the built-in reqwest one
//!
//! ## Error Handling
//!
//! ```no_run
//! use petfinder_client::{Error, Petfinder};
//!
//! # async fn example(client: Petfinder) {
//! match client.animal("123").await {
//!     Ok(record) => println!("{}", record["name"]),
//!     Err(Error::ResourceNotFound { message }) => eprintln!("no such animal: {message}"),
//!     Err(Error::RateLimitExceeded { rate_limit_info, .. }) => {
//!         let wait = rate_limit_info.and_then(|info| info.wait_hint());
//!         eprintln!("slow down, retry in {:?}", wait);
//!     }
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! # }
//! ```

pub mod auth;
mod client;
mod error;
pub mod flatten;
pub mod metadata;
pub mod normalize;
pub mod paginate;
pub mod params;
pub mod rate_limit;
mod response;
pub mod retry;
pub mod transport;
pub mod vocabulary;

pub use auth::Credential;
pub use client::{BreedList, ClientBuilder, Petfinder, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use flatten::{FlatRecord, ZeroOrMore};
pub use normalize::{batch_frame, normalize, ResourceKind, TabularFrame};
pub use paginate::{PageClamp, PageCursor, PageLimit, PageSet, MAX_PAGES};
pub use params::{AnimalQuery, FilterValue, OrganizationQuery, ParameterViolation};
pub use response::{BatchEntry, Lookup, RawResponse, ResultEnvelope};
pub use retry::RetryStrategy;
pub use transport::{HttpTransport, Transport};
