//! NRQL query client.
//!
//! Read-side counterpart of the insert client, e.g. to confirm events landed:
//!
//! ```rust,no_run
//! use insights_rs::query::QueryClient;
//!
//! # async fn run() -> insights_rs::Result<()> {
//! let client = QueryClient::new("query-key", "12345")?;
//! let resp = client
//!     .query_events("SELECT count(*) FROM Deployment SINCE 1 hour ago")
//!     .await?;
//! println!("{:?}", resp.results);
//! # Ok(())
//! # }
//! ```

mod client;
mod types;

pub use client::{QueryClient, MIN_NRQL_LENGTH, QUERY_KEY_HEADER};
pub use types::{QueryMetadata, QueryResponse};
