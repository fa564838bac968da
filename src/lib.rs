//! # insights-rs
//!
//! Insights 事件 API 的批量写入与 NRQL 查询客户端。
//!
//! Batching insert client and NRQL query client for the Insights event API.
//!
//! ## Overview
//!
//! Producers hand the client already-serialized events. Background tasks
//! group them into batches, post each batch as one JSON array, and retry
//! failed posts a bounded number of times. Every moving part is owned by the
//! client object; there is no global state.
//!
//! ## Key Features
//!
//! - **Backpressure**: the event queue is bounded; a full queue makes `enqueue` wait
//! - **Size and time flushing**: full batches go immediately, partial ones on a timer or [`InsertClient::flush`]
//! - **Bounded fan-out**: at most `worker_count` batches in flight
//! - **Observable loss**: abandoned batches are counted in [`Statistics`] and reported to a [`telemetry::PipelineObserver`]
//! - **Query**: NRQL queries via [`query::QueryClient`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use insights_rs::{InsertClient, InsertConfig};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> insights_rs::Result<()> {
//!     let client = InsertClient::builder("insert-key", "12345")
//!         .config(InsertConfig::new().with_batch_time(Duration::from_secs(10)))
//!         .build()?;
//!     client.start()?;
//!
//!     client
//!         .enqueue_event(&json!({"eventType": "Deployment", "version": "1.4.2"}))
//!         .await?;
//!
//!     client.shutdown().await?;
//!     println!("{:?}", client.statistics());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Insert client and builder |
//! | [`batch`] | Queue, accumulator, flush timer, transmitter |
//! | [`transport`] | `EventSink` seam and the HTTP implementation |
//! | [`resilience`] | Retry policy |
//! | [`telemetry`] | Pipeline observer events |
//! | [`query`] | NRQL query client |
//! | [`config`] | Configuration and defaults |

pub mod batch;
pub mod client;
pub mod config;
pub mod query;
pub mod resilience;
pub mod stats;
pub mod telemetry;
pub mod transport;

pub use client::{InsertClient, InsertClientBuilder};
pub use config::InsertConfig;
pub use stats::{Statistics, StatisticsSnapshot};
pub use telemetry::{PipelineEvent, PipelineObserver};
pub use transport::EventSink;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
