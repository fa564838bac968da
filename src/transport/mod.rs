//! Network side of the insert client.
//!
//! The batching pipeline only knows [`EventSink`]: hand it one encoded body,
//! get back success or an error. [`HttpTransport`] is the production sink.

mod http;

pub use http::{HttpTransport, INSERT_KEY_HEADER};
pub(crate) use http::build_client;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Receives encoded batches, one request per call.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver `body`, a JSON array of events.
    async fn send(&self, body: Bytes) -> Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
