use super::{EventSink, TransportError};
use crate::config::Compression;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Proxy, StatusCode};
use serde::Deserialize;
use std::env;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const INSERT_KEY_HEADER: &str = "X-Insert-Key";

/// Shared client construction for insert and query requests.
///
/// Honors `INSIGHTS_PROXY_URL` and `INSIGHTS_HTTP_POOL_MAX_IDLE_PER_HOST`.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(
            env::var("INSIGHTS_HTTP_POOL_MAX_IDLE_PER_HOST")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(8),
        )
        .pool_idle_timeout(Some(Duration::from_secs(90)));

    if let Ok(proxy_url) = env::var("INSIGHTS_PROXY_URL") {
        if let Some(proxy) = parse_proxy(&proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder
        .build()
        .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))
}

fn parse_proxy(raw: &str) -> Option<Proxy> {
    match Proxy::all(raw) {
        Ok(proxy) => Some(proxy),
        Err(e) => {
            warn!(proxy = raw, error = %e, "ignoring invalid INSIGHTS_PROXY_URL");
            None
        }
    }
}

fn gzip(body: &[u8]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(body.len() / 4),
        flate2::Compression::default(),
    );
    encoder.write_all(body)?;
    Ok(Bytes::from(encoder.finish()?))
}

// Responses are either success or error.
#[derive(Debug, Default, Deserialize)]
struct InsertResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    success: bool,
}

/// Posts encoded event batches to the insert endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    insert_key: String,
    compression: Compression,
}

impl HttpTransport {
    pub fn new(
        url: Url,
        insert_key: impl Into<String>,
        timeout: Duration,
        compression: Compression,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url,
            insert_key: insert_key.into(),
            compression,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// POST `body` and interpret the insert response.
    pub async fn post_json(&self, body: Bytes) -> Result<()> {
        let mut request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(INSERT_KEY_HEADER, &self.insert_key);

        let body = match self.compression {
            Compression::None => body,
            Compression::Gzip => {
                let compressed = gzip(&body)?;
                debug!(raw = body.len(), compressed = compressed.len(), "gzip request body");
                request = request.header(CONTENT_ENCODING, "gzip");
                compressed
            }
        };

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        parse_insert_response(status, &text)
    }
}

fn parse_insert_response(status: StatusCode, body: &str) -> Result<()> {
    if status != StatusCode::OK {
        return Err(Error::Remote {
            status: status.as_u16(),
            message: body.trim().to_string(),
        });
    }

    debug!(status = status.as_u16(), body, "insert response");

    let parsed: InsertResponse = serde_json::from_str(body)?;
    if parsed.success {
        return Ok(());
    }

    // 200 without success, if such a thing
    Err(Error::Remote {
        status: status.as_u16(),
        message: parsed
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "Error unknown".to_string()),
    })
}

#[async_trait]
impl EventSink for HttpTransport {
    async fn send(&self, body: Bytes) -> Result<()> {
        self.post_json(body).await
    }
}
