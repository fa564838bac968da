//! Client configuration.
//!
//! Every value is fixed once a client is built. Defaults match the hosted
//! Insights service; `from_env` and `from_yaml_str` exist so deployments can
//! tune batching without code changes.

use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Base URL of the hosted insert API; the account id and `/events` are appended.
pub const DEFAULT_INSERT_URL: &str = "https://insights-collector.newrelic.com/v1/accounts";
/// Base URL of the hosted query API; the account id and `/query` are appended.
pub const DEFAULT_QUERY_URL: &str = "https://insights-api.newrelic.com/v1/accounts";

/// Send a batch after this long even if it is not full.
pub const DEFAULT_BATCH_TIME: Duration = Duration::from_secs(60);
/// Number of events that makes a full batch.
pub const DEFAULT_BATCH_SIZE: usize = 950;
/// Number of batches that may be in flight at once.
pub const DEFAULT_WORKER_COUNT: usize = 1;
pub const DEFAULT_INSERT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_QUERY_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Total send attempts per batch, including the first.
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(5);

/// Largest accepted `batch_size`. Also bounds the event queue.
pub const MAX_BATCH_SIZE: usize = 100_000;
/// Largest accepted `worker_count`.
pub const MAX_WORKER_COUNT: usize = 1_024;

/// Request body encoding for inserts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    /// gzip the body and send `Content-Encoding: gzip`.
    Gzip,
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            other => Err(Error::configuration_with_context(
                format!("unsupported compression {other:?}"),
                ErrorContext::new()
                    .with_field_path("compression")
                    .with_source("insert_config"),
            )),
        }
    }
}

/// Batching and retry settings for an [`InsertClient`](crate::InsertClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertConfig {
    /// Events per full batch. Also the capacity of the event queue.
    pub batch_size: usize,
    /// Window after which a partial batch is flushed.
    pub batch_time: Duration,
    /// Maximum number of concurrent batch transmissions.
    pub worker_count: usize,
    pub request_timeout: Duration,
    /// Total attempts per batch (1 means no retry).
    pub retry_count: u32,
    pub retry_wait: Duration,
    pub compression: Compression,
}

impl Default for InsertConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_time: DEFAULT_BATCH_TIME,
            worker_count: DEFAULT_WORKER_COUNT,
            request_timeout: DEFAULT_INSERT_REQUEST_TIMEOUT,
            retry_count: DEFAULT_RETRIES,
            retry_wait: DEFAULT_RETRY_WAIT,
            compression: Compression::None,
        }
    }
}

impl InsertConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_batch_time(mut self, d: Duration) -> Self {
        self.batch_time = d;
        self
    }

    pub fn with_worker_count(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    pub fn with_request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }

    pub fn with_retry_count(mut self, n: u32) -> Self {
        self.retry_count = n;
        self
    }

    pub fn with_retry_wait(mut self, d: Duration) -> Self {
        self.retry_wait = d;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Defaults overridden by `INSIGHTS_*` environment variables.
    ///
    /// - `INSIGHTS_BATCH_SIZE`
    /// - `INSIGHTS_BATCH_TIME_MS`
    /// - `INSIGHTS_WORKER_COUNT`
    /// - `INSIGHTS_REQUEST_TIMEOUT_MS`
    /// - `INSIGHTS_RETRY_COUNT`
    /// - `INSIGHTS_RETRY_WAIT_MS`
    /// - `INSIGHTS_COMPRESSION` (`none` or `gzip`)
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
        }

        let d = Self::default();
        Self {
            batch_size: var("INSIGHTS_BATCH_SIZE").unwrap_or(d.batch_size),
            batch_time: var("INSIGHTS_BATCH_TIME_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.batch_time),
            worker_count: var("INSIGHTS_WORKER_COUNT").unwrap_or(d.worker_count),
            request_timeout: var("INSIGHTS_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.request_timeout),
            retry_count: var("INSIGHTS_RETRY_COUNT").unwrap_or(d.retry_count),
            retry_wait: var("INSIGHTS_RETRY_WAIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.retry_wait),
            compression: var("INSIGHTS_COMPRESSION").unwrap_or(d.compression),
        }
    }

    /// Read and parse a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Parse a YAML document; missing keys keep their defaults.
    ///
    /// ```yaml
    /// batch_size: 500
    /// batch_time_ms: 30000
    /// retry_count: 5
    /// compression: gzip
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let raw: RawInsertConfig = serde_yaml::from_str(yaml)?;
        let cfg = raw.into_config();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let reject = |field: &str, msg: &str| {
            Err(Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path(field)
                    .with_source("insert_config"),
            ))
        };

        if self.batch_size == 0 {
            return reject("batch_size", "batch size must be at least 1");
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return reject(
                "batch_size",
                &format!("batch size must not exceed {MAX_BATCH_SIZE}"),
            );
        }
        if self.batch_time.is_zero() {
            return reject("batch_time", "batch time window must be non-zero");
        }
        if self.worker_count == 0 {
            return reject("worker_count", "worker count must be at least 1");
        }
        if self.worker_count > MAX_WORKER_COUNT {
            return reject(
                "worker_count",
                &format!("worker count must not exceed {MAX_WORKER_COUNT}"),
            );
        }
        if self.retry_count == 0 {
            return reject("retry_count", "retry count must allow at least one attempt");
        }
        if self.request_timeout.is_zero() {
            return reject("request_timeout", "request timeout must be non-zero");
        }
        Ok(())
    }
}

/// `{base}/{account_id}/{leaf}`, e.g. the insert URL `.../v1/accounts/123/events`.
pub(crate) fn account_endpoint(base: &str, account_id: &str, leaf: &str) -> Result<Url> {
    let invalid = |msg: &str| {
        Error::configuration_with_context(
            msg,
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details(base.to_string())
                .with_source("endpoint"),
        )
    };

    if account_id.trim().is_empty() {
        return Err(Error::configuration_with_context(
            "account id must not be empty",
            ErrorContext::new()
                .with_field_path("account_id")
                .with_source("endpoint"),
        ));
    }

    let mut url = Url::parse(base).map_err(|e| invalid(&format!("malformed base URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("base URL must use http or https"));
    }
    url.path_segments_mut()
        .map_err(|_| invalid("base URL cannot carry a path"))?
        .pop_if_empty()
        .push(account_id.trim())
        .push(leaf);
    Ok(url)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawInsertConfig {
    batch_size: Option<usize>,
    batch_time_ms: Option<u64>,
    worker_count: Option<usize>,
    request_timeout_ms: Option<u64>,
    retry_count: Option<u32>,
    retry_wait_ms: Option<u64>,
    compression: Option<Compression>,
}

impl RawInsertConfig {
    fn into_config(self) -> InsertConfig {
        let d = InsertConfig::default();
        InsertConfig {
            batch_size: self.batch_size.unwrap_or(d.batch_size),
            batch_time: self
                .batch_time_ms
                .map(Duration::from_millis)
                .unwrap_or(d.batch_time),
            worker_count: self.worker_count.unwrap_or(d.worker_count),
            request_timeout: self
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(d.request_timeout),
            retry_count: self.retry_count.unwrap_or(d.retry_count),
            retry_wait: self
                .retry_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(d.retry_wait),
            compression: self.compression.unwrap_or(d.compression),
        }
    }
}
