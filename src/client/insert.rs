use crate::batch::{EventQueue, Pipeline, Transmitter};
use crate::client::builder::InsertClientBuilder;
use crate::config::InsertConfig;
use crate::resilience::RetryPolicy;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::telemetry::PipelineObserver;
use crate::transport::EventSink;
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

static INSERT_ENDPOINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"collector\.newrelic\.com/v1/accounts/[0-9]+/events").expect("valid pattern")
});

/// Client for sending events to the insert API.
///
/// Events can be posted one request at a time with [`post_event`](Self::post_event),
/// or, after [`start`](Self::start), queued with [`enqueue`](Self::enqueue)
/// and sent in batches by background tasks.
pub struct InsertClient {
    config: InsertConfig,
    url: Url,
    insert_key: String,
    sink: Arc<dyn EventSink>,
    policy: Arc<dyn RetryPolicy>,
    observer: Arc<dyn PipelineObserver>,
    stats: Arc<Statistics>,
    pipeline: OnceCell<Pipeline>,
}

impl InsertClient {
    /// Client for the hosted endpoint with default batching settings.
    pub fn new(insert_key: impl Into<String>, account_id: impl Into<String>) -> Result<Self> {
        InsertClientBuilder::new(insert_key, account_id).build()
    }

    pub fn builder(
        insert_key: impl Into<String>,
        account_id: impl Into<String>,
    ) -> InsertClientBuilder {
        InsertClientBuilder::new(insert_key, account_id)
    }

    pub(crate) fn from_parts(
        config: InsertConfig,
        url: Url,
        insert_key: String,
        sink: Arc<dyn EventSink>,
        policy: Arc<dyn RetryPolicy>,
        observer: Arc<dyn PipelineObserver>,
        stats: Arc<Statistics>,
    ) -> Self {
        Self {
            config,
            url,
            insert_key,
            sink,
            policy,
            observer,
            stats,
            pipeline: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &InsertConfig {
        &self.config
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Check the endpoint looks like an insert URL and a key is present.
    pub fn validate(&self) -> Result<()> {
        if !INSERT_ENDPOINT.is_match(self.url.as_str()) {
            return Err(Error::validation_with_context(
                format!("invalid insert endpoint {}", self.url),
                ErrorContext::new()
                    .with_field_path("url")
                    .with_source("insert_client"),
            ));
        }
        if self.insert_key.is_empty() {
            return Err(Error::validation_with_context(
                "not a valid insert key",
                ErrorContext::new()
                    .with_field_path("insert_key")
                    .with_source("insert_client"),
            ));
        }
        Ok(())
    }

    /// Start batch mode: spawn the accumulator and flush timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::configuration_with_context(
                "start() must be called from within a tokio runtime",
                ErrorContext::new().with_source("insert_client"),
            ));
        }

        let mut launched = false;
        self.pipeline.get_or_init(|| {
            launched = true;
            let transmitter = Arc::new(Transmitter::new(
                Arc::clone(&self.sink),
                Arc::clone(&self.policy),
                self.config.request_timeout,
                Arc::clone(&self.stats),
                Arc::clone(&self.observer),
            ));
            Pipeline::spawn(&self.config, transmitter, Arc::clone(&self.stats))
        });
        if !launched {
            return Err(Error::AlreadyStarted);
        }

        info!(
            endpoint = %self.url,
            batch_size = self.config.batch_size,
            batch_time_ms = self.config.batch_time.as_millis() as u64,
            workers = self.config.worker_count,
            "insert client started in batch mode"
        );
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.pipeline.get().is_some()
    }

    fn queue(&self) -> Result<&EventQueue> {
        self.pipeline
            .get()
            .map(Pipeline::queue)
            .ok_or(Error::NotInitialized)
    }

    /// Queue one already-serialized event. Waits while the queue is full.
    pub async fn enqueue(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.queue()?.enqueue(payload.into()).await
    }

    /// Serialize `event` to JSON and queue it.
    pub async fn enqueue_event<T: Serialize + ?Sized>(&self, event: &T) -> Result<()> {
        let queue = self.queue()?;
        let payload = serde_json::to_vec(event)?;
        queue.enqueue(Bytes::from(payload)).await
    }

    /// Ask the pipeline to send what it has accumulated now.
    pub async fn flush(&self) -> Result<()> {
        let queue = self.queue()?;
        debug!("flushing insert client");
        queue.flush().await
    }

    /// Send one event, or an array of events, in a single request without
    /// batching or retries. Every event must carry an `eventType` field.
    pub async fn post_event<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let value = serde_json::to_value(data)?;
        check_event_type(&value)?;
        let body = Bytes::from(serde_json::to_vec(&value)?);
        debug!(bytes = body.len(), "posting event");

        match tokio::time::timeout(self.config.request_timeout, self.sink.send(body)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.config.request_timeout)),
        }
    }

    /// Forward every value received on `input` into the queue, starting
    /// batch mode first if needed. The task ends when `input` closes or the
    /// pipeline shuts down.
    pub fn start_listener(&self, mut input: mpsc::Receiver<Value>) -> Result<JoinHandle<()>> {
        if !self.is_started() {
            self.start()?;
        }
        let queue = self.queue()?.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = input.recv().await {
                let payload = match serde_json::to_vec(&event) {
                    Ok(p) => Bytes::from(p),
                    Err(e) => {
                        error!(error = %e, "listener could not serialize event");
                        continue;
                    }
                };
                if let Err(e) = queue.enqueue(payload).await {
                    error!(error = %e, "listener stopped");
                    return;
                }
            }
            debug!("listener input closed");
        });

        info!("insert client started channel listener");
        Ok(handle)
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Shared counters, for reading from elsewhere while the client runs.
    pub fn statistics_handle(&self) -> Arc<Statistics> {
        Arc::clone(&self.stats)
    }

    /// Stop batch mode: close the queue, send everything already queued and
    /// wait for in-flight batches to finish or be abandoned.
    pub async fn shutdown(&self) -> Result<()> {
        let pipeline = self.pipeline.get().ok_or(Error::NotInitialized)?;
        pipeline.shutdown().await;
        info!(stats = ?self.stats.snapshot(), "insert client shut down");
        Ok(())
    }
}

fn check_event_type(value: &Value) -> Result<()> {
    let has_type = |v: &Value| v.get("eventType").is_some();
    let ok = match value {
        Value::Object(_) => has_type(value),
        Value::Array(items) => !items.is_empty() && items.iter().all(has_type),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::validation_with_context(
            "event data must contain eventType field",
            ErrorContext::new()
                .with_field_path("eventType")
                .with_source("post_event"),
        ))
    }
}
