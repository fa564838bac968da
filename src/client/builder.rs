use crate::client::insert::InsertClient;
use crate::config::{account_endpoint, InsertConfig, DEFAULT_INSERT_URL};
use crate::resilience::{FixedRetry, RetryPolicy};
use crate::stats::Statistics;
use crate::telemetry::{noop_observer, PipelineObserver};
use crate::transport::{EventSink, HttpTransport};
use crate::Result;
use std::sync::Arc;

/// Builder for creating insert clients with custom configuration.
///
/// Keep this surface area small and predictable (developer-friendly).
pub struct InsertClientBuilder {
    insert_key: String,
    account_id: String,
    config: InsertConfig,
    /// Override base URL (regional endpoints, mock servers in tests)
    base_url_override: Option<String>,
    sink: Option<Arc<dyn EventSink>>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    observer: Arc<dyn PipelineObserver>,
}

impl InsertClientBuilder {
    pub fn new(insert_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            insert_key: insert_key.into(),
            account_id: account_id.into(),
            config: InsertConfig::default(),
            base_url_override: None,
            sink: None,
            retry_policy: None,
            observer: noop_observer(),
        }
    }

    /// Replace the whole batching configuration.
    pub fn config(mut self, config: InsertConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the `.../v1/accounts` base the account id is appended to.
    pub fn base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Send batches somewhere other than the HTTP endpoint.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the fixed-wait policy built from `retry_count`/`retry_wait`.
    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Inject a pipeline observer. Default is a no-op observer.
    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Build the client. Does not start batching; see [`InsertClient::start`].
    pub fn build(self) -> Result<InsertClient> {
        self.config.validate()?;

        let base = self
            .base_url_override
            .as_deref()
            .unwrap_or(DEFAULT_INSERT_URL);
        let url = account_endpoint(base, &self.account_id, "events")?;

        let sink = match self.sink {
            Some(sink) => sink,
            None => Arc::new(HttpTransport::new(
                url.clone(),
                self.insert_key.clone(),
                self.config.request_timeout,
                self.config.compression,
            )?),
        };

        let policy = self.retry_policy.unwrap_or_else(|| {
            Arc::new(FixedRetry::new(
                self.config.retry_count,
                self.config.retry_wait,
            ))
        });

        Ok(InsertClient::from_parts(
            self.config,
            url,
            self.insert_key,
            sink,
            policy,
            self.observer,
            Arc::new(Statistics::new()),
        ))
    }
}
