//! 管道观测模块：批次投递、重试与丢弃事件的结构化通知。
//!
//! Pipeline observation.
//!
//! The transmitter reports the outcome of every batch through a
//! [`PipelineObserver`]. Counters in [`Statistics`](crate::Statistics) say how
//! much data was lost; observer events say which batch and why, so
//! applications can alert on abandoned data instead of scraping logs.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`PipelineEvent`] | Typed outcome of one send attempt or batch |
//! | [`PipelineObserver`] | Trait for event destinations |
//! | [`NoopObserver`] | Default, discards everything |
//! | [`InMemoryObserver`] | Bounded in-memory sink for tests and diagnostics |

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Something that happened to a batch inside the transmitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    BatchDelivered {
        batch_id: String,
        events: usize,
        attempts: u32,
    },
    BatchRetried {
        batch_id: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
        /// Whether the failure looked temporary (timeout, network, 5xx, 429).
        transient: bool,
    },
    /// All attempts failed and the batch's events were discarded.
    BatchAbandoned {
        batch_id: String,
        events: usize,
        attempts: u32,
        error: String,
        /// Classification of the last failure.
        transient: bool,
    },
}

impl PipelineEvent {
    pub fn batch_id(&self) -> &str {
        match self {
            PipelineEvent::BatchDelivered { batch_id, .. }
            | PipelineEvent::BatchRetried { batch_id, .. }
            | PipelineEvent::BatchAbandoned { batch_id, .. } => batch_id,
        }
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, PipelineEvent::BatchAbandoned { .. })
    }
}

/// Destination for [`PipelineEvent`]s.
///
/// Called from transmission tasks; implementations must not block.
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn report(&self, event: PipelineEvent) -> Result<()>;
}

/// Observer that drops every event.
pub struct NoopObserver;

#[async_trait]
impl PipelineObserver for NoopObserver {
    async fn report(&self, _: PipelineEvent) -> Result<()> {
        Ok(())
    }
}

pub fn noop_observer() -> Arc<dyn PipelineObserver> {
    Arc::new(NoopObserver)
}

/// Keeps the most recent `max_events` events in memory.
pub struct InMemoryObserver {
    events: Arc<RwLock<Vec<PipelineEvent>>>,
    max_events: usize,
}

impl InMemoryObserver {
    pub fn new(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: max.max(1),
        }
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn abandoned(&self) -> Vec<PipelineEvent> {
        self.events()
            .into_iter()
            .filter(PipelineEvent::is_abandoned)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PipelineObserver for InMemoryObserver {
    async fn report(&self, event: PipelineEvent) -> Result<()> {
        let mut events = self.events.write().unwrap_or_else(|p| p.into_inner());
        events.push(event);
        if events.len() > self.max_events {
            events.remove(0);
        }
        Ok(())
    }
}
