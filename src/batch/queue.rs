//! Producer-facing ends of the pipeline channels.

use super::Payload;
use crate::stats::Statistics;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Why the accumulator is asked to send early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushSignal {
    Explicit,
    Timer,
}

/// Sends flush signals to the accumulator.
#[derive(Debug, Clone)]
pub struct FlushHandle {
    tx: mpsc::Sender<FlushSignal>,
}

impl FlushHandle {
    /// Wait for room in the signal channel, then signal.
    pub async fn flush(&self) -> Result<()> {
        self.tx
            .send(FlushSignal::Explicit)
            .await
            .map_err(|_| Error::Closed)
    }

    /// Signal without waiting. A signal that is already pending covers this
    /// one, so a full channel still counts as signalled. Returns `false` only
    /// once the accumulator is gone.
    pub fn signal(&self, signal: FlushSignal) -> bool {
        match self.tx.try_send(signal) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Bounded queue of payloads awaiting batching.
///
/// Cloning is cheap; every clone feeds the same accumulator.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: mpsc::Sender<Payload>,
    flush: FlushHandle,
    stats: Arc<Statistics>,
}

/// Accumulator-side ends.
pub(crate) struct QueueReceiver {
    pub(crate) events: mpsc::Receiver<Payload>,
    pub(crate) flush: mpsc::Receiver<FlushSignal>,
}

/// `capacity` bounds queued payloads, `flush_capacity` bounds pending signals.
pub(crate) fn channel(
    capacity: usize,
    flush_capacity: usize,
    stats: Arc<Statistics>,
) -> (EventQueue, QueueReceiver) {
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (flush_tx, flush_rx) = mpsc::channel(flush_capacity.max(1));
    (
        EventQueue {
            events: events_tx,
            flush: FlushHandle { tx: flush_tx },
            stats,
        },
        QueueReceiver {
            events: events_rx,
            flush: flush_rx,
        },
    )
}

impl EventQueue {
    /// Queue one payload, waiting while the queue is full.
    pub async fn enqueue(&self, payload: Payload) -> Result<()> {
        self.events.send(payload).await.map_err(|_| Error::Closed)?;
        self.stats.record_enqueued();
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.flush.flush().await
    }

    pub fn flush_handle(&self) -> FlushHandle {
        self.flush.clone()
    }

    /// Maximum number of queued payloads.
    pub fn capacity(&self) -> usize {
        self.events.max_capacity()
    }

    /// Payloads currently waiting for the accumulator.
    pub fn len(&self) -> usize {
        self.events.max_capacity() - self.events.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}
