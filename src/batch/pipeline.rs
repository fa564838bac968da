//! Background tasks of a running insert client.

use super::collector::{Accumulator, AddResult, Batch, FlushKind};
use super::executor::Transmitter;
use super::queue::{self, EventQueue, QueueReceiver};
use super::timer::FlushTimer;
use crate::config::InsertConfig;
use crate::stats::Statistics;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to the accumulator and flush timer tasks.
#[derive(Debug, Clone)]
pub struct Pipeline {
    queue: EventQueue,
    cancel: CancellationToken,
    stopped: watch::Receiver<bool>,
}

impl Pipeline {
    /// Spawn the accumulator and flush timer on the current tokio runtime.
    pub fn spawn(config: &InsertConfig, transmitter: Arc<Transmitter>, stats: Arc<Statistics>) -> Self {
        let (queue, rx) = queue::channel(config.batch_size, config.worker_count, stats.clone());
        let cancel = CancellationToken::new();
        let (stopped_tx, stopped) = watch::channel(false);

        let timer = FlushTimer::new(config.batch_time, queue.flush_handle(), stats.clone());
        tokio::spawn(timer.run(cancel.child_token()));

        let worker = BatchWorker {
            accumulator: Accumulator::new(config.batch_size),
            transmitter,
            permits: Arc::new(Semaphore::new(config.worker_count.max(1))),
            workers: u32::try_from(config.worker_count.max(1)).unwrap_or(u32::MAX),
            stats,
        };
        tokio::spawn(worker.run(rx, cancel.clone(), stopped_tx));

        Self {
            queue,
            cancel,
            stopped,
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Stop accepting events, send everything still queued and wait for all
    /// in-flight transmissions to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut stopped = self.stopped.clone();
        // Err only if the worker task died, nothing left to wait for then.
        let _ = stopped.wait_for(|s| *s).await;
    }
}

struct BatchWorker {
    accumulator: Accumulator,
    transmitter: Arc<Transmitter>,
    permits: Arc<Semaphore>,
    workers: u32,
    stats: Arc<Statistics>,
}

impl BatchWorker {
    async fn run(mut self, mut rx: QueueReceiver, cancel: CancellationToken, stopped: watch::Sender<bool>) {
        loop {
            // Queued events win over flush signals so a flush covers every
            // event enqueued before it.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                payload = rx.events.recv() => match payload {
                    Some(payload) => self.add(payload).await,
                    // Every producer handle is gone.
                    None => break,
                },
                Some(_signal) = rx.flush.recv() => self.flush_pending().await,
            }
        }

        rx.events.close();
        rx.flush.close();
        while let Some(payload) = rx.events.recv().await {
            self.add(payload).await;
        }
        self.flush_pending().await;

        // Every transmission holds a permit until it finishes.
        let _ = self.permits.acquire_many(self.workers).await;
        info!("batch worker stopped");
        let _ = stopped.send(true);
    }

    async fn add(&mut self, payload: super::Payload) {
        if let AddResult::Full { batch } = self.accumulator.add(payload) {
            self.dispatch(batch).await;
        }
    }

    async fn flush_pending(&mut self) {
        if let Some(batch) = self.accumulator.drain() {
            self.dispatch(batch).await;
        }
    }

    /// Hand `batch` to a transmission task once a worker slot is free.
    async fn dispatch(&mut self, batch: Batch) {
        self.stats.record_flush(batch.kind() == FlushKind::Full);
        debug!(
            batch_id = %batch.id(),
            events = batch.len(),
            kind = ?batch.kind(),
            "flushing batch"
        );

        let transmitter = Arc::clone(&self.transmitter);
        match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => {
                tokio::spawn(async move {
                    transmitter.transmit(batch).await;
                    drop(permit);
                });
            }
            // The semaphore is never closed; send inline rather than drop data.
            Err(_) => {
                transmitter.transmit(batch).await;
            }
        }
        self.accumulator.handed_off();
    }
}
