//! Batch transmitter.

use super::collector::Batch;
use crate::resilience::RetryPolicy;
use crate::stats::Statistics;
use crate::telemetry::{PipelineEvent, PipelineObserver};
use crate::transport::EventSink;
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How a batch's transmission ended.
#[derive(Debug)]
pub enum TransmitOutcome {
    Delivered { attempts: u32 },
    /// Every attempt failed; `error` is [`Error::RetriesExhausted`].
    Abandoned { attempts: u32, error: Error },
}

impl TransmitOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TransmitOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            TransmitOutcome::Delivered { attempts } | TransmitOutcome::Abandoned { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Encodes a batch, sends it and retries per the policy.
///
/// Failures never escape: an exhausted batch is logged, counted and reported
/// to the observer, and the caller just gets the outcome.
pub struct Transmitter {
    sink: Arc<dyn EventSink>,
    policy: Arc<dyn RetryPolicy>,
    request_timeout: Duration,
    stats: Arc<Statistics>,
    observer: Arc<dyn PipelineObserver>,
}

impl Transmitter {
    pub fn new(
        sink: Arc<dyn EventSink>,
        policy: Arc<dyn RetryPolicy>,
        request_timeout: Duration,
        stats: Arc<Statistics>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            sink,
            policy,
            request_timeout,
            stats,
            observer,
        }
    }

    pub async fn transmit(&self, batch: Batch) -> TransmitOutcome {
        let body = batch.encode();
        let batch_id = batch.id().to_string();
        let events = batch.len();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.stats.record_bytes(body.len());

            let result = match tokio::time::timeout(self.request_timeout, self.sink.send(body.clone())).await {
                Ok(r) => r,
                Err(_) => Err(Error::Timeout(self.request_timeout)),
            };

            let err = match result {
                Ok(()) => {
                    self.stats.record_processed(events);
                    debug!(%batch_id, events, attempt, "batch delivered");
                    let _ = self
                        .observer
                        .report(PipelineEvent::BatchDelivered {
                            batch_id,
                            events,
                            attempts: attempt,
                        })
                        .await;
                    return TransmitOutcome::Delivered { attempts: attempt };
                }
                Err(e) => e,
            };

            self.stats.record_send_error();
            let transient = err.is_transient();
            let failure = Error::TransientSendFailure {
                attempt,
                source: Box::new(err),
            };

            match self.policy.next_delay(attempt, &failure) {
                Some(delay) => {
                    warn!(
                        %batch_id,
                        attempt,
                        max_attempts,
                        transient,
                        error = %failure,
                        "failed to send events, will retry"
                    );
                    self.stats.record_retry();
                    let _ = self
                        .observer
                        .report(PipelineEvent::BatchRetried {
                            batch_id: batch_id.clone(),
                            attempt,
                            max_attempts,
                            error: failure.to_string(),
                            transient,
                        })
                        .await;
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let exhausted = Error::RetriesExhausted {
                        attempts: attempt,
                        events,
                        last_error: Box::new(failure),
                    };
                    error!(
                        %batch_id,
                        events,
                        attempt,
                        max_attempts,
                        transient,
                        error = %exhausted,
                        "abandoning batch"
                    );
                    self.stats.record_abandoned(events);
                    let _ = self
                        .observer
                        .report(PipelineEvent::BatchAbandoned {
                            batch_id,
                            events,
                            attempts: attempt,
                            error: exhausted.to_string(),
                            transient,
                        })
                        .await;
                    return TransmitOutcome::Abandoned {
                        attempts: attempt,
                        error: exhausted,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::collector::FlushKind;
    use crate::resilience::FixedRetry;
    use crate::telemetry::InMemoryObserver;
    use crate::Result;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` calls, then succeeds.
    struct FlakySink {
        failures: u32,
        status: u16,
        calls: AtomicU32,
        bodies: Mutex<Vec<Bytes>>,
    }

    impl FlakySink {
        fn new(failures: u32) -> Self {
            Self::with_status(failures, 503)
        }

        fn with_status(failures: u32, status: u16) -> Self {
            Self {
                failures,
                status,
                calls: AtomicU32::new(0),
                bodies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EventSink for FlakySink {
        async fn send(&self, body: Bytes) -> Result<()> {
            self.bodies.lock().unwrap().push(body);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(Error::Remote {
                    status: self.status,
                    message: "unavailable".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct HangingSink;

    #[async_trait]
    impl EventSink for HangingSink {
        async fn send(&self, _body: Bytes) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn batch(n: usize) -> Batch {
        Batch::new(
            (0..n).map(|i| Bytes::from(format!("{{\"n\":{i}}}"))).collect(),
            FlushKind::Partial,
        )
    }

    fn transmitter(
        sink: Arc<dyn EventSink>,
        attempts: u32,
    ) -> (Transmitter, Arc<Statistics>, Arc<InMemoryObserver>) {
        let stats = Arc::new(Statistics::new());
        let observer = Arc::new(InMemoryObserver::new(16));
        let t = Transmitter::new(
            sink,
            Arc::new(FixedRetry::new(attempts, Duration::from_secs(5))),
            Duration::from_secs(10),
            stats.clone(),
            observer.clone(),
        );
        (t, stats, observer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let sink = Arc::new(FlakySink::new(0));
        let (t, stats, observer) = transmitter(sink.clone(), 3);

        let outcome = t.transmit(batch(4)).await;
        assert!(outcome.is_delivered());
        assert_eq!(outcome.attempts(), 1);

        let snap = stats.snapshot();
        assert_eq!(snap.processed_event_count, 4);
        assert_eq!(snap.retry_count, 0);
        assert_eq!(observer.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_attempt() {
        let sink = Arc::new(FlakySink::new(2));
        let (t, stats, observer) = transmitter(sink.clone(), 3);

        let start = tokio::time::Instant::now();
        let outcome = t.transmit(batch(5)).await;
        assert!(outcome.is_delivered());
        assert_eq!(outcome.attempts(), 3);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11));

        let snap = stats.snapshot();
        assert_eq!(snap.processed_event_count, 5);
        assert_eq!(snap.retry_count, 2);
        assert_eq!(snap.send_error_count, 2);
        assert_eq!(snap.abandoned_batch_count, 0);
        assert!(observer.abandoned().is_empty());

        // Same body on every attempt.
        let bodies = sink.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().all(|b| b == &bodies[0]));
        assert_eq!(snap.byte_count, 3 * bodies[0].len() as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_abandons_without_processing() {
        let sink = Arc::new(FlakySink::new(u32::MAX));
        let (t, stats, observer) = transmitter(sink.clone(), 3);

        let outcome = t.transmit(batch(6)).await;
        match outcome {
            TransmitOutcome::Abandoned { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(error, Error::RetriesExhausted { events: 6, .. }));
            }
            other => panic!("expected abandonment, got {other:?}"),
        }

        let snap = stats.snapshot();
        assert_eq!(snap.processed_event_count, 0);
        assert_eq!(snap.retry_count, 2);
        assert_eq!(snap.abandoned_batch_count, 1);
        assert_eq!(snap.abandoned_event_count, 6);
        assert_eq!(observer.abandoned().len(), 1);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_carry_failure_classification() {
        let (t, _, observer) = transmitter(Arc::new(FlakySink::new(1)), 3);
        assert!(t.transmit(batch(2)).await.is_delivered());
        match &observer.events()[0] {
            PipelineEvent::BatchRetried { transient, .. } => assert!(*transient),
            other => panic!("expected retry event, got {other:?}"),
        }

        let (t, _, observer) = transmitter(Arc::new(FlakySink::with_status(u32::MAX, 403)), 2);
        assert!(!t.transmit(batch(2)).await.is_delivered());
        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            PipelineEvent::BatchRetried { transient: false, .. }
        ));
        assert!(matches!(
            events[1],
            PipelineEvent::BatchAbandoned { transient: false, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let (t, stats, _) = transmitter(Arc::new(HangingSink), 2);

        let outcome = t.transmit(batch(1)).await;
        match outcome {
            TransmitOutcome::Abandoned { error, .. } => {
                assert!(error.to_string().contains("timed out"));
            }
            other => panic!("expected abandonment, got {other:?}"),
        }
        assert_eq!(stats.snapshot().send_error_count, 2);
    }
}
