//! Periodic flush trigger.

use super::queue::{FlushHandle, FlushSignal};
use crate::stats::Statistics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Signals the accumulator once per window so partial batches do not wait
/// for a full batch that may never come. Never touches the batch itself.
pub struct FlushTimer {
    period: Duration,
    flush: FlushHandle,
    stats: Arc<Statistics>,
}

impl FlushTimer {
    pub fn new(period: Duration, flush: FlushHandle, stats: Arc<Statistics>) -> Self {
        Self {
            period,
            flush,
            stats,
        }
    }

    /// Tick until cancelled or the accumulator goes away. The first expiry
    /// is one full period after the call.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.stats.record_timer_expired();
                    debug!(period_ms = self.period.as_millis() as u64, "batch timer expired, flushing queued events");
                    if !self.flush.signal(FlushSignal::Timer) {
                        break;
                    }
                }
            }
        }
        debug!("flush timer stopped");
    }
}
