//! Pipeline counters.
//!
//! Written from producers, the accumulator, the flush timer and every
//! transmission task, so each field is an independent atomic. Counters only
//! ever grow. A snapshot is a set of relaxed loads and may be mid-update
//! across fields.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all tasks of one client.
#[derive(Debug, Default)]
pub struct Statistics {
    event_count: AtomicU64,
    processed_event_count: AtomicU64,
    flush_count: AtomicU64,
    byte_count: AtomicU64,
    full_flush_count: AtomicU64,
    partial_flush_count: AtomicU64,
    timer_expired_count: AtomicU64,
    retry_count: AtomicU64,
    send_error_count: AtomicU64,
    abandoned_batch_count: AtomicU64,
    abandoned_event_count: AtomicU64,
}

/// Point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// Events accepted by `enqueue`.
    pub event_count: u64,
    /// Events in batches that were delivered.
    pub processed_event_count: u64,
    /// Non-empty batches handed to the transmitter.
    pub flush_count: u64,
    /// Encoded bytes, counted once per send attempt.
    pub byte_count: u64,
    pub full_flush_count: u64,
    pub partial_flush_count: u64,
    pub timer_expired_count: u64,
    /// Failed attempts that were followed by another attempt.
    pub retry_count: u64,
    /// Failed attempts of any kind.
    pub send_error_count: u64,
    pub abandoned_batch_count: u64,
    pub abandoned_event_count: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enqueued(&self) {
        self.event_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, full: bool) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        if full {
            self.full_flush_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.partial_flush_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_timer_expired(&self) {
        self.timer_expired_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bytes(&self, n: usize) {
        self.byte_count.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self, events: usize) {
        self.processed_event_count
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self, events: usize) {
        self.abandoned_batch_count.fetch_add(1, Ordering::Relaxed);
        self.abandoned_event_count
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            event_count: self.event_count.load(Ordering::Relaxed),
            processed_event_count: self.processed_event_count.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            byte_count: self.byte_count.load(Ordering::Relaxed),
            full_flush_count: self.full_flush_count.load(Ordering::Relaxed),
            partial_flush_count: self.partial_flush_count.load(Ordering::Relaxed),
            timer_expired_count: self.timer_expired_count.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
            send_error_count: self.send_error_count.load(Ordering::Relaxed),
            abandoned_batch_count: self.abandoned_batch_count.load(Ordering::Relaxed),
            abandoned_event_count: self.abandoned_event_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_statistics_are_zero() {
        assert_eq!(Statistics::new().snapshot(), StatisticsSnapshot::default());
    }

    #[test]
    fn test_flush_classification_counters() {
        let stats = Statistics::new();
        stats.record_flush(true);
        stats.record_flush(false);
        stats.record_flush(false);
        let snap = stats.snapshot();
        assert_eq!(snap.flush_count, 3);
        assert_eq!(snap.full_flush_count, 1);
        assert_eq!(snap.partial_flush_count, 2);
    }

    #[test]
    fn test_abandoned_counts_batches_and_events() {
        let stats = Statistics::new();
        stats.record_abandoned(7);
        stats.record_abandoned(3);
        let snap = stats.snapshot();
        assert_eq!(snap.abandoned_batch_count, 2);
        assert_eq!(snap.abandoned_event_count, 10);
        assert_eq!(snap.processed_event_count, 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(Statistics::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    s.record_enqueued();
                    s.record_bytes(2);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let snap = stats.snapshot();
        assert_eq!(snap.event_count, 8000);
        assert_eq!(snap.byte_count, 16000);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = Statistics::new();
        stats.record_timer_expired();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["timer_expired_count"], 1);
    }
}
