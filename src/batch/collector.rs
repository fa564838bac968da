//! Batch accumulator.
//!
//! Pure state: no channels, no clock. The pipeline task feeds it payloads and
//! flush signals and ships whatever [`Batch`] it hands back.

use super::Payload;
use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// Upper bound on the buffer reserved up front; larger batches grow on demand.
const INITIAL_CAPACITY: usize = 1_024;

/// Accumulator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has been enqueued yet.
    Idle,
    Accumulating,
    /// A batch has been taken and not yet handed to the transmitter.
    Flushing,
}

/// Why a batch left the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// Reached the configured batch size.
    Full,
    /// Sent early by a timer or explicit flush.
    Partial,
}

/// Ordered events sent in one request.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    kind: FlushKind,
    payloads: Vec<Payload>,
}

impl Batch {
    pub fn new(payloads: Vec<Payload>, kind: FlushKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payloads,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> FlushKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    /// Size of [`encode`](Self::encode)'s output.
    pub fn encoded_len(&self) -> usize {
        let commas = self.payloads.len().saturating_sub(1);
        2 + commas + self.payloads.iter().map(Bytes::len).sum::<usize>()
    }

    /// Join the already-serialized payloads into one JSON array, in order.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(b'[');
        for (i, payload) in self.payloads.iter().enumerate() {
            if i > 0 {
                buf.put_u8(b',');
            }
            buf.put_slice(payload);
        }
        buf.put_u8(b']');
        buf.freeze()
    }

    pub fn into_payloads(self) -> Vec<Payload> {
        self.payloads
    }
}

#[derive(Debug)]
pub enum AddResult {
    Added { count: usize },
    Full { batch: Batch },
}

impl AddResult {
    pub fn is_full(&self) -> bool {
        matches!(self, AddResult::Full { .. })
    }
}

/// Collects payloads until the batch is full or a flush is requested.
#[derive(Debug)]
pub struct Accumulator {
    batch_size: usize,
    items: Vec<Payload>,
    phase: Phase,
}

impl Accumulator {
    /// `batch_size` is clamped to at least one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            items: Vec::with_capacity(batch_size.min(INITIAL_CAPACITY)),
            phase: Phase::Idle,
        }
    }

    pub fn add(&mut self, payload: Payload) -> AddResult {
        self.phase = Phase::Accumulating;
        self.items.push(payload);
        if self.items.len() >= self.batch_size {
            AddResult::Full {
                batch: self.take(FlushKind::Full),
            }
        } else {
            AddResult::Added {
                count: self.items.len(),
            }
        }
    }

    /// Take whatever is held for an early flush. `None` when empty.
    pub fn drain(&mut self) -> Option<Batch> {
        if self.items.is_empty() {
            return None;
        }
        let kind = if self.items.len() >= self.batch_size {
            FlushKind::Full
        } else {
            FlushKind::Partial
        };
        Some(self.take(kind))
    }

    /// The batch taken by `add` or `drain` now belongs to a transmitter.
    pub fn handed_off(&mut self) {
        if self.phase == Phase::Flushing {
            self.phase = Phase::Accumulating;
        }
    }

    fn take(&mut self, kind: FlushKind) -> Batch {
        self.phase = Phase::Flushing;
        let items = std::mem::replace(
            &mut self.items,
            Vec::with_capacity(self.batch_size.min(INITIAL_CAPACITY)),
        );
        Batch::new(items, kind)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
