//! 事件批处理模块：有界队列、批次累积、定时刷新与带重试的发送。
//!
//! # Event Batching Module
//!
//! Producers push already-serialized events; background tasks group them into
//! batches and post each batch as one JSON array.
//!
//! ## Flow
//!
//! ```text
//! enqueue ──► EventQueue (bounded) ──► Accumulator ──► Transmitter task(s) ──► EventSink
//!                                         ▲
//!                      FlushTimer / flush()
//! ```
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`EventQueue`] | Bounded queue; a full queue makes `enqueue` wait |
//! | [`Accumulator`] | Collects payloads into a [`Batch`], the only owner of it |
//! | [`FlushTimer`] | Periodic flush signal for partial batches |
//! | [`Transmitter`] | Encode, send within a timeout, retry with a fixed wait |
//! | [`Pipeline`] | Spawns and stops the background tasks |
//!
//! ## Guarantees
//!
//! - Payload order inside a batch is the enqueue order.
//! - A payload is sent in exactly one batch. It is dropped only after its
//!   batch exhausts the retry policy, which is logged, counted and reported.
//! - At most `worker_count` transmissions run at once; when all are busy the
//!   accumulator waits, the queue fills, and producers wait in turn.
//! - Batches are independent; there is no ordering between them.

mod collector;
mod executor;
mod pipeline;
mod queue;
mod timer;

pub use collector::{Accumulator, AddResult, Batch, FlushKind, Phase};
pub use executor::{TransmitOutcome, Transmitter};
pub use pipeline::Pipeline;
pub use queue::{EventQueue, FlushHandle, FlushSignal};
pub use timer::FlushTimer;

/// One serialized event.
pub type Payload = bytes::Bytes;
