//! 重试策略模块：批次发送失败后的重试与等待决策。
//!
//! # Resilience Module
//!
//! Failed batch transmissions are retried a bounded number of times with a
//! fixed wait in between. The policy is a trait so callers can plug in their
//! own schedule through [`InsertClientBuilder::retry_policy`](crate::InsertClientBuilder::retry_policy).
//!
//! ```rust
//! use insights_rs::resilience::{FixedRetry, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = FixedRetry::new(3, Duration::from_secs(5));
//! assert_eq!(policy.max_attempts(), 3);
//! ```

pub mod retry;

pub use retry::{FixedRetry, RetryPolicy};
