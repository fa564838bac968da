//! Retry policy for batch transmission.
//!
//! The transmitter asks the policy after every failed attempt whether to try
//! again and how long to wait first. Keeping the decision here lets the
//! backoff be tested without a transport or a clock.

use crate::Error;
use std::time::Duration;

/// Decides whether a failed attempt is followed by another one.
pub trait RetryPolicy: Send + Sync {
    /// Total attempts this policy allows, including the first.
    fn max_attempts(&self) -> u32;

    /// `attempt` is 1-based and refers to the attempt that just failed.
    /// Returns the delay before the next attempt, or `None` to give up.
    fn next_delay(&self, attempt: u32, error: &Error) -> Option<Duration>;
}

/// Same wait between every attempt, bounded number of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRetry {
    attempts: u32,
    wait: Duration,
}

impl FixedRetry {
    /// `attempts` is clamped to at least one.
    pub fn new(attempts: u32, wait: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            wait,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl RetryPolicy for FixedRetry {
    fn max_attempts(&self) -> u32 {
        self.attempts
    }

    fn next_delay(&self, attempt: u32, _error: &Error) -> Option<Duration> {
        if attempt >= self.attempts {
            return None;
        }
        Some(self.wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err() -> Error {
        Error::Timeout(Duration::from_secs(1))
    }

    #[test]
    fn test_fixed_retry_waits_until_last_attempt() {
        let policy = FixedRetry::new(3, Duration::from_millis(200));
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.next_delay(1, &err()), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(2, &err()), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(3, &err()), None);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let policy = FixedRetry::new(1, Duration::from_secs(5));
        assert_eq!(policy.next_delay(1, &err()), None);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = FixedRetry::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.next_delay(1, &err()), None);
    }
}
