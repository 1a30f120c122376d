//! Retry policy for the compare-and-store loop.
//!
//! A conflict means another writer got there first, so the next attempt
//! reloads and recomputes from scratch. The policy bounds how many times
//! that happens and spaces the attempts out with exponential backoff so
//! contending writers stop colliding in lockstep.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for retry behavior on compare-and-store conflicts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of load/compare-and-store attempts per ingest.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay", with = "crate::serde_millis")]
    pub base_delay: Duration,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_delay", with = "crate::serde_millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Add random jitter (±25%) to each delay.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// Optional wall-clock budget for the whole loop, in milliseconds.
    #[serde(default, with = "crate::serde_millis::option")]
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Attempts actually made; a zero setting still gets one attempt.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        // Exponential backoff: base_delay * multiplier^(attempt-1)
        let max_nanos = self.max_delay.as_nanos() as f64;
        let exponential = self.base_delay.as_nanos() as f64
            * self
                .backoff_multiplier
                .max(1.0)
                .powi((attempt - 1).min(i32::MAX as u32) as i32);
        let capped = exponential.min(max_nanos);

        let nanos = if self.jitter {
            capped * (0.75 + fastrand::f64() * 0.5)
        } else {
            capped
        };

        Duration::from_nanos(nanos.min(max_nanos).round() as u64)
    }
}

fn default_max_attempts() -> u32 {
    16
}

fn default_base_delay() -> Duration {
    Duration::from_millis(2)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_secs(1))
            .with_jitter(false);

        assert_eq!(policy.delay_after(0), Duration::ZERO);
        assert_eq!(policy.delay_after(1), Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
        assert_eq!(policy.delay_after(3), Duration::from_millis(40));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50))
            .with_jitter(false);
        assert_eq!(policy.delay_after(10), Duration::from_millis(50));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(10));

        for _ in 0..100 {
            let delay = policy.delay_after(1);
            assert!(delay >= Duration::from_millis(74), "{delay:?}");
            assert!(delay <= Duration::from_millis(126), "{delay:?}");
        }
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).attempts(), 1);
    }

    #[test]
    fn deserializes_millis_with_defaults() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_attempts": 4, "base_delay": 7, "deadline": 1500}"#)
                .unwrap();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(7));
        assert_eq!(policy.max_delay, Duration::from_millis(100));
        assert_eq!(policy.deadline, Some(Duration::from_millis(1500)));
    }
}
