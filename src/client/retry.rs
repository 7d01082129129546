//! Retry policy.
//!
//! Stateless description of how many attempts a call gets, how long to wait
//! between them, and which failures qualify. Only failures that happen
//! before any response is received are retried; a received response, of any
//! status, is terminal.

use std::time::Duration;

use rand::Rng;

use crate::client::TransportError;
use crate::config::HttpConfig;

/// Attempt ceiling, exponential backoff floor/ceiling and jitter toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry, and the backoff floor
    pub base_delay: Duration,
    /// Backoff ceiling
    pub max_delay: Duration,
    /// Add up to 10% random jitter (still capped at `max_delay`)
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: true,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Deterministic delays, for tests and latency-sensitive callers.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;

        let exponential_base = 2u64.saturating_pow(attempt - 1);
        let capped = base_ms.saturating_mul(exponential_base).min(max_ms);

        let jitter_range = capped / 10;
        let jitter = if self.jitter && jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis((capped + jitter).min(max_ms))
    }

    /// Whether a failed attempt may be followed by another one.
    pub fn should_retry(&self, attempt: u32, error: &TransportError) -> bool {
        attempt < self.max_attempts && error.kind.is_retryable()
    }
}

/// One failed attempt of an outbound call, as reported to logs.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    pub last_error: TransportError,
    pub next_delay: Duration,
}
