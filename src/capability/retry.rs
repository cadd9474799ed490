// ABOUTME: Retry policy for capability invocations
// ABOUTME: Linear backoff driven by a non-blocking timer, recoverable errors only

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CapabilityError;

/// How many attempts a capability invocation gets and how long to wait
/// between them. The delay before retry `n` is `n * backoff_unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts,
            backoff_unit,
        }
    }

    /// A policy that never retries, useful for capabilities whose failures
    /// are always deterministic.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_unit: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry_index` (1-based).
    pub fn delay_before(&self, retry_index: u32) -> Duration {
        self.backoff_unit * retry_index
    }

    /// Whether another attempt is allowed after `retries_used` retries ended
    /// in `error`.
    pub fn allows_retry(&self, retries_used: u32, error: &CapabilityError) -> bool {
        error.is_recoverable() && retries_used + 1 < self.max_attempts
    }
}
