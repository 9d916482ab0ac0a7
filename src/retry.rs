//! Reconnect backoff scheduling.
//!
//! Each [`ErrorCategory`] has its own growth law and cap:
//!
//! | Category      | First delay | Growth      | Cap                 |
//! |---------------|-------------|-------------|---------------------|
//! | `Network`     | 250 ms      | +250 ms     | 16 s                |
//! | `HttpError`   | 5 s         | x2          | 320 s               |
//! | `RateLimited` | 60 s        | x2          | none unless configured |
//!
//! A successful connect or document resets the delay to zero, so the next
//! failure starts again at the first delay of its category.

use std::time::Duration;

use crate::error::ErrorCategory;

/// Linear step for network failures (in milliseconds).
pub const NETWORK_STEP_MS: u64 = 250;

/// Maximum delay after network failures (in milliseconds).
pub const NETWORK_MAX_DELAY_MS: u64 = 16_000;

/// First delay after an HTTP error status (in milliseconds).
pub const HTTP_ERROR_BASE_DELAY_MS: u64 = 5_000;

/// Maximum delay after HTTP error statuses (in milliseconds).
pub const HTTP_ERROR_MAX_DELAY_MS: u64 = 320_000;

/// First delay after a rate-limit response (in milliseconds).
pub const RATE_LIMITED_BASE_DELAY_MS: u64 = 60_000;

/// Backoff parameters that may be tuned through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackoffPolicy {
    /// Optional ceiling for `RateLimited` delays; `None` keeps doubling
    pub rate_limit_cap_ms: Option<u64>,
}

impl BackoffPolicy {
    /// Policy with a ceiling on rate-limit backoff.
    pub fn with_rate_limit_cap(cap_ms: u64) -> Self {
        Self {
            rate_limit_cap_ms: Some(cap_ms),
        }
    }

    /// Compute the delay that follows `current_ms` after a failure of the
    /// given category.
    pub fn next_delay(&self, current_ms: u64, category: ErrorCategory) -> u64 {
        match category {
            ErrorCategory::Network => current_ms
                .saturating_add(NETWORK_STEP_MS)
                .min(NETWORK_MAX_DELAY_MS),
            ErrorCategory::HttpError => {
                if current_ms == 0 {
                    HTTP_ERROR_BASE_DELAY_MS
                } else {
                    current_ms.saturating_mul(2).min(HTTP_ERROR_MAX_DELAY_MS)
                }
            }
            ErrorCategory::RateLimited => {
                let next = if current_ms == 0 {
                    RATE_LIMITED_BASE_DELAY_MS
                } else {
                    current_ms.saturating_mul(2)
                };
                match self.rate_limit_cap_ms {
                    Some(cap) => next.min(cap),
                    None => next,
                }
            }
        }
    }
}

/// Pure transition using the default (uncapped rate-limit) policy.
pub fn next_delay(current_ms: u64, category: ErrorCategory) -> u64 {
    BackoffPolicy::default().next_delay(current_ms, category)
}

/// Delay carried across connection attempts for the life of the
/// ingestion task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    current_delay_ms: u64,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current delay in milliseconds.
    pub fn current_delay_ms(&self) -> u64 {
        self.current_delay_ms
    }

    /// Mark a healthy stream: the next failure starts a fresh sequence.
    pub fn reset(&mut self) {
        self.current_delay_ms = 0;
    }

    /// Advance the delay for a failure and return how long to wait.
    pub fn record_failure(&mut self, category: ErrorCategory, policy: &BackoffPolicy) -> Duration {
        self.current_delay_ms = policy.next_delay(self.current_delay_ms, category);
        Duration::from_millis(self.current_delay_ms)
    }
}
