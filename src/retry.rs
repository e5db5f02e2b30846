//! Retry policy with exponential backoff.
//!
//! [`RetryPolicy`] decides, from a [`Classification`] and the number of
//! retries already made, whether a failed attempt is tried again and how long
//! to wait first. Only transport and gateway class failures are retried.

use crate::classify::{Classification, ErrorKind};
use std::time::Duration;

/// Retry configuration for generation calls.
///
/// # Example
///
/// ```
/// use content_gen_pipeline::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries, 2);
/// assert_eq!(policy.delay_for_retry(0), Duration::from_millis(1000));
/// assert_eq!(policy.delay_for_retry(1), Duration::from_millis(2000));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the first attempt). Default: 2.
    pub max_retries: u32,

    /// Delay before the first retry. Default: 1 second.
    pub initial_delay: Duration,

    /// Multiplier applied per retry. Default: 2.0.
    pub multiplier: f64,

    /// Upper bound on a single delay. Default: 30 seconds.
    pub max_delay: Duration,

    /// Jitter strategy. Default: None (delays are exact).
    pub jitter: JitterStrategy,

    /// `ApiError` statuses that are retried. Default: `[429, 503, 504]`.
    pub retryable_statuses: Vec<u16>,

    /// Whether an attempt that hit the timeout guard is retried. Default: `true`.
    pub retry_timeouts: bool,
}

/// Jitter strategy applied on top of the exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Delay is exactly the calculated value.
    None,

    /// Random value in `[0, calculated_delay]`.
    Full,

    /// `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

/// Outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    /// Wait before the next attempt. Zero when not retrying.
    pub delay: Duration,
}

impl RetryDecision {
    pub fn stop() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts a logical call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Choose whether timed-out attempts are retried.
    pub fn with_retry_timeouts(mut self, enabled: bool) -> Self {
        self.retry_timeouts = enabled;
        self
    }

    /// Set the jitter strategy.
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether a classified failure belongs to a retryable class at all.
    pub fn is_retryable(&self, classification: &Classification) -> bool {
        match classification.kind {
            ErrorKind::NetworkFailure => true,
            ErrorKind::Timeout => self.retry_timeouts,
            ErrorKind::ApiError => classification
                .status_code
                .is_some_and(|s| self.retryable_statuses.contains(&s)),
            ErrorKind::ParseFailure | ErrorKind::ValidationFailure => false,
        }
    }

    /// Decide whether to retry after `retry_count` retries already made.
    pub fn decide(&self, classification: &Classification, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retries || !self.is_retryable(classification) {
            return RetryDecision::stop();
        }
        RetryDecision {
            should_retry: true,
            delay: self.delay_for_retry(retry_count),
        }
    }

    /// Delay before retry number `retry_count` (0-indexed).
    ///
    /// `initial_delay * multiplier^retry_count`, capped at `max_delay`, then
    /// jittered.
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        // max() also maps a NaN product to zero.
        let base = (self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent)).max(0.0);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: JitterStrategy::None,
            retryable_statuses: vec![429, 503, 504],
            retry_timeouts: true,
        }
    }
}
