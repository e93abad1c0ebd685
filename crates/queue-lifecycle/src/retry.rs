//! # Retry Policy Module
//!
//! Bounded retry schedule for provisioning and readiness polling.
//!
//! The management API may answer a create call with no description or keep
//! failing reads while a new queue is provisioned. Both loops are bounded by
//! a [`RetryPolicy`]; exhausting it surfaces [`QueueError::Timeout`].
//!
//! [`QueueError::Timeout`]: crate::error::QueueError::Timeout

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy configuration
///
/// # Examples
///
/// ```rust
/// use queue_lifecycle::retry::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 30 attempts, fixed 2s delay
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.calculate_delay(5), Duration::from_secs(2));
///
/// // Exponential policy
/// let policy = RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(5), 2.0);
/// assert_eq!(policy.calculate_delay(1), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier; 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(30, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum retry attempts
    /// * `initial_delay` - Delay before the first retry
    /// * `max_delay` - Delay cap
    /// * `backoff_multiplier` - Growth factor per attempt
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Policy that waits the same delay between every attempt
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, delay, 1.0)
    }

    /// Calculate delay for a specific retry attempt
    ///
    /// Uses `delay = initial * multiplier^attempt`, capped at `max_delay`.
    ///
    /// # Arguments
    ///
    /// * `attempt` - Retry attempt number (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay_secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let capped_delay_secs = base_delay_secs.min(self.max_delay.as_secs_f64());

        if capped_delay_secs.is_finite() && capped_delay_secs >= 0.0 {
            Duration::from_secs_f64(capped_delay_secs)
        } else {
            self.max_delay
        }
    }

    /// Check if we should retry for this attempt number
    ///
    /// # Examples
    ///
    /// ```rust
    /// use queue_lifecycle::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
    ///
    /// assert!(policy.should_retry(0));
    /// assert!(policy.should_retry(2));
    /// assert!(!policy.should_retry(3));
    /// ```
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
