//! Client configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// How `retry` repeats a transaction after a transient failure.
///
/// A transaction is run again only when its error is tagged
/// [`ShouldRetry`](crate::ErrorTag::ShouldRetry) (serialization conflicts,
/// deadlocks, a dropped link) and the connection is still open. Between
/// runs the caller sleeps for a delay that starts at `initial_backoff` and
/// grows by `backoff_multiplier` per further retry, never exceeding
/// `max_backoff`.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RetryPolicy {
    /// Re-runs allowed after the first run fails; 0 disables retrying.
    pub max_retries: u32,
    /// Sleep before the first re-run.
    pub initial_backoff: Duration,
    /// Upper bound on any single sleep.
    pub max_backoff: Duration,
    /// Growth factor applied to the sleep for each further re-run.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many re-runs are allowed.
    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the sleep before the first re-run.
    #[must_use]
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set the upper bound on a single sleep.
    #[must_use]
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Set the growth factor between consecutive sleeps.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// A policy that runs each transaction once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sleep before re-run number `attempt`.
    ///
    /// `attempt` counts re-runs from 1; attempt 0 is the first run and does
    /// not wait. Growth stops as soon as the delay reaches `max_backoff`.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let Some(growth_steps) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };

        let ceiling = self.max_backoff.as_millis() as f64;
        let mut delay = (self.initial_backoff.as_millis() as f64).min(ceiling);
        if self.backoff_multiplier > 1.0 {
            for _ in 0..growth_steps {
                if delay <= 0.0 || delay >= ceiling {
                    break;
                }
                delay = (delay * self.backoff_multiplier).min(ceiling);
            }
        }

        Duration::from_millis(delay as u64)
    }

    /// Whether a transaction that already used `attempt` re-runs may run
    /// again.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Reject policies whose delays would shrink or be undefined.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::interface(
                "backoff_multiplier must be a finite number of at least 1.0",
            ));
        }

        if self.initial_backoff > self.max_backoff {
            return Err(Error::interface(
                "initial_backoff must not exceed max_backoff",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_secs(30));
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::new()
            .max_retries(5)
            .initial_backoff(Duration::from_millis(200))
            .max_backoff(Duration::from_secs(60))
            .backoff_multiplier(3.0);

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(200));
        assert_eq!(policy.max_backoff, Duration::from_secs(60));
        assert!((policy.backoff_multiplier - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_retry_policy_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_retries, 0);
        assert!(!policy.should_retry(0));
    }

    #[test]
    fn test_retry_policy_should_retry() {
        let policy = RetryPolicy::new().max_retries(3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_retry_policy_backoff_calculation() {
        let policy = RetryPolicy::new()
            .initial_backoff(Duration::from_millis(100))
            .backoff_multiplier(2.0)
            .max_backoff(Duration::from_secs(10));

        assert_eq!(policy.backoff_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_policy_backoff_capped() {
        let policy = RetryPolicy::new()
            .initial_backoff(Duration::from_secs(1))
            .backoff_multiplier(10.0)
            .max_backoff(Duration::from_secs(5));

        assert_eq!(policy.backoff_for_attempt(3), Duration::from_secs(5));
        assert_eq!(policy.backoff_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_policy_flat_and_zero_delays() {
        let flat = RetryPolicy::new()
            .initial_backoff(Duration::from_millis(50))
            .backoff_multiplier(1.0);
        assert_eq!(flat.backoff_for_attempt(1), Duration::from_millis(50));
        assert_eq!(flat.backoff_for_attempt(u32::MAX), Duration::from_millis(50));

        let immediate = RetryPolicy::new().initial_backoff(Duration::ZERO);
        assert_eq!(immediate.backoff_for_attempt(u32::MAX), Duration::ZERO);
    }

    #[test]
    fn test_retry_policy_validate() {
        assert!(RetryPolicy::new().backoff_multiplier(0.5).validate().is_err());
        assert!(RetryPolicy::new().backoff_multiplier(f64::NAN).validate().is_err());
        assert!(
            RetryPolicy::new()
                .initial_backoff(Duration::from_secs(60))
                .validate()
                .is_err()
        );
    }
}
