//! Retry policy with capped exponential backoff
//!
//! A [`RetryPolicy`] only bounds how long to wait before the next attempt.
//! Whether to retry at all is the orchestrator's call; it combines the
//! attempt count, the [`FailureType`] and breaker admission.
//! [`RetryPolicy::permits_retry`] bundles the first two for convenience.

use crate::classifier::FailureType;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How callers want `Unknown` failures treated when deciding on a retry
///
/// Has no default; every orchestrator picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFailures {
    /// Retry unknown failures like transient ones
    Retry,
    /// Give up on unknown failures like configuration ones
    Abandon,
}

/// Retry behaviour for power operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    /// 3 attempts, 10s initial delay, 2 minute ceiling, doubling
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(120),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a validated policy
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
    ) -> Result<Self, ConfigError> {
        let policy = Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_factor,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the policy invariants
    ///
    /// Policies built with struct literals or deserialized from settings
    /// should be validated before use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(self.backoff_factor));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::DelayCeilingTooLow {
                initial_delay_secs: self.initial_delay.as_secs_f64(),
                max_delay_secs: self.max_delay.as_secs_f64(),
            });
        }
        Ok(())
    }

    /// Delay to wait after attempt `attempt` (1-based) has failed
    ///
    /// `min(initial_delay * backoff_factor^(attempt - 1), max_delay)`.
    /// Attempt 0 is treated as attempt 1. Unvalidated policies never panic:
    /// a product that is NaN or not positive yields a zero delay.
    ///
    /// ```rust
    /// use power_breaker::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay(1), Duration::from_secs(10));
    /// assert_eq!(policy.delay(3), Duration::from_secs(40));
    /// assert_eq!(policy.delay(5), Duration::from_secs(120));
    /// ```
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// [`delay`](Self::delay) with random jitter applied
    ///
    /// Uses the chrono-machines formula `delay * (1 - jitter + rand * jitter)`,
    /// so the result never exceeds the un-jittered delay. A factor of 0.0
    /// returns the exact delay.
    pub fn jittered_delay(&self, attempt: u32, jitter_factor: f64) -> Duration {
        let base = self.delay(attempt);
        if base.is_zero() || jitter_factor <= 0.0 {
            return base;
        }

        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let policy = chrono_machines::Policy {
            max_attempts: 1,
            base_delay_ms: base_ms,
            multiplier: 1.0,
            max_delay_ms: base_ms,
        };
        let delay_ms = policy.calculate_delay(1, jitter_factor.min(1.0));
        Duration::from_millis(delay_ms as u64)
    }

    /// Whether another attempt fits in the budget after `attempts` tries
    pub fn has_attempts_remaining(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Attempt budget and failure type check for a retry
    ///
    /// Returns false for configuration failures and once the budget is
    /// spent. Breaker admission is not consulted here; pair this with
    /// [`CircuitBreaker::should_allow`](crate::CircuitBreaker::should_allow).
    pub fn permits_retry(
        &self,
        attempts: u32,
        failure_type: FailureType,
        unknown: UnknownFailures,
    ) -> bool {
        if !self.has_attempts_remaining(attempts) {
            return false;
        }
        match failure_type {
            FailureType::Configuration => false,
            FailureType::Transient => true,
            FailureType::Unknown => unknown == UnknownFailures::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial: u64, max: u64, factor: f64) -> RetryPolicy {
        RetryPolicy::new(
            3,
            Duration::from_secs(initial),
            Duration::from_secs(max),
            factor,
        )
        .unwrap()
    }

    #[test]
    fn test_exponential_backoff_with_cap() {
        let policy = policy(10, 120, 2.0);

        assert_eq!(policy.delay(1), Duration::from_secs(10));
        assert_eq!(policy.delay(2), Duration::from_secs(20));
        assert_eq!(policy.delay(3), Duration::from_secs(40));
        assert_eq!(policy.delay(4), Duration::from_secs(80));
        // 160s uncapped
        assert_eq!(policy.delay(5), Duration::from_secs(120));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(120));
    }

    #[test]
    fn test_attempt_zero_behaves_like_first() {
        let policy = policy(10, 120, 2.0);
        assert_eq!(policy.delay(0), policy.delay(1));
    }

    #[test]
    fn test_factor_one_is_constant() {
        let policy = policy(15, 60, 1.0);
        for attempt in 1..10 {
            assert_eq!(policy.delay(attempt), Duration::from_secs(15));
        }
    }

    #[test]
    fn test_zero_initial_delay() {
        let policy = policy(0, 60, 3.0);
        assert_eq!(policy.delay(1), Duration::ZERO);
        assert_eq!(policy.delay(200), Duration::ZERO);
    }

    #[test]
    fn test_unvalidated_factor_does_not_panic() {
        let negative = RetryPolicy {
            backoff_factor: -2.0,
            ..RetryPolicy::default()
        };
        assert!(negative.validate().is_err());
        assert_eq!(negative.delay(1), Duration::from_secs(10));
        assert_eq!(negative.delay(2), Duration::ZERO);
        assert_eq!(negative.delay(3), Duration::from_secs(40));
        assert_eq!(negative.jittered_delay(2, 0.5), Duration::ZERO);

        let nan = RetryPolicy {
            backoff_factor: f64::NAN,
            ..RetryPolicy::default()
        };
        assert_eq!(nan.delay(2), Duration::ZERO);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(10));
        assert_eq!(policy.max_delay, Duration::from_secs(120));
        assert_eq!(policy.backoff_factor, 2.0);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(2), 2.0),
            Err(ConfigError::ZeroAttempts)
        );
        assert_eq!(
            RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(2), 0.5),
            Err(ConfigError::InvalidBackoffFactor(0.5))
        );
        assert!(matches!(
            RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(2), f64::NAN),
            Err(ConfigError::InvalidBackoffFactor(_))
        ));
        assert!(matches!(
            RetryPolicy::new(3, Duration::from_secs(30), Duration::from_secs(10), 2.0),
            Err(ConfigError::DelayCeilingTooLow { .. })
        ));
    }

    #[test]
    fn test_jitter_disabled_is_exact() {
        let policy = policy(10, 120, 2.0);
        assert_eq!(policy.jittered_delay(2, 0.0), Duration::from_secs(20));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = policy(10, 120, 2.0);
        for _ in 0..50 {
            let delay = policy.jittered_delay(2, 0.5);
            assert!(delay <= Duration::from_secs(20), "{delay:?} above base");
            assert!(delay >= Duration::from_secs(10), "{delay:?} below half");
        }
    }

    #[test]
    fn test_permits_retry() {
        let policy = RetryPolicy::default();

        assert!(policy.permits_retry(1, FailureType::Transient, UnknownFailures::Abandon));
        assert!(policy.permits_retry(2, FailureType::Transient, UnknownFailures::Abandon));
        assert!(!policy.permits_retry(3, FailureType::Transient, UnknownFailures::Retry));

        assert!(!policy.permits_retry(1, FailureType::Configuration, UnknownFailures::Retry));

        assert!(policy.permits_retry(1, FailureType::Unknown, UnknownFailures::Retry));
        assert!(!policy.permits_retry(1, FailureType::Unknown, UnknownFailures::Abandon));
    }

    #[test]
    fn test_policy_from_settings() {
        let json = r#"{
            "max_attempts": 5,
            "initial_delay": { "secs": 2, "nanos": 0 },
            "max_delay": { "secs": 30, "nanos": 0 },
            "backoff_factor": 3.0
        }"#;
        let policy: RetryPolicy = serde_json::from_str(json).unwrap();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.delay(3), Duration::from_secs(18));
        assert_eq!(policy.delay(4), Duration::from_secs(30));
    }
}
