//! Error types for policy and breaker configuration

use thiserror::Error;

/// Errors raised when a retry policy or breaker configuration is invalid
///
/// Breaker operations and classification never fail; only constructing or
/// validating configuration values can.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A retry policy must allow at least one attempt
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// Backoff factor below 1.0 or not a finite number
    #[error("backoff_factor must be a finite number >= 1.0 (got {0})")]
    InvalidBackoffFactor(f64),

    /// The delay ceiling is lower than the first delay
    #[error("max_delay ({max_delay_secs}s) must not be less than initial_delay ({initial_delay_secs}s)")]
    DelayCeilingTooLow {
        initial_delay_secs: f64,
        max_delay_secs: f64,
    },

    /// A breaker with threshold 0 would block every node forever
    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    /// Recovery timeout negative or not finite
    #[error("recovery_timeout_secs must be a finite number >= 0 (got {0})")]
    InvalidRecoveryTimeout(f64),

    /// Jitter factor outside `0.0..=1.0`
    #[error("jitter_factor must be within 0.0..=1.0 (got {0})")]
    InvalidJitterFactor(f64),
}
