//! Builder API for ergonomic circuit breaker configuration

use crate::{
    callbacks::{Callbacks, NodeEvent},
    circuit::{CircuitBreaker, Config},
    clock::{Clock, MonotonicClock},
    errors::ConfigError,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with fluent API
///
/// Setters store values as given. [`build`](Self::build) trusts them like
/// [`CircuitBreaker::new`]; [`try_build`](Self::try_build) validates first.
pub struct BreakerBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    callbacks: Callbacks,
}

impl BreakerBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            clock: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the number of failures that blocks a node
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set the recovery timeout in seconds
    pub fn recovery_timeout_secs(mut self, seconds: f64) -> Self {
        self.config.recovery_timeout_secs = seconds;
        self
    }

    /// Set the recovery timeout
    pub fn recovery_timeout(self, timeout: Duration) -> Self {
        self.recovery_timeout_secs(timeout.as_secs_f64())
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Set the time source (defaults to [`MonotonicClock`])
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set callback for when a node's circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&NodeEvent<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for the first failure on a closed node
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&NodeEvent<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when a node's circuit closes again
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&NodeEvent<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Validate the configuration and build the breaker
    pub fn try_build(self) -> Result<CircuitBreaker, ConfigError> {
        self.config.validate()?;
        Ok(self.build())
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        CircuitBreaker::with_parts(self.config, clock, self.callbacks)
    }
}

impl Default for BreakerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
