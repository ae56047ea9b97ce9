//! Per-node circuit breaker for power operations
//!
//! One [`CircuitBreaker`] tracks every node it has seen failing. Each node
//! carries a consecutive failure count and the time of its last failure;
//! the logical state is derived from those counters on demand:
//!
//! - `Closed`: no failures recorded
//! - `HalfOpen`: failures recorded, still under the threshold
//! - `Open`: threshold reached, operations are blocked until the recovery
//!   timeout elapses
//!
//! Entries live in a sharded [`DashMap`], so updates to one node are atomic
//! while unrelated nodes never contend on a single lock.

use crate::{
    callbacks::{Callbacks, NodeEvent},
    classifier::FailureType,
    clock::{Clock, MonotonicClock},
    errors::ConfigError,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Failures required to block a node
    pub failure_threshold: usize,

    /// Seconds after the last failure before a blocked node is reconsidered
    pub recovery_timeout_secs: f64,

    /// Jitter factor for recovery_timeout (0.0 = exact, 1.0 = full jitter)
    /// Uses chrono-machines formula: timeout * (1 - jitter + rand * jitter).
    /// Sampled once each time a node trips and kept until it recovers.
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_secs: 300.0,
            jitter_factor: 0.0,
        }
    }
}

impl Config {
    /// Check the configuration invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if !self.recovery_timeout_secs.is_finite() || self.recovery_timeout_secs < 0.0 {
            return Err(ConfigError::InvalidRecoveryTimeout(
                self.recovery_timeout_secs,
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidJitterFactor(self.jitter_factor));
        }
        Ok(())
    }
}

/// Logical breaker state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// No obstruction
    Closed,
    /// Failures recorded but under the threshold
    HalfOpen,
    /// Operations are blocked
    Open,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::HalfOpen => "HalfOpen",
            CircuitState::Open => "Open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored counters for one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRecord {
    pub failure_count: usize,
    /// Clock reading of the most recent failure
    pub last_failure_time: f64,
    /// Recovery timeout in force for this node, jitter included
    pub recovery_timeout_secs: f64,
}

/// State change produced by an operation, fired after the entry is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    None,
    HalfOpen,
    Open,
    Close,
}

/// Circuit breaker keyed by node id
pub struct CircuitBreaker {
    config: Config,
    clock: Arc<dyn Clock>,
    nodes: DashMap<String, NodeRecord>,
    callbacks: Callbacks,
}

impl CircuitBreaker {
    /// Create a breaker on the monotonic system clock (use builder() for more options)
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Create a breaker reading time from `clock`
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(config, clock, Callbacks::new())
    }

    /// Validate `config` and create a breaker on the system clock
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub(crate) fn with_parts(config: Config, clock: Arc<dyn Clock>, callbacks: Callbacks) -> Self {
        Self {
            config,
            clock,
            nodes: DashMap::new(),
            callbacks,
        }
    }

    /// Create a new breaker builder
    pub fn builder() -> crate::builder::BreakerBuilder {
        crate::builder::BreakerBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Record a failed power operation against `node_id`
    ///
    /// Configuration failures set the count straight to the threshold,
    /// tripping the breaker at once. Anything else adds one. Either way the
    /// last failure time is refreshed, so an open node stays open.
    pub fn record_failure(&self, node_id: &str, failure_type: FailureType) {
        let now = self.clock.monotonic_time();
        let threshold = self.config.failure_threshold;

        let (failure_count, transition) = {
            let mut record = self
                .nodes
                .entry(node_id.to_owned())
                .or_insert(NodeRecord {
                    failure_count: 0,
                    last_failure_time: now,
                    recovery_timeout_secs: self.config.recovery_timeout_secs,
                });

            let before = record.failure_count;
            record.failure_count = if failure_type == FailureType::Configuration {
                threshold
            } else {
                before.saturating_add(1)
            };
            record.last_failure_time = now;
            let after = record.failure_count;

            let transition = if before < threshold && after >= threshold {
                Transition::Open
            } else if before == 0 && after > 0 {
                Transition::HalfOpen
            } else {
                Transition::None
            };
            if transition == Transition::Open {
                record.recovery_timeout_secs = self.sample_recovery_timeout();
            }
            (after, transition)
        };

        debug!(node_id, failure_count, %failure_type, "power failure recorded");
        if transition == Transition::Open {
            warn!(
                node_id,
                failure_count,
                %failure_type,
                "circuit opened, blocking power operations for node"
            );
        }
        self.fire(
            transition,
            NodeEvent {
                node_id,
                failure_count,
                failure_type: Some(failure_type),
            },
        );
    }

    /// Record a successful power operation, forgetting all failure history
    ///
    /// A node already re-admitted by its recovery timeout has nothing left to
    /// clear, so only its entry is dropped and no close is reported.
    pub fn record_success(&self, node_id: &str) {
        let Some((_, record)) = self.nodes.remove(node_id) else {
            return;
        };

        if record.failure_count == 0 {
            debug!(node_id, "recovered node confirmed by successful power operation");
            return;
        }

        info!(
            node_id,
            previous_failures = record.failure_count,
            "circuit closed after successful power operation"
        );
        self.fire(
            Transition::Close,
            NodeEvent {
                node_id,
                failure_count: record.failure_count,
                failure_type: None,
            },
        );
    }

    /// Check whether an operation against `node_id` may proceed
    ///
    /// This is a check-with-possible-reset: when the node is blocked but the
    /// recovery timeout has elapsed since its last failure, the count is
    /// reset to 0 and the node is admitted again. This is the only way an
    /// open node recovers without a success. Use
    /// [`peek_state`](Self::peek_state) for a read that never mutates.
    pub fn should_allow(&self, node_id: &str) -> bool {
        let (allowed, _) = self.admit(node_id);
        allowed
    }

    /// Current state of `node_id`, applying recovery like [`should_allow`](Self::should_allow)
    ///
    /// Any failure count between 1 and threshold - 1 reports `HalfOpen`,
    /// including the very first failure.
    pub fn state(&self, node_id: &str) -> CircuitState {
        let (allowed, failure_count) = self.admit(node_id);
        if !allowed {
            CircuitState::Open
        } else if failure_count > 0 {
            CircuitState::HalfOpen
        } else {
            CircuitState::Closed
        }
    }

    /// State `node_id` would report from [`state`](Self::state), without resetting anything
    ///
    /// Uses the same per-node recovery timeout as `state`, jitter included.
    pub fn peek_state(&self, node_id: &str) -> CircuitState {
        let Some(record) = self.snapshot(node_id) else {
            return CircuitState::Closed;
        };

        if record.failure_count == 0 {
            CircuitState::Closed
        } else if record.failure_count < self.config.failure_threshold {
            CircuitState::HalfOpen
        } else if self.clock.monotonic_time() - record.last_failure_time
            > record.recovery_timeout_secs
        {
            CircuitState::Closed
        } else {
            CircuitState::Open
        }
    }

    /// Consecutive failures for `node_id`, 0 if untracked
    pub fn failure_count(&self, node_id: &str) -> usize {
        self.nodes
            .get(node_id)
            .map(|r| r.failure_count)
            .unwrap_or(0)
    }

    /// Copy of the stored counters for `node_id`
    pub fn snapshot(&self, node_id: &str) -> Option<NodeRecord> {
        self.nodes.get(node_id).map(|r| *r)
    }

    /// Clock reading of the last failure for `node_id`
    pub fn last_failure_time(&self, node_id: &str) -> Option<f64> {
        self.nodes.get(node_id).map(|r| r.last_failure_time)
    }

    /// Forget `node_id` entirely
    pub fn reset(&self, node_id: &str) {
        if self.nodes.remove(node_id).is_some() {
            debug!(node_id, "circuit reset for node");
        }
    }

    /// Forget every tracked node
    pub fn reset_all(&self) {
        let tracked = self.nodes.len();
        self.nodes.clear();
        debug!(tracked, "circuit reset for all nodes");
    }

    /// Ids of nodes with an entry (at least one failure since the last success or reset)
    pub fn tracked_nodes(&self) -> Vec<String> {
        self.nodes.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of tracked nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Admission check under the node's lock; returns (allowed, failure_count)
    fn admit(&self, node_id: &str) -> (bool, usize) {
        let (allowed, failure_count, cleared) = {
            let Some(mut record) = self.nodes.get_mut(node_id) else {
                return (true, 0);
            };

            if record.failure_count < self.config.failure_threshold {
                (true, record.failure_count, None)
            } else {
                let elapsed = self.clock.monotonic_time() - record.last_failure_time;
                if elapsed > record.recovery_timeout_secs {
                    let cleared = record.failure_count;
                    record.failure_count = 0;
                    info!(
                        node_id,
                        elapsed_secs = elapsed,
                        "recovery timeout elapsed, re-admitting node"
                    );
                    (true, 0, Some(cleared))
                } else {
                    (false, record.failure_count, None)
                }
            }
        };

        if let Some(cleared) = cleared {
            self.fire(
                Transition::Close,
                NodeEvent {
                    node_id,
                    failure_count: cleared,
                    failure_type: None,
                },
            );
        }
        (allowed, failure_count)
    }

    /// Recovery timeout in seconds with jitter applied if configured
    fn sample_recovery_timeout(&self) -> f64 {
        if self.config.jitter_factor > 0.0 {
            let timeout_ms = (self.config.recovery_timeout_secs * 1000.0) as u64;
            let policy = chrono_machines::Policy {
                max_attempts: 1,
                base_delay_ms: timeout_ms,
                multiplier: 1.0,
                max_delay_ms: timeout_ms,
            };
            let jittered_ms = policy.calculate_delay(1, self.config.jitter_factor);
            (jittered_ms as f64) / 1000.0
        } else {
            self.config.recovery_timeout_secs
        }
    }

    fn fire(&self, transition: Transition, event: NodeEvent<'_>) {
        let hook = match transition {
            Transition::None => return,
            Transition::HalfOpen => &self.callbacks.on_half_open,
            Transition::Open => &self.callbacks.on_open,
            Transition::Close => &self.callbacks.on_close,
        };
        Callbacks::emit(hook, &event);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("tracked_nodes", &self.nodes.len())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
