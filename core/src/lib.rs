//! power-breaker - Reliability core for BMC power operations
//!
//! This crate decides, per target node, whether a failed power operation is
//! worth retrying, how long to wait before the next attempt, and when to stop
//! hammering a node that keeps failing:
//! - Deterministic classification of driver error text into a small taxonomy
//! - Capped exponential backoff policy
//! - Per-node circuit breaker (Closed → HalfOpen → Open) with recovery timeout
//! - Injectable monotonic clock for deterministic tests
//!
//! The crate never sleeps, schedules or performs I/O. Waiting between
//! attempts and running the actual power drivers belong to the caller.
//!
//! # Example
//!
//! ```rust
//! use power_breaker::{
//!     classify, CircuitBreaker, CircuitState, FailureType, PowerOperationResult, RetryPolicy,
//!     UnknownFailures,
//! };
//!
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(3)
//!     .recovery_timeout_secs(300.0)
//!     .on_open(|event| println!("power operations on {} suspended", event.node_id))
//!     .build();
//! let policy = RetryPolicy::default();
//!
//! let node = "node-17";
//! let mut attempts = 0;
//! let result = loop {
//!     if !breaker.should_allow(node) {
//!         break PowerOperationResult::failed("circuit open", FailureType::Unknown, attempts, false);
//!     }
//!     attempts += 1;
//!
//!     // Driver call goes here
//!     let outcome: Result<(), &str> = Err("IPMI session timeout");
//!
//!     match outcome {
//!         Ok(()) => {
//!             breaker.record_success(node);
//!             break PowerOperationResult::succeeded(attempts);
//!         }
//!         Err(message) => {
//!             let failure_type = classify(message);
//!             breaker.record_failure(node, failure_type);
//!             let retry = policy.permits_retry(attempts, failure_type, UnknownFailures::Abandon)
//!                 && breaker.should_allow(node);
//!             if !retry {
//!                 break PowerOperationResult::failed(message, failure_type, attempts, false);
//!             }
//!             let _wait = policy.delay(attempts);
//!         }
//!     }
//! };
//!
//! assert!(!result.success);
//! assert_eq!(result.attempts, 3);
//! assert_eq!(breaker.state(node), CircuitState::Open);
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod classifier;
pub mod clock;
pub mod errors;
pub mod outcome;
pub mod retry;

pub use builder::BreakerBuilder;
pub use callbacks::NodeEvent;
pub use circuit::{CircuitBreaker, CircuitState, Config, NodeRecord};
pub use classifier::{
    DEFAULT_PATTERNS, DefaultClassifier, FailureClassifier, FailureType, PatternClassifier,
    PredicateClassifier, classify, classify_error,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::ConfigError;
pub use outcome::PowerOperationResult;
pub use retry::{RetryPolicy, UnknownFailures};
