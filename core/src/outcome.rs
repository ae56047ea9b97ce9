//! Outcome of a power operation attempt sequence

use crate::classifier::FailureType;
use serde::{Deserialize, Serialize};

/// Result of a power operation, assembled by the orchestrator
///
/// `should_retry` is advisory: the orchestrator computes it from breaker
/// admission, the failure type and the attempt count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerOperationResult {
    pub success: bool,
    pub failure_type: Option<FailureType>,
    pub error_message: String,
    pub attempts: u32,
    pub should_retry: bool,
}

impl PowerOperationResult {
    /// A successful operation after `attempts` tries
    pub fn succeeded(attempts: u32) -> Self {
        Self {
            success: true,
            failure_type: None,
            error_message: String::new(),
            attempts: attempts.max(1),
            should_retry: false,
        }
    }

    /// A failed operation after `attempts` tries
    pub fn failed(
        error_message: impl Into<String>,
        failure_type: FailureType,
        attempts: u32,
        should_retry: bool,
    ) -> Self {
        Self {
            success: false,
            failure_type: Some(failure_type),
            error_message: error_message.into(),
            attempts: attempts.max(1),
            should_retry,
        }
    }
}
