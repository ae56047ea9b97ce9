//! Hooks for per-node breaker transitions
//!
//! A hook receives a [`NodeEvent`] describing the node and its failure
//! count at the moment of the transition. Hooks run on the calling thread
//! after the node's entry has been released, so they may query the breaker.

use crate::classifier::FailureType;
use std::sync::Arc;

/// What a transition hook gets to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvent<'a> {
    pub node_id: &'a str,
    /// Count after a failure, or the count being cleared on close
    pub failure_count: usize,
    /// Failure that caused the transition; `None` when closing
    pub failure_type: Option<FailureType>,
}

pub type NodeHook = Arc<dyn Fn(&NodeEvent<'_>) + Send + Sync>;

/// Transition hooks, each optional
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Node became blocked: threshold reached or configuration failure
    pub on_open: Option<NodeHook>,
    /// First failure recorded against a closed node, still under threshold
    pub on_half_open: Option<NodeHook>,
    /// Failure history cleared, by success or by recovery timeout
    pub on_close: Option<NodeHook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn emit(hook: &Option<NodeHook>, event: &NodeEvent<'_>) {
        if let Some(hook) = hook {
            hook(event);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}
