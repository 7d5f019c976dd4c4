use std::time::{Duration, Instant};

use crate::operation::OperationSpec;

/// Per-invocation state carried from the start callback to the completion
/// callback. Each invocation owns its own timer.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub spec: OperationSpec,
    started_at: Option<Instant>,
}

impl InvocationContext {
    /// A context that has not been started yet.
    pub fn new(spec: OperationSpec) -> Self {
        Self {
            spec,
            started_at: None,
        }
    }

    /// Record the start time. Calling this again restarts the timer.
    pub fn mark_started(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time since start, if started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }
}
