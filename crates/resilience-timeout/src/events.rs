//! Events emitted by [`crate::TimeoutStrategy`].

use resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// An event emitted during a timeout strategy's lifecycle.
#[derive(Debug, Clone)]
pub enum TimeoutEvent {
    /// The wrapped call completed before the deadline.
    Success {
        operation_key: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The wrapped call failed before the deadline; the failure is
    /// unrelated to timing.
    Failed {
        operation_key: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The wrapped call did not complete before `timeout`.
    TimedOut {
        operation_key: String,
        timestamp: Instant,
        timeout: Duration,
    },
}

impl ResilienceEvent for TimeoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeoutEvent::Success { .. } => "success",
            TimeoutEvent::Failed { .. } => "failed",
            TimeoutEvent::TimedOut { .. } => "timed_out",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeoutEvent::Success { timestamp, .. }
            | TimeoutEvent::Failed { timestamp, .. }
            | TimeoutEvent::TimedOut { timestamp, .. } => *timestamp,
        }
    }

    fn operation_key(&self) -> &str {
        match self {
            TimeoutEvent::Success { operation_key, .. }
            | TimeoutEvent::Failed { operation_key, .. }
            | TimeoutEvent::TimedOut { operation_key, .. } => operation_key,
        }
    }
}
