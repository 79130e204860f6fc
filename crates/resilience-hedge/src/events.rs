//! Events emitted by [`crate::HedgeStrategy`].

use resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// An event emitted during a hedged call's lifecycle.
#[derive(Debug, Clone)]
pub enum HedgeEvent {
    /// The primary attempt was dispatched.
    PrimaryStarted {
        operation_key: String,
        timestamp: Instant,
    },
    /// A hedge attempt was dispatched after the primary was still pending.
    HedgeStarted {
        operation_key: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// The primary attempt won the race.
    PrimarySucceeded {
        operation_key: String,
        timestamp: Instant,
        duration: Duration,
        hedges_cancelled: usize,
    },
    /// A hedge attempt won the race; the primary (and any other hedges)
    /// were cancelled.
    HedgeSucceeded {
        operation_key: String,
        timestamp: Instant,
        attempt: usize,
        duration: Duration,
    },
    /// Every dispatched attempt failed.
    AllFailed {
        operation_key: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl ResilienceEvent for HedgeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HedgeEvent::PrimaryStarted { .. } => "primary_started",
            HedgeEvent::HedgeStarted { .. } => "hedge_started",
            HedgeEvent::PrimarySucceeded { .. } => "primary_succeeded",
            HedgeEvent::HedgeSucceeded { .. } => "hedge_succeeded",
            HedgeEvent::AllFailed { .. } => "all_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            HedgeEvent::PrimaryStarted { timestamp, .. }
            | HedgeEvent::HedgeStarted { timestamp, .. }
            | HedgeEvent::PrimarySucceeded { timestamp, .. }
            | HedgeEvent::HedgeSucceeded { timestamp, .. }
            | HedgeEvent::AllFailed { timestamp, .. } => *timestamp,
        }
    }

    fn operation_key(&self) -> &str {
        match self {
            HedgeEvent::PrimaryStarted { operation_key, .. }
            | HedgeEvent::HedgeStarted { operation_key, .. }
            | HedgeEvent::PrimarySucceeded { operation_key, .. }
            | HedgeEvent::HedgeSucceeded { operation_key, .. }
            | HedgeEvent::AllFailed { operation_key, .. } => operation_key,
        }
    }
}
