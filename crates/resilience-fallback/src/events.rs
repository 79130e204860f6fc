//! Events emitted by [`crate::FallbackStrategy`].

use resilience_core::events::ResilienceEvent;
use std::time::Instant;

/// An event emitted during a fallback strategy's lifecycle.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// The wrapped call succeeded; no fallback was considered.
    Succeeded {
        operation_key: String,
        timestamp: Instant,
    },
    /// The wrapped call failed but `should_handle` declined to handle it,
    /// so the original failure propagates.
    Declined {
        operation_key: String,
        timestamp: Instant,
    },
    /// The wrapped call failed, `should_handle` accepted it, and the
    /// fallback action was invoked.
    Applied {
        operation_key: String,
        timestamp: Instant,
    },
    /// The fallback action itself failed.
    FallbackFailed {
        operation_key: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FallbackEvent::Succeeded { .. } => "succeeded",
            FallbackEvent::Declined { .. } => "declined",
            FallbackEvent::Applied { .. } => "applied",
            FallbackEvent::FallbackFailed { .. } => "fallback_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FallbackEvent::Succeeded { timestamp, .. }
            | FallbackEvent::Declined { timestamp, .. }
            | FallbackEvent::Applied { timestamp, .. }
            | FallbackEvent::FallbackFailed { timestamp, .. } => *timestamp,
        }
    }

    fn operation_key(&self) -> &str {
        match self {
            FallbackEvent::Succeeded { operation_key, .. }
            | FallbackEvent::Declined { operation_key, .. }
            | FallbackEvent::Applied { operation_key, .. }
            | FallbackEvent::FallbackFailed { operation_key, .. } => operation_key,
        }
    }
}
