//! Events emitted by [`crate::RateLimiterStrategy`].

use resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// An event emitted during a rate limiter's lifecycle.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was granted, possibly after waiting `waited`.
    PermitAcquired {
        operation_key: String,
        timestamp: Instant,
        waited: Duration,
    },
    /// A call was rejected because no permit became available in time.
    PermitRejected {
        operation_key: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "permit_acquired",
            RateLimiterEvent::PermitRejected { .. } => "permit_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. }
            | RateLimiterEvent::PermitRejected { timestamp, .. } => *timestamp,
        }
    }

    fn operation_key(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { operation_key, .. }
            | RateLimiterEvent::PermitRejected { operation_key, .. } => operation_key,
        }
    }
}
