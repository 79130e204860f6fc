//! Events emitted by [`crate::CircuitBreakerStrategy`].

use resilience_core::error::CircuitState;
use resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// An event emitted during a circuit breaker's lifecycle.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A state transition occurred.
    StateTransition {
        operation_key: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was permitted to reach the wrapped operation.
    CallPermitted {
        operation_key: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected without reaching the wrapped operation.
    CallRejected {
        operation_key: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call succeeded and was recorded against the sliding window.
    SuccessRecorded {
        operation_key: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call failed and was recorded against the sliding window.
    FailureRecorded {
        operation_key: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call exceeded `slow_call_duration_threshold`.
    SlowCallDetected {
        operation_key: String,
        timestamp: Instant,
        duration: Duration,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::SlowCallDetected { .. } => "slow_call_detected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::SlowCallDetected { timestamp, .. } => *timestamp,
        }
    }

    fn operation_key(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { operation_key, .. }
            | CircuitBreakerEvent::CallPermitted { operation_key, .. }
            | CircuitBreakerEvent::CallRejected { operation_key, .. }
            | CircuitBreakerEvent::SuccessRecorded { operation_key, .. }
            | CircuitBreakerEvent::FailureRecorded { operation_key, .. }
            | CircuitBreakerEvent::SlowCallDetected { operation_key, .. } => operation_key,
        }
    }
}
