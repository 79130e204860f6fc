//! Events emitted by [`crate::RetryStrategy`].

use resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// An event emitted during a retry strategy's execution.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to be attempted after a failed call.
    Retrying {
        operation_key: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// The operation succeeded, possibly after one or more retries.
    Succeeded {
        operation_key: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// All attempts were exhausted without success.
    Exhausted {
        operation_key: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// An error occurred but `should_handle` returned false, so it was not
    /// retried and instead propagated immediately.
    Ignored {
        operation_key: String,
        timestamp: Instant,
        attempt: usize,
    },
    /// A retry was otherwise eligible but the configured [`crate::RetryBudget`]
    /// had no tokens left, so the failure propagated instead of retrying.
    BudgetExhausted {
        operation_key: String,
        timestamp: Instant,
        attempt: usize,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retrying { .. } => "retrying",
            RetryEvent::Succeeded { .. } => "succeeded",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::Ignored { .. } => "ignored",
            RetryEvent::BudgetExhausted { .. } => "budget_exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retrying { timestamp, .. }
            | RetryEvent::Succeeded { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::Ignored { timestamp, .. }
            | RetryEvent::BudgetExhausted { timestamp, .. } => *timestamp,
        }
    }

    fn operation_key(&self) -> &str {
        match self {
            RetryEvent::Retrying { operation_key, .. }
            | RetryEvent::Succeeded { operation_key, .. }
            | RetryEvent::Exhausted { operation_key, .. }
            | RetryEvent::Ignored { operation_key, .. }
            | RetryEvent::BudgetExhausted { operation_key, .. } => operation_key,
        }
    }
}
