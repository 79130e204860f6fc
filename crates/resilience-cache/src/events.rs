//! Events emitted by [`crate::CacheStrategy`].

use resilience_core::events::ResilienceEvent;
use std::time::Instant;

/// An event emitted during a cache strategy's lifecycle.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// The key resolved to a live entry; the wrapped call was bypassed.
    Hit {
        operation_key: String,
        timestamp: Instant,
        key: String,
    },
    /// No live entry was found (or the key generator returned an empty
    /// key); the wrapped call ran.
    Miss {
        operation_key: String,
        timestamp: Instant,
        key: String,
    },
    /// A successful outcome was written back to the provider.
    Set {
        operation_key: String,
        timestamp: Instant,
        key: String,
    },
    /// A provider operation (`get` or `set`) faulted and was swallowed;
    /// the strategy fell back to treating it as a miss / skipped write.
    ProviderError {
        operation_key: String,
        timestamp: Instant,
        key: String,
        during: &'static str,
    },
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Set { .. } => "set",
            CacheEvent::ProviderError { .. } => "provider_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Set { timestamp, .. }
            | CacheEvent::ProviderError { timestamp, .. } => *timestamp,
        }
    }

    fn operation_key(&self) -> &str {
        match self {
            CacheEvent::Hit { operation_key, .. }
            | CacheEvent::Miss { operation_key, .. }
            | CacheEvent::Set { operation_key, .. }
            | CacheEvent::ProviderError { operation_key, .. } => operation_key,
        }
    }
}
