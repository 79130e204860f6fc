//! Configuration for [`crate::RateLimiterStrategy`].

use crate::events::RateLimiterEvent;
use crate::limiter::WindowType;
use resilience_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Which admission algorithm a rate limiter runs.
pub(crate) enum Algorithm {
    /// Bounds the call *rate* using one of [`WindowType`]'s strategies.
    Window {
        window_type: WindowType,
        limit_for_period: usize,
        refresh_period: Duration,
        timeout_duration: Duration,
    },
    /// Bounds the number of *concurrently in-flight* calls, plus a bounded
    /// FIFO wait queue for callers arriving once all permits are held.
    Concurrency {
        max_concurrent_calls: usize,
        queue_limit: usize,
        max_wait_duration: Option<Duration>,
    },
}

/// Configuration for [`crate::RateLimiterStrategy`].
pub struct RateLimiterConfig {
    pub(crate) name: String,
    pub(crate) algorithm: Algorithm,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
}

/// Builder for [`RateLimiterConfig`].
///
/// Defaults to a fixed window of 50 calls per second with a zero wait
/// timeout (reject immediately once exhausted). Call
/// [`Self::window_type`]/[`Self::limit_for_period`]/[`Self::refresh_period`]
/// to tune a rate limit, or [`Self::max_concurrent_calls`] to switch to
/// concurrency limiting instead.
pub struct RateLimiterConfigBuilder {
    name: String,
    window_type: WindowType,
    limit_for_period: usize,
    refresh_period: Duration,
    timeout_duration: Duration,
    max_concurrent_calls: Option<usize>,
    queue_limit: usize,
    max_wait_duration: Option<Duration>,
    event_listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            window_type: WindowType::Fixed,
            limit_for_period: 50,
            refresh_period: Duration::from_secs(1),
            timeout_duration: Duration::ZERO,
            max_concurrent_calls: None,
            queue_limit: 0,
            max_wait_duration: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name used in events and metrics labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Selects the windowing algorithm. Ignored if
    /// [`Self::max_concurrent_calls`] is also set.
    pub fn window_type(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    /// Sets the number of calls permitted per `refresh_period`.
    pub fn limit_for_period(mut self, limit: usize) -> Self {
        self.limit_for_period = limit;
        self
    }

    /// Sets the period over which `limit_for_period` calls are permitted.
    pub fn refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    /// Sets how long a call may wait for a permit before being rejected.
    /// Defaults to zero (reject immediately).
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Switches this limiter to concurrency limiting: bounds the number of
    /// calls in flight at once rather than the call rate.
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = Some(max);
        self
    }

    /// Sets how many additional callers may wait in FIFO order once all
    /// `max_concurrent_calls` permits are held. Only used in
    /// concurrency-limiting mode. Defaults to 0 (reject synchronously as
    /// soon as every permit is in use, without queuing at all).
    pub fn queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    /// Sets how long a queued call may wait for a concurrency permit before
    /// being rejected. Only used in concurrency-limiting mode. Defaults to
    /// an unbounded wait (a queued caller waits until a permit frees up or
    /// its context is cancelled).
    pub fn max_wait_duration(mut self, duration: Duration) -> Self {
        self.max_wait_duration = Some(duration);
        self
    }

    /// Registers a callback invoked when a permit is granted.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitAcquired { waited, .. } = event {
                f(*waited);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call is rejected.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, RateLimiterEvent::PermitRejected { .. }) {
                f();
            }
        }));
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> RateLimiterConfig {
        let algorithm = match self.max_concurrent_calls {
            Some(max_concurrent_calls) => Algorithm::Concurrency {
                max_concurrent_calls,
                queue_limit: self.queue_limit,
                max_wait_duration: self.max_wait_duration,
            },
            None => Algorithm::Window {
                window_type: self.window_type,
                limit_for_period: self.limit_for_period,
                refresh_period: self.refresh_period,
                timeout_duration: self.timeout_duration,
            },
        };

        RateLimiterConfig {
            name: self.name,
            algorithm,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_window_mode() {
        let config = RateLimiterConfigBuilder::new().build();
        assert!(matches!(config.algorithm, Algorithm::Window { .. }));
    }

    #[test]
    fn setting_max_concurrent_calls_switches_to_concurrency_mode() {
        let config = RateLimiterConfigBuilder::new().max_concurrent_calls(4).build();
        assert!(matches!(config.algorithm, Algorithm::Concurrency { .. }));
    }
}
