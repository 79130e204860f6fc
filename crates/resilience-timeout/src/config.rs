//! Configuration for [`crate::TimeoutStrategy`].

use crate::events::TimeoutEvent;
use resilience_core::context::ResilienceContext;
use resilience_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Source for determining the timeout duration of a call.
#[derive(Clone)]
pub enum TimeoutSource {
    /// The same duration applies to every call.
    Fixed(Duration),
    /// The duration is computed per call from the [`ResilienceContext`],
    /// e.g. reading a deadline stashed in its property bag.
    Dynamic(Arc<dyn Fn(&ResilienceContext) -> Duration + Send + Sync>),
}

impl TimeoutSource {
    /// Resolves the timeout duration to apply for `ctx`.
    pub fn duration_for(&self, ctx: &ResilienceContext) -> Duration {
        match self {
            TimeoutSource::Fixed(duration) => *duration,
            TimeoutSource::Dynamic(f) => f(ctx),
        }
    }
}

impl Default for TimeoutSource {
    fn default() -> Self {
        TimeoutSource::Fixed(Duration::from_secs(5))
    }
}

/// Configuration for [`crate::TimeoutStrategy`].
pub struct TimeoutConfig {
    pub(crate) timeout_source: TimeoutSource,
    pub(crate) cancel_on_timeout: bool,
    pub(crate) event_listeners: EventListeners<TimeoutEvent>,
    pub(crate) name: String,
}

/// Builder for [`TimeoutConfig`].
pub struct TimeoutConfigBuilder {
    timeout_source: TimeoutSource,
    cancel_on_timeout: bool,
    event_listeners: EventListeners<TimeoutEvent>,
    name: String,
}

impl TimeoutConfigBuilder {
    /// Creates a new builder with defaults: a fixed 5 second timeout, and
    /// cooperative cancellation of the losing branch enabled.
    pub fn new() -> Self {
        Self {
            timeout_source: TimeoutSource::default(),
            cancel_on_timeout: true,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets a fixed timeout duration for every call.
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_source = TimeoutSource::Fixed(duration);
        self
    }

    /// Sets a per-call timeout function, evaluated against the
    /// [`ResilienceContext`] before each call.
    pub fn timeout_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResilienceContext) -> Duration + Send + Sync + 'static,
    {
        self.timeout_source = TimeoutSource::Dynamic(Arc::new(f));
        self
    }

    /// Sets whether the wrapped operation's [`ResilienceContext`] is
    /// signalled to cancel once the deadline passes. The call's future
    /// keeps running to completion either way -- this only lets
    /// cooperative code downstream (and the rest of the pipeline) observe
    /// that the caller has given up.
    ///
    /// Default: `true`.
    pub fn cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }

    /// Sets the name used in events and metrics labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a call completes before the
    /// deadline, successfully or not, with the elapsed duration.
    pub fn on_settled<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            match event {
                TimeoutEvent::Success { duration, .. } | TimeoutEvent::Failed { duration, .. } => {
                    f(*duration)
                }
                TimeoutEvent::TimedOut { .. } => {}
            }
        }));
        self
    }

    /// Registers a callback invoked when a call exceeds its deadline.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeoutEvent::TimedOut { timeout, .. } = event {
                f(*timeout);
            }
        }));
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> TimeoutConfig {
        TimeoutConfig {
            timeout_source: self.timeout_source,
            cancel_on_timeout: self.cancel_on_timeout,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl Default for TimeoutConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_returns_the_same_duration_for_any_context() {
        let source = TimeoutSource::Fixed(Duration::from_secs(2));
        let ctx = ResilienceContext::new("op");
        assert_eq!(source.duration_for(&ctx), Duration::from_secs(2));
    }

    #[test]
    fn defaults_enable_cancellation() {
        let config = TimeoutConfigBuilder::new().build();
        assert!(config.cancel_on_timeout);
    }
}
