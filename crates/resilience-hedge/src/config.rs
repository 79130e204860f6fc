//! Configuration for [`crate::HedgeStrategy`].

use crate::events::HedgeEvent;
use resilience_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Delay strategy controlling when each hedge attempt fires.
#[derive(Clone)]
pub enum HedgeDelay {
    /// Waits the same duration before every hedge attempt (latency mode).
    Fixed(Duration),
    /// Fires every attempt immediately (parallel mode).
    Immediate,
    /// Computes the delay from the 1-indexed hedge attempt number.
    Dynamic(Arc<dyn Fn(usize) -> Duration + Send + Sync>),
}

impl HedgeDelay {
    /// The delay before dispatching hedge attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        match self {
            HedgeDelay::Fixed(d) => *d,
            HedgeDelay::Immediate => Duration::ZERO,
            HedgeDelay::Dynamic(f) => f(attempt),
        }
    }
}

impl Default for HedgeDelay {
    fn default() -> Self {
        HedgeDelay::Fixed(Duration::from_millis(100))
    }
}

/// Configuration for [`crate::HedgeStrategy`].
pub struct HedgeConfig<E> {
    pub(crate) name: String,
    pub(crate) max_attempts: usize,
    pub(crate) delay: HedgeDelay,
    pub(crate) event_listeners: EventListeners<HedgeEvent>,
    pub(crate) _marker: std::marker::PhantomData<fn() -> E>,
}

/// Builder for [`HedgeConfig`].
pub struct HedgeConfigBuilder<E> {
    name: String,
    max_attempts: usize,
    delay: HedgeDelay,
    event_listeners: EventListeners<HedgeEvent>,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E> HedgeConfigBuilder<E>
where
    E: Send + Sync + 'static,
{
    /// Creates a new builder with defaults: 2 total attempts, a 100ms fixed
    /// delay before the hedge fires.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            max_attempts: 2,
            delay: HedgeDelay::default(),
            event_listeners: EventListeners::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Sets the name used in events and metrics labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the maximum number of attempts dispatched in total, including
    /// the primary. Must be at least 1; a value of 1 disables hedging.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Waits a fixed duration before firing each hedge attempt (the
    /// default "latency mode": hedges only fire if the primary is slow).
    pub fn delay(mut self, duration: Duration) -> Self {
        self.delay = HedgeDelay::Fixed(duration);
        self
    }

    /// Fires every attempt immediately ("parallel mode": trades resource
    /// usage for the lowest possible latency).
    pub fn no_delay(mut self) -> Self {
        self.delay = HedgeDelay::Immediate;
        self
    }

    /// Computes each hedge attempt's delay dynamically from its 1-indexed
    /// attempt number.
    pub fn delay_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        self.delay = HedgeDelay::Dynamic(Arc::new(f));
        self
    }

    /// Registers a callback invoked when a hedge attempt is dispatched.
    pub fn on_hedge_started<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HedgeEvent::HedgeStarted { attempt, .. } = event {
                f(*attempt);
            }
        }));
        self
    }

    /// Registers a callback invoked when every dispatched attempt failed.
    pub fn on_all_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HedgeEvent::AllFailed { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> HedgeConfig<E> {
        HedgeConfig {
            name: self.name,
            max_attempts: self.max_attempts,
            delay: self.delay,
            event_listeners: self.event_listeners,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E> Default for HedgeConfigBuilder<E>
where
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
