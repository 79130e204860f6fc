//! Configuration for [`crate::CircuitBreakerStrategy`].

use crate::events::CircuitBreakerEvent;
use resilience_core::error::CircuitState;
use resilience_core::events::{EventListeners, FnListener};
use resilience_core::outcome::Outcome;
use std::sync::Arc;
use std::time::Duration;

/// Which kind of sliding window the breaker evaluates the failure (and slow
/// call) rate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidingWindowType {
    /// Tracks the last `sliding_window_size` calls regardless of age.
    CountBased,
    /// Tracks calls within the last `sliding_window_duration`.
    TimeBased,
}

/// Classifies an [`Outcome`] as a failure for the purposes of the sliding
/// window. Defaults to treating any [`Outcome::Failure`] as a failure; a
/// custom classifier can also treat certain successes as failures (e.g. a
/// degraded-but-`Ok` response).
pub type FailureClassifierFn<T, E> = Arc<dyn Fn(&Outcome<T, E>) -> bool + Send + Sync>;

/// Configuration for [`crate::CircuitBreakerStrategy`].
pub struct CircuitBreakerConfig<T, E> {
    pub(crate) name: String,
    pub(crate) failure_rate_threshold: f64,
    pub(crate) sliding_window_type: SlidingWindowType,
    pub(crate) sliding_window_size: usize,
    pub(crate) sliding_window_duration: Option<Duration>,
    pub(crate) minimum_number_of_calls: usize,
    pub(crate) wait_duration_in_open: Duration,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) slow_call_duration_threshold: Option<Duration>,
    pub(crate) slow_call_rate_threshold: f64,
    pub(crate) failure_classifier: FailureClassifierFn<T, E>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder<T, E> {
    name: String,
    failure_rate_threshold: f64,
    sliding_window_type: SlidingWindowType,
    sliding_window_size: usize,
    sliding_window_duration: Option<Duration>,
    minimum_number_of_calls: Option<usize>,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    slow_call_duration_threshold: Option<Duration>,
    slow_call_rate_threshold: f64,
    failure_classifier: FailureClassifierFn<T, E>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl<T, E> Default for CircuitBreakerConfigBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> CircuitBreakerConfigBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a new builder with defaults.
    ///
    /// Defaults: 50% failure rate threshold, count-based window of 100
    /// calls, 30s wait in Open, 1 permitted call in HalfOpen, no slow-call
    /// detection.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            failure_rate_threshold: 0.5,
            sliding_window_type: SlidingWindowType::CountBased,
            sliding_window_size: 100,
            sliding_window_duration: None,
            minimum_number_of_calls: None,
            wait_duration_in_open: Duration::from_secs(30),
            permitted_calls_in_half_open: 1,
            slow_call_duration_threshold: None,
            slow_call_rate_threshold: 1.0,
            failure_classifier: Arc::new(|outcome: &Outcome<T, E>| outcome.is_failure()),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name used in events and metrics labels.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the failure rate (0.0-1.0) at which the breaker opens.
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// Selects count-based or time-based window evaluation.
    pub fn sliding_window_type(mut self, window_type: SlidingWindowType) -> Self {
        self.sliding_window_type = window_type;
        self
    }

    /// Sets the size of a count-based window.
    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    /// Sets the duration of a time-based window. Required when
    /// `sliding_window_type` is [`SlidingWindowType::TimeBased`].
    pub fn sliding_window_duration(mut self, duration: Duration) -> Self {
        self.sliding_window_duration = Some(duration);
        self
    }

    /// Sets the minimum number of recorded calls before the failure rate is
    /// evaluated at all. Defaults to `sliding_window_size`.
    pub fn minimum_number_of_calls(mut self, n: usize) -> Self {
        self.minimum_number_of_calls = Some(n);
        self
    }

    /// Sets how long the breaker stays Open before trialing a HalfOpen call.
    pub fn wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open = duration;
        self
    }

    /// Sets how many trial calls are permitted while HalfOpen.
    pub fn permitted_calls_in_half_open(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open = n;
        self
    }

    /// Enables slow-call tracking: calls at or above `duration` count
    /// towards `slow_call_rate_threshold` in addition to the failure rate.
    pub fn slow_call_duration_threshold(mut self, duration: Duration) -> Self {
        self.slow_call_duration_threshold = Some(duration);
        self
    }

    /// Sets the slow-call rate (0.0-1.0) at which the breaker opens. Only
    /// takes effect once `slow_call_duration_threshold` is set.
    pub fn slow_call_rate_threshold(mut self, rate: f64) -> Self {
        self.slow_call_rate_threshold = rate;
        self
    }

    /// Overrides which outcomes count as failures against the window.
    pub fn failure_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Outcome<T, E>) -> bool + Send + Sync + 'static,
    {
        self.failure_classifier = Arc::new(classifier);
        self
    }

    /// Registers a callback invoked on every state transition.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallRejected { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> CircuitBreakerConfig<T, E> {
        if self.sliding_window_type == SlidingWindowType::TimeBased
            && self.sliding_window_duration.is_none()
        {
            panic!("sliding_window_duration must be set when using SlidingWindowType::TimeBased");
        }

        CircuitBreakerConfig {
            name: self.name,
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_type: self.sliding_window_type,
            sliding_window_size: self.sliding_window_size,
            sliding_window_duration: self.sliding_window_duration,
            minimum_number_of_calls: self
                .minimum_number_of_calls
                .unwrap_or(self.sliding_window_size),
            wait_duration_in_open: self.wait_duration_in_open,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            slow_call_duration_threshold: self.slow_call_duration_threshold,
            slow_call_rate_threshold: self.slow_call_rate_threshold,
            failure_classifier: self.failure_classifier,
            event_listeners: self.event_listeners,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config: CircuitBreakerConfig<i32, &str> = CircuitBreakerConfigBuilder::new().build();
        assert_eq!(config.failure_rate_threshold, 0.5);
        assert_eq!(config.minimum_number_of_calls, 100);
    }

    #[test]
    #[should_panic(expected = "sliding_window_duration must be set")]
    fn time_based_without_duration_panics() {
        let _: CircuitBreakerConfig<i32, &str> = CircuitBreakerConfigBuilder::new()
            .sliding_window_type(SlidingWindowType::TimeBased)
            .build();
    }
}
