//! Configuration for [`crate::RetryStrategy`].

use crate::backoff::BackoffStrategy;
use crate::budget::RetryBudget;
use crate::events::RetryEvent;
use resilience_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether an error should be retried.
pub type ShouldHandleFn<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Configuration for [`crate::RetryStrategy`].
pub struct RetryConfig<E> {
    pub(crate) name: String,
    pub(crate) max_attempts: usize,
    pub(crate) backoff: BackoffStrategy,
    pub(crate) jitter: bool,
    pub(crate) max_delay: Option<Duration>,
    pub(crate) should_handle: Option<ShouldHandleFn<E>>,
    pub(crate) retry_budget: Option<Arc<dyn RetryBudget>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<E> {
    name: String,
    max_attempts: usize,
    backoff: BackoffStrategy,
    jitter: bool,
    max_delay: Option<Duration>,
    should_handle: Option<ShouldHandleFn<E>>,
    retry_budget: Option<Arc<dyn RetryBudget>>,
    event_listeners: EventListeners<RetryEvent>,
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryConfigBuilder<E> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults: `max_attempts: 3` (up to 4 total calls), constant 100ms
    /// backoff, no jitter, no `max_delay`, every error retried.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            max_attempts: 3,
            backoff: BackoffStrategy::Constant(Duration::from_millis(100)),
            jitter: false,
            max_delay: None,
            should_handle: None,
            retry_budget: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name used in events and metrics labels.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the maximum number of retries after the initial call. A value
    /// of 0 disables retrying entirely (the callback is invoked exactly
    /// once); a value of `n` invokes the callback at most `n + 1` times.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the backoff strategy used to compute delay between attempts.
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Convenience for `backoff(BackoffStrategy::Constant(delay))`.
    pub fn constant_backoff(self, delay: Duration) -> Self {
        self.backoff(BackoffStrategy::Constant(delay))
    }

    /// Convenience for `backoff(BackoffStrategy::Linear { .. })`.
    pub fn linear_backoff(self, initial: Duration, increment: Duration) -> Self {
        self.backoff(BackoffStrategy::Linear { initial, increment })
    }

    /// Convenience for `backoff(BackoffStrategy::Exponential { .. })`.
    pub fn exponential_backoff(self, initial: Duration, multiplier: f64) -> Self {
        self.backoff(BackoffStrategy::Exponential { initial, multiplier })
    }

    /// Enables full jitter (`U(0, delay)`) on top of the computed backoff.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Clamps the computed (and jittered) delay to at most `max_delay`.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Restricts retrying to errors for which `predicate` returns true.
    /// Errors for which it returns false propagate immediately.
    pub fn should_handle<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_handle = Some(Arc::new(predicate));
        self
    }

    /// Caps total retries across every call sharing this strategy with a
    /// [`RetryBudget`], so a downstream already struggling under load isn't
    /// further amplified by a retry storm. Unset by default (unbounded
    /// retrying, subject only to `max_attempts` per call).
    pub fn retry_budget(mut self, budget: Arc<dyn RetryBudget>) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    /// Registers a callback invoked immediately before each retry attempt.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retrying { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked once the operation ultimately succeeds.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Succeeded { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked once all attempts are exhausted.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> RetryConfig<E> {
        RetryConfig {
            name: self.name,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
            max_delay: self.max_delay,
            should_handle: self.should_handle,
            retry_budget: self.retry_budget,
            event_listeners: self.event_listeners,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_three_attempts() {
        let config: RetryConfig<&str> = RetryConfigBuilder::new().build();
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn max_attempts_of_zero_disables_retrying() {
        let config: RetryConfig<&str> = RetryConfigBuilder::new().max_attempts(0).build();
        assert_eq!(config.max_attempts, 0);
    }
}
