//! Configuration for [`crate::FallbackStrategy`].

use crate::events::FallbackEvent;
use resilience_core::context::ResilienceContext;
use resilience_core::events::{EventListeners, FnListener};
use resilience_core::outcome::Outcome;
use std::sync::Arc;

/// Predicate deciding whether a failure should be handled by the fallback,
/// or left to propagate untouched.
pub type ShouldHandleFn<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Produces a replacement [`Outcome`] for a failed call. Receives the
/// original error and the [`ResilienceContext`] the call ran under.
pub type FallbackActionFn<T, E> =
    Arc<dyn Fn(&E, &ResilienceContext) -> Outcome<T, E> + Send + Sync>;

/// Configuration for [`crate::FallbackStrategy`].
pub struct FallbackConfig<T, E> {
    pub(crate) name: String,
    pub(crate) should_handle: Option<ShouldHandleFn<E>>,
    pub(crate) fallback_action: FallbackActionFn<T, E>,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
}

/// Builder for [`FallbackConfig`].
pub struct FallbackConfigBuilder<T, E> {
    name: String,
    should_handle: Option<ShouldHandleFn<E>>,
    fallback_action: Option<FallbackActionFn<T, E>>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl<T, E> FallbackConfigBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a new builder. A fallback action must be supplied via
    /// [`Self::fallback_value`] or [`Self::fallback_with`] before
    /// [`Self::build`].
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            should_handle: None,
            fallback_action: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name used in events and metrics labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restricts which errors the fallback handles; errors rejected by this
    /// predicate propagate unchanged. Defaults to handling every failure.
    pub fn should_handle<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_handle = Some(Arc::new(predicate));
        self
    }

    /// Replaces a handled failure with a fixed, clonable value.
    pub fn fallback_value(mut self, value: T) -> Self
    where
        T: Clone,
    {
        self.fallback_action = Some(Arc::new(move |_err, _ctx| Outcome::success(value.clone())));
        self
    }

    /// Replaces a handled failure with the result of an arbitrary function
    /// of the original error and the call's [`ResilienceContext`].
    pub fn fallback_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&E, &ResilienceContext) -> Outcome<T, E> + Send + Sync + 'static,
    {
        self.fallback_action = Some(Arc::new(f));
        self
    }

    /// Registers a callback invoked whenever the fallback action runs,
    /// regardless of whether it produced a success or a failure.
    pub fn on_fallback<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, FallbackEvent::Applied { .. }) {
                f();
            }
        }));
        self
    }

    /// Finalizes the builder.
    ///
    /// # Panics
    ///
    /// Panics if no fallback action was configured.
    pub fn build(self) -> FallbackConfig<T, E> {
        FallbackConfig {
            name: self.name,
            should_handle: self.should_handle,
            fallback_action: self
                .fallback_action
                .expect("a fallback action must be set via fallback_value or fallback_with"),
            event_listeners: self.event_listeners,
        }
    }
}

impl<T, E> Default for FallbackConfigBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "a fallback action must be set")]
    fn build_without_a_fallback_action_panics() {
        let _: FallbackConfig<i32, &str> = FallbackConfigBuilder::new().build();
    }

    #[test]
    fn fallback_value_builds_successfully() {
        let config: FallbackConfig<i32, &str> = FallbackConfigBuilder::new().fallback_value(0).build();
        let ctx = ResilienceContext::new("op");
        let outcome = (config.fallback_action)(&"boom", &ctx);
        assert_eq!(outcome.into_result(), Ok(0));
    }
}
