//! [`ResilienceContext`]: the value threaded through every strategy in a
//! pipeline execution.

use crate::cancellation::CancellationSignal;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A type-erased, string-keyed bag of properties strategies use to pass
/// data to each other (e.g. the circuit breaker annotating the context with
/// the state it rejected in, for a fallback further out to inspect).
#[derive(Default)]
pub struct PropertyBag {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl PropertyBag {
    /// Creates an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a typed value under `key`, returning the previous value at
    /// that key if its type matches.
    pub fn insert<V: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: V) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Retrieves a typed value by key. Returns `None` if the key is absent
    /// or the stored value is not of type `V`.
    pub fn get<V: Send + Sync + 'static>(&self, key: &str) -> Option<&V> {
        self.values.get(key).and_then(|v| v.downcast_ref::<V>())
    }

    /// Removes a key, returning its value if present and of type `V`.
    pub fn remove<V: Send + Sync + 'static>(&mut self, key: &str) -> Option<V> {
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<V>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Per-execution state threaded through a [`crate::pipeline::Pipeline`].
///
/// Cheaply `Clone`: every clone shares the same `operation_key`, attempt
/// counter and property bag (via `Arc`), so strategies observe a single
/// logical context even though it is passed by value through `async`
/// boundaries. The one field that is *not* shared across every clone is the
/// [`CancellationSignal`] — hedging derives a child signal per attempt via
/// [`ResilienceContext::with_child_cancellation`] so a single losing attempt
/// can be cancelled without disturbing its siblings.
#[derive(Clone)]
pub struct ResilienceContext {
    operation_key: Arc<str>,
    attempt_number: Arc<AtomicUsize>,
    properties: Arc<Mutex<PropertyBag>>,
    cancellation: CancellationSignal,
}

impl ResilienceContext {
    /// Creates a fresh context for a new top-level execution.
    pub fn new(operation_key: impl Into<Arc<str>>) -> Self {
        Self {
            operation_key: operation_key.into(),
            attempt_number: Arc::new(AtomicUsize::new(0)),
            properties: Arc::new(Mutex::new(PropertyBag::new())),
            cancellation: CancellationSignal::new(),
        }
    }

    /// The stable key identifying the logical operation being executed
    /// (used to scope per-operation strategy state and event/metric labels).
    pub fn operation_key(&self) -> &str {
        &self.operation_key
    }

    /// The current attempt number, starting at 0 for the first attempt.
    pub fn attempt_number(&self) -> usize {
        self.attempt_number.load(Ordering::SeqCst)
    }

    /// Advances the attempt counter. Called by [`crate::strategy::Strategy`]
    /// implementations (chiefly retry and hedging) before invoking `next`
    /// again for a subsequent attempt.
    pub fn advance_attempt(&self) -> usize {
        self.attempt_number.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Runs `f` against the shared property bag.
    pub fn with_properties<R>(&self, f: impl FnOnce(&PropertyBag) -> R) -> R {
        let guard = self.properties.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Runs `f` against the shared property bag with mutable access.
    pub fn with_properties_mut<R>(&self, f: impl FnOnce(&mut PropertyBag) -> R) -> R {
        let mut guard = self.properties.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// The cancellation signal for this context.
    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancellation
    }

    /// True if this execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns a clone of this context carrying a *child* cancellation
    /// signal instead of the shared one. Everything else (operation key,
    /// attempt counter, property bag) remains shared with `self`.
    pub fn with_child_cancellation(&self) -> Self {
        Self {
            operation_key: Arc::clone(&self.operation_key),
            attempt_number: Arc::clone(&self.attempt_number),
            properties: Arc::clone(&self.properties),
            cancellation: self.cancellation.child(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_bag_roundtrips_typed_values() {
        let mut bag = PropertyBag::new();
        bag.insert("retries", 3_u32);
        assert_eq!(bag.get::<u32>("retries"), Some(&3));
        assert_eq!(bag.get::<&str>("retries"), None);
    }

    #[test]
    fn clones_share_attempt_counter_and_properties() {
        let ctx = ResilienceContext::new("op-1");
        let clone = ctx.clone();

        ctx.advance_attempt();
        assert_eq!(clone.attempt_number(), 1);

        ctx.with_properties_mut(|bag| bag.insert("k", 7_i32));
        assert_eq!(clone.with_properties(|bag| *bag.get::<i32>("k").unwrap()), 7);
    }

    #[test]
    fn child_cancellation_is_independent_but_observes_parent() {
        let ctx = ResilienceContext::new("op-1");
        let hedge_attempt = ctx.with_child_cancellation();

        hedge_attempt.cancellation().cancel();
        assert!(!ctx.is_cancelled());
        assert!(hedge_attempt.is_cancelled());

        let other_attempt = ctx.with_child_cancellation();
        ctx.cancellation().cancel();
        assert!(other_attempt.is_cancelled());
    }
}
