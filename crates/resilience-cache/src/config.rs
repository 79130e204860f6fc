//! Configuration for [`crate::CacheStrategy`].

use crate::events::CacheEvent;
use crate::provider::CacheProvider;
use resilience_core::context::ResilienceContext;
use resilience_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Derives the cache key for a call from its [`ResilienceContext`]. The
/// default implementation uses `context.operation_key()` verbatim; an
/// empty key bypasses the cache entirely.
pub type KeyGeneratorFn = Arc<dyn Fn(&ResilienceContext) -> String + Send + Sync>;

/// Decides whether a successful value is worth caching. Defaults to caching
/// every success.
pub type ShouldCacheFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Configuration for [`crate::CacheStrategy`].
pub struct CacheConfig<T> {
    pub(crate) name: String,
    pub(crate) provider: Arc<dyn CacheProvider<T>>,
    pub(crate) key_generator: KeyGeneratorFn,
    pub(crate) ttl: Option<Duration>,
    pub(crate) should_cache: ShouldCacheFn<T>,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder<T> {
    name: String,
    provider: Option<Arc<dyn CacheProvider<T>>>,
    key_generator: Option<KeyGeneratorFn>,
    ttl: Option<Duration>,
    should_cache: Option<ShouldCacheFn<T>>,
    event_listeners: EventListeners<CacheEvent>,
}

impl<T> CacheConfigBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new builder. A provider must be supplied via
    /// [`Self::provider`] before [`Self::build`].
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            provider: None,
            key_generator: None,
            ttl: None,
            should_cache: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name used in events and metrics labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the storage backend. Required.
    pub fn provider(mut self, provider: impl CacheProvider<T> + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Shares an already-constructed provider, e.g. one reused across
    /// several pipelines that should see the same cached entries.
    pub fn shared_provider(mut self, provider: Arc<dyn CacheProvider<T>>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Overrides the default key derivation (`context.operation_key()`).
    pub fn key_generator<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResilienceContext) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(f));
        self
    }

    /// Sets how long a cached entry remains valid. Unset means entries
    /// never expire on their own (though the provider may still evict
    /// them, e.g. by LRU capacity).
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Restricts which successful values are cached. Defaults to caching
    /// every success. Failures are never cached regardless of this
    /// predicate.
    pub fn should_cache<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.should_cache = Some(Arc::new(predicate));
        self
    }

    /// Registers a callback invoked on a cache hit.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Hit { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked on a cache miss.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Miss { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked whenever a value is written back to
    /// the provider.
    pub fn on_set<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Set { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Finalizes the builder.
    ///
    /// # Panics
    ///
    /// Panics if no provider was configured.
    pub fn build(self) -> CacheConfig<T> {
        CacheConfig {
            name: self.name,
            provider: self
                .provider
                .expect("a cache provider must be set via provider() or shared_provider()"),
            key_generator: self
                .key_generator
                .unwrap_or_else(|| Arc::new(|ctx| ctx.operation_key().to_string())),
            ttl: self.ttl,
            should_cache: self.should_cache.unwrap_or_else(|| Arc::new(|_| true)),
            event_listeners: self.event_listeners,
        }
    }
}

impl<T> Default for CacheConfigBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryCacheProvider;

    #[test]
    #[should_panic(expected = "a cache provider must be set")]
    fn build_without_a_provider_panics() {
        let _: CacheConfig<i32> = CacheConfigBuilder::new().build();
    }

    #[test]
    fn default_key_generator_uses_operation_key() {
        let config: CacheConfig<i32> = CacheConfigBuilder::new()
            .provider(InMemoryCacheProvider::new(4))
            .build();
        let ctx = ResilienceContext::new("op-7");
        assert_eq!((config.key_generator)(&ctx), "op-7");
    }
}
