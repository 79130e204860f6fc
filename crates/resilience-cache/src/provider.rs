//! [`CacheProvider`]: the pluggable storage interface behind [`crate::CacheStrategy`],
//! plus [`InMemoryCacheProvider`], a ready-made LRU implementation.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A boxed, opaque error returned by a [`CacheProvider`] operation.
///
/// The cache strategy never inspects the contents of this error: per the
/// cache-aside contract, a provider fault is swallowed and treated exactly
/// like a miss (on read) or a best-effort no-op (on write), so the caller
/// always sees the same result it would have gotten without a cache.
#[derive(Debug, thiserror::Error)]
#[error("cache provider error: {source}")]
pub struct CacheProviderError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl CacheProviderError {
    /// Wraps an arbitrary error as a [`CacheProviderError`].
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

/// Pluggable cache-aside storage backend.
///
/// Implementations may be in-process ([`InMemoryCacheProvider`]) or a thin
/// wrapper over an external store (Redis, memcached, …); the strategy only
/// ever calls these four methods plus [`CacheProvider::size`] for
/// introspection. Implementations MUST be safe under concurrent calls —
/// the same provider instance is typically shared across every concurrent
/// execution through a [`crate::CacheStrategy`].
#[async_trait::async_trait]
pub trait CacheProvider<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns the value stored under `key`, or `None` if absent, expired,
    /// or of the wrong type. A provider-level fault is reported as `Err`
    /// so the strategy can treat it as a miss without masking the reason
    /// in logs/metrics.
    async fn get(&self, key: &str) -> Result<Option<V>, CacheProviderError>;

    /// Stores `value` under `key`, overwriting any existing entry. `ttl`,
    /// if set, bounds how long the entry remains valid.
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheProviderError>;

    /// Removes the entry at `key`, if any.
    async fn remove(&self, key: &str) -> Result<(), CacheProviderError>;

    /// Removes every entry.
    async fn clear(&self) -> Result<(), CacheProviderError>;

    /// The number of live entries, for providers that can report it
    /// cheaply. Remote providers may return `None`.
    fn size(&self) -> Option<usize>;
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

/// An in-process, LRU-evicted [`CacheProvider`] backed by the `lru` crate.
///
/// Entries additionally expire on their own per-entry TTL (set per
/// [`CacheProvider::set`] call), independent of LRU eviction driven by
/// `capacity`. A `get` against an expired entry removes it and reports a
/// miss, same as the teacher's own cache store.
pub struct InMemoryCacheProvider<V> {
    store: Mutex<LruCache<String, Entry<V>>>,
}

impl<V> InMemoryCacheProvider<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty provider holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            store: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait::async_trait]
impl<V> CacheProvider<V> for InMemoryCacheProvider<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheProviderError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());

        let expired = match store.get(key) {
            Some(entry) => entry.is_expired(),
            None => return Ok(None),
        };

        if expired {
            store.pop(key);
            return Ok(None);
        }

        Ok(store.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheProviderError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.put(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheProviderError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.pop(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheProviderError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.clear();
        Ok(())
    }

    fn size(&self) -> Option<usize> {
        Some(self.store.lock().unwrap_or_else(|e| e.into_inner()).len())
    }
}

/// A [`CacheProvider`] whose every operation faults, used to test that a
/// broken provider never alters the result a caller would see without one.
#[cfg(test)]
pub(crate) struct AlwaysFailingProvider;

#[cfg(test)]
#[async_trait::async_trait]
impl<V> CacheProvider<V> for AlwaysFailingProvider
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, _key: &str) -> Result<Option<V>, CacheProviderError> {
        Err(CacheProviderError::new(std::io::Error::other("provider down")))
    }

    async fn set(&self, _key: &str, _value: V, _ttl: Option<Duration>) -> Result<(), CacheProviderError> {
        Err(CacheProviderError::new(std::io::Error::other("provider down")))
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheProviderError> {
        Err(CacheProviderError::new(std::io::Error::other("provider down")))
    }

    async fn clear(&self) -> Result<(), CacheProviderError> {
        Err(CacheProviderError::new(std::io::Error::other("provider down")))
    }

    fn size(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_a_value() {
        let provider: InMemoryCacheProvider<String> = InMemoryCacheProvider::new(4);
        provider.set("k", "v".to_string(), None).await.unwrap();
        assert_eq!(provider.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn evicts_least_recently_used_past_capacity() {
        let provider: InMemoryCacheProvider<i32> = InMemoryCacheProvider::new(2);
        provider.set("a", 1, None).await.unwrap();
        provider.set("b", 2, None).await.unwrap();
        provider.set("c", 3, None).await.unwrap();

        assert_eq!(provider.get("a").await.unwrap(), None);
        assert_eq!(provider.get("b").await.unwrap(), Some(2));
        assert_eq!(provider.get("c").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let provider: InMemoryCacheProvider<i32> = InMemoryCacheProvider::new(4);
        provider
            .set("k", 1, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(provider.get("k").await.unwrap(), Some(1));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(provider.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_empties_the_provider() {
        let provider: InMemoryCacheProvider<i32> = InMemoryCacheProvider::new(4);
        provider.set("a", 1, None).await.unwrap();
        provider.set("b", 2, None).await.unwrap();
        provider.clear().await.unwrap();
        assert_eq!(provider.size(), Some(0));
    }
}
