//! Cache-aside strategy for the resilience pipeline.
//!
//! Looks up the call's key in a pluggable [`CacheProvider`] before running
//! it; on a miss, runs the call and — if [`config::CacheConfigBuilder::should_cache`]
//! accepts the result — writes it back with an optional TTL. A provider
//! fault on either the read or the write side is swallowed: the caller
//! always sees the same result a pipeline without a cache would have
//! produced. [`InMemoryCacheProvider`] is a ready-made LRU-backed provider
//! for single-process use; production deployments typically supply their
//! own [`CacheProvider`] over Redis, memcached, or similar.
//!
//! ```
//! use resilience_core::{Pipeline, PipelineBuilder};
//! use resilience_cache::{CacheConfigBuilder, InMemoryCacheProvider, PipelineBuilderExt};
//!
//! let cache = CacheConfigBuilder::new()
//!     .provider(InMemoryCacheProvider::new(1_000))
//!     .build();
//!
//! let pipeline: Pipeline<String, String> = PipelineBuilder::new().add_cache(cache).build();
//! ```

mod config;
mod events;
mod provider;
mod strategy;

pub use config::{CacheConfig, CacheConfigBuilder, KeyGeneratorFn, ShouldCacheFn};
pub use events::CacheEvent;
pub use provider::{CacheProvider, CacheProviderError, InMemoryCacheProvider};
pub use strategy::CacheStrategy;

use resilience_core::pipeline::PipelineBuilder;
use std::sync::Arc;

/// Extends [`PipelineBuilder`] with `add_cache`.
pub trait PipelineBuilderExt<T, E> {
    /// Appends a [`CacheStrategy`] built from `config`.
    fn add_cache(self, config: CacheConfig<T>) -> PipelineBuilder<T, E>;
}

impl<T, E> PipelineBuilderExt<T, E> for PipelineBuilder<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn add_cache(self, config: CacheConfig<T>) -> PipelineBuilder<T, E> {
        self.add(Arc::new(CacheStrategy::new(config)))
    }
}
