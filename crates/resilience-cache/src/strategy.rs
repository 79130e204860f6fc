//! [`CacheStrategy`]: cache-aside over a pluggable [`crate::CacheProvider`].

use crate::config::CacheConfig;
use crate::events::CacheEvent;
use resilience_core::context::ResilienceContext;
use resilience_core::outcome::Outcome;
use resilience_core::strategy::{NextFn, Strategy};
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Serves a call from cache when a live entry exists for its key; on a
/// miss, runs the wrapped call and writes a cacheable success back to the
/// provider. A fault from the provider is swallowed on both the read and
/// the write side — it never changes the result the caller sees compared
/// to a pipeline with no cache at all.
pub struct CacheStrategy<T> {
    config: CacheConfig<T>,
}

impl<T> CacheStrategy<T> {
    /// Builds a cache strategy from a finished [`CacheConfig`].
    pub fn new(config: CacheConfig<T>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!("cache_hits_total", "Total number of cache hits");
            describe_counter!("cache_misses_total", "Total number of cache misses");
        });

        Self { config }
    }
}

#[async_trait::async_trait]
impl<T, E> Strategy<T, E> for CacheStrategy<T>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
        let key = (self.config.key_generator)(&ctx);

        if key.is_empty() {
            return next(ctx).await;
        }

        match self.config.provider.get(&key).await {
            Ok(Some(value)) => {
                #[cfg(feature = "metrics")]
                counter!("cache_hits_total", "cache" => self.config.name.clone()).increment(1);

                let event = CacheEvent::Hit {
                    operation_key: ctx.operation_key().to_string(),
                    timestamp: Instant::now(),
                    key,
                };
                self.config.event_listeners.emit(&event);
                return Outcome::Success(value);
            }
            Ok(None) => {
                #[cfg(feature = "metrics")]
                counter!("cache_misses_total", "cache" => self.config.name.clone()).increment(1);

                let event = CacheEvent::Miss {
                    operation_key: ctx.operation_key().to_string(),
                    timestamp: Instant::now(),
                    key: key.clone(),
                };
                self.config.event_listeners.emit(&event);
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(cache = %self.config.name, error = %_err, "cache get failed, treating as a miss");

                let event = CacheEvent::ProviderError {
                    operation_key: ctx.operation_key().to_string(),
                    timestamp: Instant::now(),
                    key: key.clone(),
                    during: "get",
                };
                self.config.event_listeners.emit(&event);
            }
        }

        let outcome = next(ctx.clone()).await;

        if let Outcome::Success(value) = &outcome {
            if (self.config.should_cache)(value) {
                match self
                    .config
                    .provider
                    .set(&key, value.clone(), self.config.ttl)
                    .await
                {
                    Ok(()) => {
                        let event = CacheEvent::Set {
                            operation_key: ctx.operation_key().to_string(),
                            timestamp: Instant::now(),
                            key,
                        };
                        self.config.event_listeners.emit(&event);
                    }
                    Err(_err) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(cache = %self.config.name, error = %_err, "cache set failed, value not persisted");

                        let event = CacheEvent::ProviderError {
                            operation_key: ctx.operation_key().to_string(),
                            timestamp: Instant::now(),
                            key,
                            during: "set",
                        };
                        self.config.event_listeners.emit(&event);
                    }
                }
            }
        }

        outcome
    }
}
