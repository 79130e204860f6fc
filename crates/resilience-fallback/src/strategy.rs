//! [`FallbackStrategy`]: substitutes a value or alternate outcome on failure.

use crate::config::FallbackConfig;
use crate::events::FallbackEvent;
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

/// Catches a failure accepted by `should_handle` and substitutes the result
/// of `fallback_action`, so the pipeline observes a recovered outcome
/// instead of propagating the original failure.
pub struct FallbackStrategy<T, E> {
    config: FallbackConfig<T, E>,
}

impl<T, E> FallbackStrategy<T, E> {
    /// Builds a fallback strategy from a finished [`FallbackConfig`].
    pub fn new(config: FallbackConfig<T, E>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "fallback_applied_total",
                "Total number of times a fallback action was applied"
            );
        });

        Self { config }
    }
}

#[async_trait::async_trait]
impl<T, E> Strategy<T, E> for FallbackStrategy<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
        let outcome = next(ctx.clone()).await;

        let error = match outcome {
            Outcome::Success(value) => {
                let event = FallbackEvent::Succeeded {
                    operation_key: ctx.operation_key().to_string(),
                    timestamp: Instant::now(),
                };
                self.config.event_listeners.emit(&event);
                return Outcome::Success(value);
            }
            Outcome::Failure { error, trace } => {
                let should_handle = self
                    .config
                    .should_handle
                    .as_ref()
                    .map(|p| p(&error))
                    .unwrap_or(true);

                if !should_handle {
                    let event = FallbackEvent::Declined {
                        operation_key: ctx.operation_key().to_string(),
                        timestamp: Instant::now(),
                    };
                    self.config.event_listeners.emit(&event);
                    return Outcome::Failure { error, trace };
                }

                error
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(fallback = %self.config.name, "applying fallback after failure");

        #[cfg(feature = "metrics")]
        counter!("fallback_applied_total", "fallback" => self.config.name.clone()).increment(1);

        let replacement = (self.config.fallback_action)(&error, &ctx);

        let event = if replacement.is_success() {
            FallbackEvent::Applied {
                operation_key: ctx.operation_key().to_string(),
                timestamp: Instant::now(),
            }
        } else {
            FallbackEvent::FallbackFailed {
                operation_key: ctx.operation_key().to_string(),
                timestamp: Instant::now(),
            }
        };
        self.config.event_listeners.emit(&event);

        replacement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackConfigBuilder;
    use futures::future::BoxFuture;
    use std::sync::Arc;

    fn always_failing() -> NextFn<i32, &'static str> {
        Arc::new(|_ctx| Box::pin(async { Outcome::failure("boom") }) as BoxFuture<'static, Outcome<i32, &'static str>>)
    }

    fn always_succeeding() -> NextFn<i32, &'static str> {
        Arc::new(|_ctx| Box::pin(async { Outcome::success(1) }))
    }

    #[tokio::test]
    async fn passes_through_a_successful_call_untouched() {
        let config = FallbackConfigBuilder::new().fallback_value(0).build();
        let strategy = FallbackStrategy::new(config);

        let outcome = strategy
            .execute_core(always_succeeding(), ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Ok(1));
    }

    #[tokio::test]
    async fn substitutes_the_fallback_value_on_failure() {
        let config = FallbackConfigBuilder::new().fallback_value(42).build();
        let strategy = FallbackStrategy::new(config);

        let outcome = strategy
            .execute_core(always_failing(), ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Ok(42));
    }

    #[tokio::test]
    async fn should_handle_can_decline_and_let_the_failure_propagate() {
        let config = FallbackConfigBuilder::new()
            .should_handle(|e: &&str| *e != "boom")
            .fallback_value(42)
            .build();
        let strategy = FallbackStrategy::new(config);

        let outcome = strategy
            .execute_core(always_failing(), ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Err("boom"));
    }

    #[tokio::test]
    async fn fallback_with_can_inspect_the_original_error() {
        let config = FallbackConfigBuilder::new()
            .fallback_with(|err: &&str, _ctx| Outcome::success(err.len() as i32))
            .build();
        let strategy = FallbackStrategy::new(config);

        let outcome = strategy
            .execute_core(always_failing(), ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Ok(4));
    }
}
