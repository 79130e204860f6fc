//! [`RateLimiterStrategy`]: bounds call rate or concurrency.

use crate::config::{Algorithm, RateLimiterConfig};
use crate::error::RateLimiterError;
use crate::events::RateLimiterEvent;
use crate::limiter::{ConcurrencyLimiter, ConcurrencyRejection, WindowLimiter};
use resilience_core::context::ResilienceContext;
use resilience_core::error::PipelineRejection;
use resilience_core::outcome::Outcome;
use resilience_core::strategy::{NextFn, Strategy};
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

enum Limiter {
    Window(WindowLimiter),
    Concurrency(ConcurrencyLimiter),
}

/// Admits calls according to a configured rate (window-based) or
/// concurrency (semaphore-based) limit, rejecting with
/// [`PipelineRejection::RateLimiterRejected`] once exhausted.
pub struct RateLimiterStrategy {
    name: String,
    limiter: Limiter,
    event_listeners: resilience_core::events::EventListeners<RateLimiterEvent>,
}

impl RateLimiterStrategy {
    /// Builds a rate limiter strategy from a finished [`RateLimiterConfig`].
    pub fn new(config: RateLimiterConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "rate_limiter_calls_total",
                "Total number of calls seen by a rate limiter, by result"
            );
        });

        let limiter = match config.algorithm {
            Algorithm::Window {
                window_type,
                limit_for_period,
                refresh_period,
                timeout_duration,
            } => Limiter::Window(WindowLimiter::new(
                window_type,
                limit_for_period,
                refresh_period,
                timeout_duration,
            )),
            Algorithm::Concurrency {
                max_concurrent_calls,
                queue_limit,
                max_wait_duration,
            } => Limiter::Concurrency(ConcurrencyLimiter::new(
                max_concurrent_calls,
                queue_limit,
                max_wait_duration,
            )),
        };

        Self {
            name: config.name,
            limiter,
            event_listeners: config.event_listeners,
        }
    }

    fn emit_rejected(&self, operation_key: &str) {
        #[cfg(feature = "metrics")]
        counter!("rate_limiter_calls_total", "rate_limiter" => self.name.clone(), "result" => "rejected")
            .increment(1);

        let event = RateLimiterEvent::PermitRejected {
            operation_key: operation_key.to_string(),
            timestamp: Instant::now(),
        };
        self.event_listeners.emit(&event);
    }

    fn emit_acquired(&self, operation_key: &str, waited: Duration) {
        #[cfg(feature = "metrics")]
        counter!("rate_limiter_calls_total", "rate_limiter" => self.name.clone(), "result" => "acquired")
            .increment(1);

        let event = RateLimiterEvent::PermitAcquired {
            operation_key: operation_key.to_string(),
            timestamp: Instant::now(),
            waited,
        };
        self.event_listeners.emit(&event);
    }
}

#[async_trait::async_trait]
impl<T, E> Strategy<T, E> for RateLimiterStrategy
where
    T: Send + 'static,
    E: From<PipelineRejection> + Send + Sync + 'static,
{
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
        match &self.limiter {
            Limiter::Window(limiter) => match limiter.acquire().await {
                Ok(waited) => {
                    self.emit_acquired(ctx.operation_key(), waited);
                    next(ctx).await
                }
                Err(()) => {
                    self.emit_rejected(ctx.operation_key());
                    Outcome::failure(PipelineRejection::from(RateLimiterError::LimitExceeded {
                        waited: Duration::ZERO,
                    }).into())
                }
            },
            Limiter::Concurrency(limiter) => {
                let started = Instant::now();
                match limiter.acquire(ctx.cancellation()).await {
                    Ok(permit) => {
                        self.emit_acquired(ctx.operation_key(), started.elapsed());
                        let outcome = next(ctx).await;
                        drop(permit);
                        outcome
                    }
                    Err(ConcurrencyRejection::Cancelled) => {
                        self.emit_rejected(ctx.operation_key());
                        Outcome::failure(PipelineRejection::OperationCancelled.into())
                    }
                    Err(ConcurrencyRejection::QueueFull) => {
                        self.emit_rejected(ctx.operation_key());
                        Outcome::failure(PipelineRejection::from(RateLimiterError::QueueFull).into())
                    }
                    Err(ConcurrencyRejection::TimedOut) => {
                        self.emit_rejected(ctx.operation_key());
                        Outcome::failure(
                            PipelineRejection::from(RateLimiterError::LimitExceeded {
                                waited: started.elapsed(),
                            })
                            .into(),
                        )
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimiterConfigBuilder;
    use crate::limiter::WindowType;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Rejected(PipelineRejection),
    }

    impl From<PipelineRejection> for TestError {
        fn from(rejection: PipelineRejection) -> Self {
            TestError::Rejected(rejection)
        }
    }

    fn counting_success(calls: Arc<AtomicUsize>) -> NextFn<i32, TestError> {
        Arc::new(move |_ctx| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Outcome::success(1)
            }) as BoxFuture<'static, Outcome<i32, TestError>>
        })
    }

    #[tokio::test]
    async fn rejects_once_the_window_is_exhausted() {
        let config = RateLimiterConfigBuilder::new()
            .window_type(WindowType::Fixed)
            .limit_for_period(1)
            .refresh_period(Duration::from_secs(30))
            .timeout_duration(Duration::ZERO)
            .build();
        let strategy = RateLimiterStrategy::new(config);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = strategy
            .execute_core(counting_success(Arc::clone(&calls)), ResilienceContext::new("op"))
            .await;
        assert!(first.is_success());

        let second = strategy
            .execute_core(counting_success(Arc::clone(&calls)), ResilienceContext::new("op"))
            .await;
        assert!(matches!(
            second,
            Outcome::Failure {
                error: TestError::Rejected(PipelineRejection::RateLimiterRejected { .. }),
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrency_mode_rejects_beyond_the_configured_max() {
        let config = RateLimiterConfigBuilder::new()
            .max_concurrent_calls(1)
            .max_wait_duration(Duration::ZERO)
            .build();
        let strategy = Arc::new(RateLimiterStrategy::new(config));
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_next: NextFn<i32, TestError> = Arc::new(move |_ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Outcome::success(1)
            })
        });

        let strategy_clone = Arc::clone(&strategy);
        let held = tokio::spawn(async move {
            strategy_clone
                .execute_core(slow_next, ResilienceContext::new("op"))
                .await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;

        let rejected = strategy
            .execute_core(counting_success(Arc::clone(&calls)), ResilienceContext::new("op"))
            .await;
        assert!(rejected.is_failure());

        let first = held.await.unwrap();
        assert!(first.is_success());
    }

    #[tokio::test]
    async fn concurrency_mode_queues_up_to_queue_limit_before_rejecting() {
        let config = RateLimiterConfigBuilder::new()
            .max_concurrent_calls(1)
            .queue_limit(1)
            .max_wait_duration(Duration::from_secs(1))
            .build();
        let strategy = Arc::new(RateLimiterStrategy::new(config));

        let slow_next: NextFn<i32, TestError> = Arc::new(move |_ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Outcome::success(1)
            })
        });

        let strategy_clone = Arc::clone(&strategy);
        let holder = tokio::spawn(async move {
            strategy_clone
                .execute_core(slow_next, ResilienceContext::new("op"))
                .await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;

        // Queues behind the holder and eventually succeeds once it releases.
        let strategy_clone = Arc::clone(&strategy);
        let queued = tokio::spawn(async move {
            strategy_clone
                .execute_core(
                    Arc::new(move |_ctx| Box::pin(async move { Outcome::success(2) })),
                    ResilienceContext::new("op"),
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;

        // Both the permit and the one queue slot are taken; this one is
        // rejected synchronously.
        let rejected = strategy
            .execute_core(
                Arc::new(move |_ctx| Box::pin(async move { Outcome::success(3) })),
                ResilienceContext::new("op"),
            )
            .await;
        assert!(matches!(
            rejected,
            Outcome::Failure {
                error: TestError::Rejected(PipelineRejection::RateLimiterRejected { .. }),
                ..
            }
        ));

        assert!(holder.await.unwrap().is_success());
        assert!(queued.await.unwrap().is_success());
    }

    #[tokio::test]
    async fn concurrency_mode_resolves_a_cancelled_queued_wait_as_operation_cancelled() {
        let config = RateLimiterConfigBuilder::new()
            .max_concurrent_calls(1)
            .queue_limit(1)
            .max_wait_duration(Duration::from_secs(30))
            .build();
        let strategy = Arc::new(RateLimiterStrategy::new(config));

        let slow_next: NextFn<i32, TestError> = Arc::new(move |_ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Outcome::success(1)
            })
        });

        let strategy_clone = Arc::clone(&strategy);
        let holder = tokio::spawn(async move {
            strategy_clone
                .execute_core(slow_next, ResilienceContext::new("op"))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let ctx = ResilienceContext::new("op");
        let cancellation = ctx.cancellation().clone();
        let strategy_clone = Arc::clone(&strategy);
        let queued = tokio::spawn(async move {
            strategy_clone
                .execute_core(
                    Arc::new(move |_ctx| Box::pin(async move { Outcome::success(2) })),
                    ctx,
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let started = std::time::Instant::now();
        cancellation.cancel();

        let result = queued.await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(150));
        assert!(matches!(
            result,
            Outcome::Failure {
                error: TestError::Rejected(PipelineRejection::OperationCancelled),
                ..
            }
        ));

        assert!(holder.await.unwrap().is_success());
    }
}
