//! [`RetryStrategy`]: retries a failed call with configurable backoff.

use crate::backoff::apply_jitter_and_clamp;
use crate::config::RetryConfig;
use crate::events::RetryEvent;
use resilience_core::context::ResilienceContext;
use resilience_core::error::PipelineRejection;
use resilience_core::outcome::Outcome;
use resilience_core::strategy::{NextFn, Strategy};
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Retries the wrapped operation on failure, per [`RetryConfig`].
pub struct RetryStrategy<E> {
    config: RetryConfig<E>,
}

impl<E> RetryStrategy<E> {
    /// Builds a retry strategy from a finished [`RetryConfig`].
    pub fn new(config: RetryConfig<E>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!("retry_attempts_total", "Total number of retry attempts made");
            describe_counter!(
                "retry_exhausted_total",
                "Total number of operations that exhausted all retry attempts"
            );
        });

        Self { config }
    }
}

#[async_trait::async_trait]
impl<T, E> Strategy<T, E> for RetryStrategy<E>
where
    T: Send + 'static,
    E: From<PipelineRejection> + Clone + Send + Sync + 'static,
{
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
        let mut attempt = 1usize;

        loop {
            if ctx.is_cancelled() {
                return Outcome::failure(PipelineRejection::OperationCancelled.into());
            }

            let outcome = next(ctx.clone()).await;

            let error = match outcome {
                Outcome::Success(value) => {
                    if let Some(budget) = &self.config.retry_budget {
                        budget.deposit();
                    }

                    if attempt > 1 {
                        #[cfg(feature = "metrics")]
                        counter!("retry_attempts_total", "retry" => self.config.name.clone(), "result" => "success")
                            .increment(1);

                        let event = RetryEvent::Succeeded {
                            operation_key: ctx.operation_key().to_string(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        };
                        self.config.event_listeners.emit(&event);
                    }
                    return Outcome::Success(value);
                }
                Outcome::Failure { error, trace } => {
                    let should_retry = self
                        .config
                        .should_handle
                        .as_ref()
                        .map(|p| p(&error))
                        .unwrap_or(true);

                    if !should_retry {
                        let event = RetryEvent::Ignored {
                            operation_key: ctx.operation_key().to_string(),
                            timestamp: Instant::now(),
                            attempt,
                        };
                        self.config.event_listeners.emit(&event);
                        return Outcome::Failure { error, trace };
                    }

                    if attempt > self.config.max_attempts {
                        #[cfg(feature = "metrics")]
                        counter!("retry_exhausted_total", "retry" => self.config.name.clone())
                            .increment(1);

                        let event = RetryEvent::Exhausted {
                            operation_key: ctx.operation_key().to_string(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        };
                        self.config.event_listeners.emit(&event);
                        return Outcome::Failure { error, trace };
                    }

                    if let Some(budget) = &self.config.retry_budget {
                        if !budget.try_withdraw() {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(retry = %self.config.name, attempt, "retry budget exhausted, giving up");

                            let event = RetryEvent::BudgetExhausted {
                                operation_key: ctx.operation_key().to_string(),
                                timestamp: Instant::now(),
                                attempt,
                            };
                            self.config.event_listeners.emit(&event);
                            return Outcome::Failure { error, trace };
                        }
                    }

                    error
                }
            };

            let delay = apply_jitter_and_clamp(
                self.config.backoff.base_delay(attempt),
                self.config.jitter,
                self.config.max_delay,
            );

            #[cfg(feature = "tracing")]
            tracing::debug!(
                retry = %self.config.name,
                attempt,
                ?delay,
                "retrying after failure"
            );

            #[cfg(feature = "metrics")]
            counter!("retry_attempts_total", "retry" => self.config.name.clone(), "result" => "retrying")
                .increment(1);

            let event = RetryEvent::Retrying {
                operation_key: ctx.operation_key().to_string(),
                timestamp: Instant::now(),
                attempt,
                delay,
            };
            self.config.event_listeners.emit(&event);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancellation().cancelled() => {
                    return Outcome::Failure {
                        error,
                        trace: resilience_core::outcome::CallStackSnapshot::capture(),
                    };
                }
            }

            ctx.advance_attempt();
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfigBuilder;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
        Rejected,
    }

    impl From<PipelineRejection> for TestError {
        fn from(_: PipelineRejection) -> Self {
            TestError::Rejected
        }
    }

    fn next_failing_n_times(failures: usize) -> (NextFn<i32, TestError>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let next: NextFn<i32, TestError> = Arc::new(move |_ctx| {
            let calls = Arc::clone(&calls_clone);
            Box::pin(async move {
                let count = calls.fetch_add(1, Ordering::SeqCst);
                if count < failures {
                    Outcome::failure(TestError::Transient)
                } else {
                    Outcome::success(count as i32)
                }
            }) as BoxFuture<'static, Outcome<i32, TestError>>
        });
        (next, calls)
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_succeeds() {
        let (next, calls) = next_failing_n_times(0);
        let config = RetryConfigBuilder::new().max_attempts(3).build();
        let strategy = RetryStrategy::new(config);

        let outcome = strategy
            .execute_core(next, ResilienceContext::new("op"))
            .await;

        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_attempts_then_succeeds() {
        let (next, calls) = next_failing_n_times(2);
        let config = RetryConfigBuilder::new()
            .max_attempts(5)
            .constant_backoff(Duration::from_millis(1))
            .build();
        let strategy = RetryStrategy::new(config);

        let outcome = strategy
            .execute_core(next, ResilienceContext::new("op"))
            .await;

        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let (next, calls) = next_failing_n_times(usize::MAX);
        let config = RetryConfigBuilder::new()
            .max_attempts(3)
            .constant_backoff(Duration::from_millis(1))
            .build();
        let strategy = RetryStrategy::new(config);

        let outcome = strategy
            .execute_core(next, ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_max_attempts_disables_retrying() {
        let (next, calls) = next_failing_n_times(usize::MAX);
        let config = RetryConfigBuilder::new().max_attempts(0).build();
        let strategy = RetryStrategy::new(config);

        let outcome = strategy
            .execute_core(next, ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_handle_predicate_skips_retry_for_permanent_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let next: NextFn<i32, TestError> = Arc::new(move |_ctx| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Outcome::failure(TestError::Permanent) })
        });

        let config = RetryConfigBuilder::new()
            .max_attempts(5)
            .should_handle(|e: &TestError| *e != TestError::Permanent)
            .build();
        let strategy = RetryStrategy::new(config);

        let outcome = strategy
            .execute_core(next, ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Err(TestError::Permanent));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn an_exhausted_retry_budget_stops_retrying_before_max_attempts() {
        let (next, calls) = next_failing_n_times(usize::MAX);
        let budget = crate::budget::RetryBudgetBuilder::new()
            .token_bucket()
            .tokens_per_second(0.0)
            .max_tokens(1)
            .initial_tokens(1)
            .build();
        let config = RetryConfigBuilder::new()
            .max_attempts(5)
            .constant_backoff(Duration::from_millis(1))
            .retry_budget(budget)
            .build();
        let strategy = RetryStrategy::new(config);

        let outcome = strategy
            .execute_core(next, ResilienceContext::new("op"))
            .await;

        assert_eq!(outcome.into_result(), Err(TestError::Transient));
        // One retry consumes the single budgeted token; the next would-be
        // retry is denied by the budget well before max_attempts (5).
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
