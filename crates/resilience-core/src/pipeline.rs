//! [`Pipeline`] and [`PipelineBuilder`]: an immutable, ordered stack of
//! [`Strategy`] instances.

use crate::context::ResilienceContext;
use crate::outcome::Outcome;
use crate::strategy::{NextFn, Strategy};
use futures::future::BoxFuture;
use std::sync::Arc;

/// An immutable, ordered stack of strategies wrapping a user operation.
///
/// Strategies are nested outermost-first: the first strategy added via
/// [`PipelineBuilder::add`] is the outermost layer and sees every call
/// first; the last strategy added sits closest to the user's own callback.
/// This mirrors the order you'd read the builder chain in: `.add_retry(..)
/// .add_circuit_breaker(..)` puts retry *around* the circuit breaker, so a
/// single logical call can still drive several attempts against the
/// breaker.
pub struct Pipeline<T, E> {
    strategies: Arc<[Arc<dyn Strategy<T, E>>]>,
}

impl<T, E> Clone for Pipeline<T, E> {
    fn clone(&self) -> Self {
        Self {
            strategies: Arc::clone(&self.strategies),
        }
    }
}

impl<T, E> Pipeline<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Starts building a new pipeline.
    pub fn builder() -> PipelineBuilder<T, E> {
        PipelineBuilder::new()
    }

    /// Executes `operation` through every strategy in the pipeline,
    /// preserving the captured [`crate::outcome::CallStackSnapshot`] on
    /// failure.
    pub async fn execute_and_capture<F>(
        &self,
        operation_key: impl Into<Arc<str>>,
        operation: F,
    ) -> Outcome<T, E>
    where
        F: Fn(ResilienceContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static,
    {
        let ctx = ResilienceContext::new(operation_key);
        let operation = Arc::new(operation);
        let innermost: NextFn<T, E> = {
            let operation = Arc::clone(&operation);
            Arc::new(move |ctx| {
                let operation = Arc::clone(&operation);
                Box::pin(async move { Outcome::from_result(operation(ctx).await) })
            })
        };

        let chain = self
            .strategies
            .iter()
            .rev()
            .fold(innermost, |next, strategy| {
                let strategy = Arc::clone(strategy);
                let next_for_closure = next;
                Arc::new(move |ctx: ResilienceContext| {
                    let strategy = Arc::clone(&strategy);
                    let next = Arc::clone(&next_for_closure);
                    Box::pin(async move { strategy.execute_core(next, ctx).await })
                        as BoxFuture<'static, Outcome<T, E>>
                })
            });

        chain(ctx).await
    }

    /// Executes `operation` through the pipeline, discarding the call-stack
    /// trace and returning a plain `Result`.
    pub async fn execute<F>(&self, operation_key: impl Into<Arc<str>>, operation: F) -> Result<T, E>
    where
        F: Fn(ResilienceContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static,
    {
        self.execute_and_capture(operation_key, operation)
            .await
            .into_result()
    }
}

/// Builds an immutable [`Pipeline`] by appending strategies outermost-first.
///
/// Individual strategy crates (`resilience-retry`, `resilience-circuitbreaker`,
/// …) extend this builder with fluent `add_retry`/`add_circuit_breaker`/…
/// methods via extension traits, so this core crate never needs to depend
/// on any of them. [`PipelineBuilder::add`] is the one method every
/// strategy's extension trait is built on top of.
pub struct PipelineBuilder<T, E> {
    strategies: Vec<Arc<dyn Strategy<T, E>>>,
}

impl<T, E> Default for PipelineBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> PipelineBuilder<T, E> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy to the end of the chain built so far.
    pub fn add(mut self, strategy: Arc<dyn Strategy<T, E>>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Finalizes the builder into an immutable [`Pipeline`].
    pub fn build(self) -> Pipeline<T, E> {
        Pipeline {
            strategies: Arc::from(self.strategies),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CircuitState, PipelineRejection};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStrategy {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl<T: Send + 'static, E: Send + 'static> Strategy<T, E> for CountingStrategy {
        async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            next(ctx).await
        }
    }

    struct RejectingStrategy;

    #[async_trait::async_trait]
    impl<T: Send + 'static> Strategy<T, PipelineRejection> for RejectingStrategy {
        async fn execute_core(
            &self,
            _next: NextFn<T, PipelineRejection>,
            _ctx: ResilienceContext,
        ) -> Outcome<T, PipelineRejection> {
            Outcome::failure(PipelineRejection::CircuitBreakerRejected {
                state: CircuitState::Open,
            })
        }
    }

    #[tokio::test]
    async fn empty_pipeline_just_runs_the_operation() {
        let pipeline: Pipeline<i32, &str> = Pipeline::builder().build();
        let result = pipeline
            .execute("op", |_ctx| Box::pin(async { Ok(7) }))
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn strategies_run_outermost_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline: Pipeline<i32, &str> = Pipeline::builder()
            .add(Arc::new(CountingStrategy {
                calls: Arc::clone(&calls),
            }))
            .add(Arc::new(CountingStrategy {
                calls: Arc::clone(&calls),
            }))
            .build();

        let result = pipeline
            .execute("op", |_ctx| Box::pin(async { Ok(1) }))
            .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_rejecting_strategy_never_reaches_the_operation() {
        let reached = Arc::new(AtomicUsize::new(0));
        let reached_clone = Arc::clone(&reached);

        let pipeline: Pipeline<i32, PipelineRejection> =
            Pipeline::builder().add(Arc::new(RejectingStrategy)).build();

        let result = pipeline
            .execute("op", move |_ctx| {
                reached_clone.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(1) })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }
}
