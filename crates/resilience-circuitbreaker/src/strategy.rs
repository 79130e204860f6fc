//! [`CircuitBreakerStrategy`]: rejects calls while the circuit is open.

use crate::circuit::{Circuit, Permission, Transition};
use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use resilience_core::context::ResilienceContext;
use resilience_core::error::{CircuitState, PipelineRejection};
use resilience_core::outcome::Outcome;
use resilience_core::strategy::{NextFn, Strategy};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A manual control handle for a running [`CircuitBreakerStrategy`]. Cloning
/// shares the same underlying circuit.
#[derive(Clone)]
pub struct CircuitBreakerControl {
    circuit: Arc<Circuit>,
}

impl CircuitBreakerControl {
    /// Forces the circuit into `Isolated`, rejecting every call until
    /// [`Self::close`] is called. Useful for maintenance windows.
    pub fn isolate(&self) {
        self.circuit.isolate();
    }

    /// Forces the circuit back to `Closed`, clearing its window.
    pub fn close(&self) {
        self.circuit.force_closed();
    }
}

/// A read-only handle for observing a running [`CircuitBreakerStrategy`]'s
/// state, independent of any [`CircuitBreakerControl`] held elsewhere.
#[derive(Clone)]
pub struct CircuitBreakerState {
    circuit: Arc<Circuit>,
}

impl CircuitBreakerState {
    /// The circuit's current state.
    pub fn state(&self) -> CircuitState {
        self.circuit.current_state()
    }

    /// A snapshot of the circuit's sliding-window counters.
    pub fn metrics(&self) -> crate::circuit::CircuitMetrics {
        self.circuit.metrics()
    }
}

/// Rejects calls while its circuit is Open or Isolated; permits a trial call
/// through while HalfOpen.
pub struct CircuitBreakerStrategy<T, E> {
    config: CircuitBreakerConfig<T, E>,
    circuit: Arc<Circuit>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> CircuitBreakerStrategy<T, E> {
    /// Builds a circuit breaker strategy from a finished
    /// [`CircuitBreakerConfig`].
    pub fn new(config: CircuitBreakerConfig<T, E>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "circuit_breaker_calls_total",
                "Total number of calls seen by a circuit breaker, by result"
            );
        });

        let circuit = Arc::new(Circuit::new(
            config.failure_rate_threshold,
            config.sliding_window_type,
            config.sliding_window_size,
            config.sliding_window_duration,
            config.minimum_number_of_calls,
            config.wait_duration_in_open,
            config.permitted_calls_in_half_open,
            config.slow_call_duration_threshold,
            config.slow_call_rate_threshold,
        ));

        Self {
            config,
            circuit,
            _marker: PhantomData,
        }
    }

    /// A manual control handle sharing this strategy's circuit.
    pub fn control(&self) -> CircuitBreakerControl {
        CircuitBreakerControl {
            circuit: Arc::clone(&self.circuit),
        }
    }

    /// A read-only state handle sharing this strategy's circuit.
    pub fn state_handle(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            circuit: Arc::clone(&self.circuit),
        }
    }

    fn emit_transition(&self, operation_key: &str, transition: Transition) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            circuit_breaker = %self.config.name,
            from = ?transition.from,
            to = ?transition.to,
            "circuit breaker state transition"
        );

        let event = CircuitBreakerEvent::StateTransition {
            operation_key: operation_key.to_string(),
            timestamp: Instant::now(),
            from_state: transition.from,
            to_state: transition.to,
        };
        self.config.event_listeners.emit(&event);
    }
}

#[async_trait::async_trait]
impl<T, E> Strategy<T, E> for CircuitBreakerStrategy<T, E>
where
    T: Send + Sync + 'static,
    E: From<PipelineRejection> + Send + Sync + 'static,
{
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
        let (permission, transition) = self.circuit.try_acquire();

        if let Some(transition) = transition {
            self.emit_transition(ctx.operation_key(), transition);
        }

        if permission == Permission::Rejected {
            let state = self.circuit.current_state();

            #[cfg(feature = "metrics")]
            counter!("circuit_breaker_calls_total", "circuit_breaker" => self.config.name.clone(), "result" => "rejected")
                .increment(1);

            let event = CircuitBreakerEvent::CallRejected {
                operation_key: ctx.operation_key().to_string(),
                timestamp: Instant::now(),
                state,
            };
            self.config.event_listeners.emit(&event);

            return Outcome::failure(PipelineRejection::CircuitBreakerRejected { state }.into());
        }

        let event = CircuitBreakerEvent::CallPermitted {
            operation_key: ctx.operation_key().to_string(),
            timestamp: Instant::now(),
            state: self.circuit.current_state(),
        };
        self.config.event_listeners.emit(&event);

        let started_at = Instant::now();
        let outcome = next(ctx.clone()).await;
        let elapsed = started_at.elapsed();

        let is_failure = (self.config.failure_classifier)(&outcome);
        let (is_slow, transition) = self.circuit.record(is_failure, elapsed);

        if is_slow {
            let event = CircuitBreakerEvent::SlowCallDetected {
                operation_key: ctx.operation_key().to_string(),
                timestamp: Instant::now(),
                duration: elapsed,
                state: self.circuit.current_state(),
            };
            self.config.event_listeners.emit(&event);
        }

        if let Some(transition) = transition {
            self.emit_transition(ctx.operation_key(), transition);
        }

        #[cfg(feature = "metrics")]
        counter!("circuit_breaker_calls_total", "circuit_breaker" => self.config.name.clone(), "result" => if is_failure { "failure" } else { "success" })
            .increment(1);

        let event = if is_failure {
            CircuitBreakerEvent::FailureRecorded {
                operation_key: ctx.operation_key().to_string(),
                timestamp: Instant::now(),
                state: self.circuit.current_state(),
            }
        } else {
            CircuitBreakerEvent::SuccessRecorded {
                operation_key: ctx.operation_key().to_string(),
                timestamp: Instant::now(),
                state: self.circuit.current_state(),
            }
        };
        self.config.event_listeners.emit(&event);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfigBuilder;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Upstream,
        Rejected(PipelineRejection),
    }

    impl From<PipelineRejection> for TestError {
        fn from(rejection: PipelineRejection) -> Self {
            TestError::Rejected(rejection)
        }
    }

    fn always_failing() -> NextFn<i32, TestError> {
        Arc::new(|_ctx| Box::pin(async { Outcome::failure(TestError::Upstream) }) as BoxFuture<'static, Outcome<i32, TestError>>)
    }

    fn always_succeeding(calls: Arc<AtomicUsize>) -> NextFn<i32, TestError> {
        Arc::new(move |_ctx| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Outcome::success(1)
            })
        })
    }

    #[tokio::test]
    async fn opens_after_the_failure_threshold_and_rejects_subsequently() {
        let config: CircuitBreakerConfig<i32, TestError> = CircuitBreakerConfigBuilder::new()
            .failure_rate_threshold(0.5)
            .minimum_number_of_calls(2)
            .sliding_window_size(2)
            .wait_duration_in_open(Duration::from_secs(30))
            .build();
        let strategy = CircuitBreakerStrategy::new(config);

        for _ in 0..2 {
            strategy
                .execute_core(always_failing(), ResilienceContext::new("op"))
                .await;
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = strategy
            .execute_core(always_succeeding(Arc::clone(&calls)), ResilienceContext::new("op"))
            .await;

        assert!(matches!(
            outcome,
            Outcome::Failure {
                error: TestError::Rejected(PipelineRejection::CircuitBreakerRejected { .. }),
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn control_handle_can_isolate_and_close() {
        let config: CircuitBreakerConfig<i32, TestError> =
            CircuitBreakerConfigBuilder::new().build();
        let strategy = CircuitBreakerStrategy::new(config);
        let control = strategy.control();
        let state = strategy.state_handle();

        control.isolate();
        assert_eq!(state.state(), CircuitState::Isolated);

        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = strategy
            .execute_core(always_succeeding(Arc::clone(&calls)), ResilienceContext::new("op"))
            .await;
        assert!(outcome.is_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        control.close();
        assert_eq!(state.state(), CircuitState::Closed);

        let outcome = strategy
            .execute_core(always_succeeding(Arc::clone(&calls)), ResilienceContext::new("op"))
            .await;
        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
