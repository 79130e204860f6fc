//! End-to-end scenarios exercising the circuit breaker, hedge and
//! concurrency-limiting rate limiter strategies against a real
//! `Pipeline`.

use resilience_circuitbreaker::{CircuitBreakerConfigBuilder, CircuitBreakerStrategy, PipelineBuilderExt as _};
use resilience_core::{CircuitState, Pipeline, PipelineBuilder, PipelineRejection};
use resilience_hedge::{HedgeConfigBuilder, PipelineBuilderExt as _};
use resilience_ratelimiter::{PipelineBuilderExt as _, RateLimiterConfigBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum AppError {
    Upstream,
    Rejected(PipelineRejection),
}

impl From<PipelineRejection> for AppError {
    fn from(rejection: PipelineRejection) -> Self {
        AppError::Rejected(rejection)
    }
}

impl PartialEq for AppError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AppError::Upstream, AppError::Upstream) => true,
            (AppError::Rejected(a), AppError::Rejected(b)) => format!("{a}") == format!("{b}"),
            _ => false,
        }
    }
}

/// E2 — breaker trips: failure_rate_threshold=0.5, minimum_number_of_calls=4,
/// wait_duration_in_open=100ms. Sequence fail, fail, succeed, fail (ratio
/// 3/4 >= 0.5) opens the circuit on the 4th call; call 5 is rejected
/// without invoking the callback; after the wait elapses a HalfOpen probe
/// is admitted and closes the circuit again on success.
#[tokio::test]
async fn breaker_trips_then_recovers_through_half_open() {
    let config: resilience_circuitbreaker::CircuitBreakerConfig<i32, AppError> = CircuitBreakerConfigBuilder::new()
        .failure_rate_threshold(0.5)
        .sliding_window_size(4)
        .minimum_number_of_calls(4)
        .wait_duration_in_open(Duration::from_millis(100))
        .build();
    let breaker = CircuitBreakerStrategy::new(config);
    let state = breaker.state_handle();

    let pipeline: Pipeline<i32, AppError> = PipelineBuilder::new().add(Arc::new(breaker)).build();

    let outcomes = [Err(AppError::Upstream), Err(AppError::Upstream), Ok(1), Err(AppError::Upstream)];
    for outcome in outcomes {
        let expected = outcome.clone();
        let result = pipeline
            .execute("op", move |_ctx| {
                let outcome = outcome.clone();
                Box::pin(async move { outcome })
            })
            .await;
        assert_eq!(result, expected);
    }

    assert_eq!(state.state(), CircuitState::Open);

    let callback_invoked = Arc::new(AtomicUsize::new(0));
    let callback_clone = Arc::clone(&callback_invoked);
    let result = pipeline
        .execute("op", move |_ctx| {
            callback_clone.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(1) })
        })
        .await;
    assert!(matches!(
        result,
        Err(AppError::Rejected(PipelineRejection::CircuitBreakerRejected { .. }))
    ));
    assert_eq!(callback_invoked.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(120)).await;

    let result = pipeline.execute("op", |_ctx| Box::pin(async { Ok(7) })).await;
    assert_eq!(result, Ok(7));
    assert_eq!(state.state(), CircuitState::Closed);
}

/// E4 — hedging races: the primary is slow, a single hedge fires after the
/// configured delay and wins; the loser is never awaited to completion by
/// the caller and only the winning attempt's value is returned.
#[tokio::test]
async fn a_hedge_wins_the_race_against_a_slow_primary() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = Arc::clone(&attempts);

    let hedge = HedgeConfigBuilder::new()
        .delay(Duration::from_millis(20))
        .max_attempts(3)
        .build();

    let pipeline: Pipeline<&'static str, AppError> = PipelineBuilder::new().add_hedge(hedge).build();

    let start = std::time::Instant::now();
    let result = pipeline
        .execute("op", move |_ctx| {
            let attempt = attempts_clone.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if attempt == 0 {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok("primary")
                } else {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok("hedge")
                }
            })
        })
        .await;

    let elapsed = start.elapsed();
    assert_eq!(result, Ok("hedge"));
    // The hedge fired at ~20ms and took ~10ms to complete: well under the
    // primary's 100ms.
    assert!(elapsed < Duration::from_millis(80), "elapsed = {elapsed:?}");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// E5 — concurrency bulkhead: `permit_limit` calls run at once, up to
/// `queue_limit` more wait in FIFO order, and the caller beyond
/// `permit_limit + queue_limit` is rejected synchronously.
#[tokio::test]
async fn concurrency_limiter_admits_n_queues_q_and_rejects_the_rest() {
    let limiter = RateLimiterConfigBuilder::new()
        .max_concurrent_calls(2)
        .queue_limit(1)
        .max_wait_duration(Duration::from_secs(1))
        .build();

    let pipeline: Pipeline<(), AppError> = PipelineBuilder::new().add_rate_limiter(limiter).build();
    let pipeline = Arc::new(pipeline);

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let pipeline = Arc::clone(&pipeline);
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            pipeline
                .execute("op", move |_ctx| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    Box::pin(async move {
                        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(current, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<(), AppError>(())
                    })
                })
                .await
        }));
    }

    // Give the first two calls time to claim both permits and the third to
    // take the one spare queue slot before the fourth, rejected, caller
    // shows up.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let rejected = pipeline.execute("op", |_ctx| Box::pin(async { Ok(()) })).await;
    assert!(matches!(
        rejected,
        Err(AppError::Rejected(PipelineRejection::RateLimiterRejected { .. }))
    ));

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok(()));
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

/// A concurrency limiter with no spare wait budget rejects a call once
/// every permit is held rather than queuing it indefinitely.
#[tokio::test]
async fn concurrency_limiter_rejects_synchronously_once_saturated() {
    let limiter = RateLimiterConfigBuilder::new()
        .max_concurrent_calls(1)
        .max_wait_duration(Duration::ZERO)
        .build();

    let pipeline: Pipeline<(), AppError> = PipelineBuilder::new().add_rate_limiter(limiter).build();
    let pipeline = Arc::new(pipeline);

    let holder = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            pipeline
                .execute("op", |_ctx| {
                    Box::pin(async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<(), AppError>(())
                    })
                })
                .await
        })
    };

    // Give the holder time to acquire the only permit before the second
    // call is attempted.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = pipeline.execute("op", |_ctx| Box::pin(async { Ok(()) })).await;
    assert!(matches!(
        result,
        Err(AppError::Rejected(PipelineRejection::RateLimiterRejected { .. }))
    ));

    assert_eq!(holder.await.unwrap(), Ok(()));
}
