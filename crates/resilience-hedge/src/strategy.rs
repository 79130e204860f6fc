//! [`HedgeStrategy`]: fires redundant attempts to cut tail latency.

use crate::config::HedgeConfig;
use crate::events::HedgeEvent;
use resilience_core::context::ResilienceContext;
use resilience_core::outcome::Outcome;
use resilience_core::strategy::{NextFn, Strategy};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

fn spawn_attempt<T, E>(
    attempt: usize,
    next: NextFn<T, E>,
    ctx: ResilienceContext,
    tx: mpsc::Sender<(usize, Outcome<T, E>)>,
) where
    T: Send + 'static,
    E: Send + 'static,
{
    tokio::spawn(async move {
        let outcome = next(ctx).await;
        let _ = tx.send((attempt, outcome)).await;
    });
}

/// Dispatches the primary attempt immediately and, per
/// [`crate::config::HedgeDelay`], fires up to `max_attempts - 1` further
/// redundant attempts if the primary has not yet returned. Whichever
/// attempt succeeds first wins; the rest are signalled to cancel via their
/// own child [`resilience_core::CancellationSignal`].
pub struct HedgeStrategy<E> {
    config: HedgeConfig<E>,
}

impl<E> HedgeStrategy<E> {
    /// Builds a hedge strategy from a finished [`HedgeConfig`].
    pub fn new(config: HedgeConfig<E>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "hedge_attempts_total",
                "Total number of attempts dispatched by a hedge strategy"
            );
        });

        Self { config }
    }
}

#[async_trait::async_trait]
impl<T, E> Strategy<T, E> for HedgeStrategy<E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
        let max_attempts = self.config.max_attempts;

        if max_attempts <= 1 {
            return next(ctx).await;
        }

        let (tx, mut rx) = mpsc::channel::<(usize, Outcome<T, E>)>(max_attempts);
        let mut attempt_ctxs: Vec<ResilienceContext> = Vec::with_capacity(max_attempts);
        let start = Instant::now();

        let primary_ctx = ctx.with_child_cancellation();
        attempt_ctxs.push(primary_ctx.clone());

        #[cfg(feature = "metrics")]
        counter!("hedge_attempts_total", "hedge" => self.config.name.clone(), "kind" => "primary")
            .increment(1);

        self.config.event_listeners.emit(&HedgeEvent::PrimaryStarted {
            operation_key: ctx.operation_key().to_string(),
            timestamp: Instant::now(),
        });

        spawn_attempt(0, Arc::clone(&next), primary_ctx, tx.clone());

        let mut dispatched = 1usize;
        let mut received = 0usize;

        let first_delay = self.config.delay.delay_for(1);
        let sleep = tokio::time::sleep(first_delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;

                Some((attempt, outcome)) = rx.recv() => {
                    received += 1;

                    match outcome {
                        Outcome::Success(value) => {
                            for (i, other_ctx) in attempt_ctxs.iter().enumerate() {
                                if i != attempt {
                                    other_ctx.cancellation().cancel();
                                }
                            }

                            let duration = start.elapsed();
                            let event = if attempt == 0 {
                                HedgeEvent::PrimarySucceeded {
                                    operation_key: ctx.operation_key().to_string(),
                                    timestamp: Instant::now(),
                                    duration,
                                    hedges_cancelled: dispatched - 1,
                                }
                            } else {
                                HedgeEvent::HedgeSucceeded {
                                    operation_key: ctx.operation_key().to_string(),
                                    timestamp: Instant::now(),
                                    attempt,
                                    duration,
                                }
                            };
                            self.config.event_listeners.emit(&event);

                            return Outcome::Success(value);
                        }
                        Outcome::Failure { error, trace } => {
                            if received >= dispatched && dispatched >= max_attempts {
                                self.config.event_listeners.emit(&HedgeEvent::AllFailed {
                                    operation_key: ctx.operation_key().to_string(),
                                    timestamp: Instant::now(),
                                    attempts: dispatched,
                                });
                                return Outcome::Failure { error, trace };
                            }
                        }
                    }
                }

                () = &mut sleep, if dispatched < max_attempts => {
                    dispatched += 1;
                    let attempt_num = dispatched - 1;
                    let delay = self.config.delay.delay_for(attempt_num);

                    let hedge_ctx = ctx.with_child_cancellation();
                    attempt_ctxs.push(hedge_ctx.clone());

                    #[cfg(feature = "metrics")]
                    counter!("hedge_attempts_total", "hedge" => self.config.name.clone(), "kind" => "hedge")
                        .increment(1);

                    self.config.event_listeners.emit(&HedgeEvent::HedgeStarted {
                        operation_key: ctx.operation_key().to_string(),
                        timestamp: Instant::now(),
                        attempt: attempt_num,
                        delay,
                    });

                    spawn_attempt(attempt_num, Arc::clone(&next), hedge_ctx, tx.clone());

                    if dispatched < max_attempts {
                        let next_delay = self.config.delay.delay_for(attempt_num + 1);
                        sleep.as_mut().reset(tokio::time::Instant::now() + next_delay);
                    }
                }
            }
        }
    }
}
