//! [`TimeoutStrategy`]: bounds how long a call may run.

use crate::config::TimeoutConfig;
use crate::events::TimeoutEvent;
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

/// Races the wrapped call against a deadline, rejecting with
/// [`PipelineRejection::TimeoutRejected`] if the deadline passes first.
pub struct TimeoutStrategy {
    config: TimeoutConfig,
}

impl TimeoutStrategy {
    /// Builds a timeout strategy from a finished [`TimeoutConfig`].
    pub fn new(config: TimeoutConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "timeout_calls_total",
                "Total number of calls seen by a timeout strategy, by result"
            );
        });

        Self { config }
    }
}

#[async_trait::async_trait]
impl<T, E> Strategy<T, E> for TimeoutStrategy
where
    T: Send + 'static,
    E: From<PipelineRejection> + Send + Sync + 'static,
{
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E> {
        let duration = self.config.timeout_source.duration_for(&ctx);
        let started_at = Instant::now();

        tokio::select! {
            outcome = next(ctx.clone()) => {
                let elapsed = started_at.elapsed();

                #[cfg(feature = "metrics")]
                counter!("timeout_calls_total", "timeout" => self.config.name.clone(), "result" => if outcome.is_success() { "success" } else { "failed" })
                    .increment(1);

                let event = if outcome.is_success() {
                    TimeoutEvent::Success {
                        operation_key: ctx.operation_key().to_string(),
                        timestamp: Instant::now(),
                        duration: elapsed,
                    }
                } else {
                    TimeoutEvent::Failed {
                        operation_key: ctx.operation_key().to_string(),
                        timestamp: Instant::now(),
                        duration: elapsed,
                    }
                };
                self.config.event_listeners.emit(&event);

                outcome
            }
            _ = tokio::time::sleep(duration) => {
                if self.config.cancel_on_timeout {
                    ctx.cancellation().cancel();
                }

                #[cfg(feature = "tracing")]
                tracing::warn!(timeout = %self.config.name, ?duration, "call exceeded deadline");

                #[cfg(feature = "metrics")]
                counter!("timeout_calls_total", "timeout" => self.config.name.clone(), "result" => "timed_out")
                    .increment(1);

                let event = TimeoutEvent::TimedOut {
                    operation_key: ctx.operation_key().to_string(),
                    timestamp: Instant::now(),
                    timeout: duration,
                };
                self.config.event_listeners.emit(&event);

                Outcome::failure(PipelineRejection::TimeoutRejected { timeout: duration }.into())
            }
        }
    }
}
