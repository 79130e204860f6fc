//! Circuit breaker strategy for the resilience pipeline.
//!
//! Tracks a sliding window of recent outcomes (and, optionally, call
//! latency) and opens once the failure rate, or the slow-call rate,
//! crosses a configured threshold -- rejecting calls outright until a wait
//! period has elapsed, at which point a small number of trial calls are
//! allowed through (`HalfOpen`) to decide whether to close again. A circuit
//! can also be forced into a fourth, manual-only `Isolated` state via
//! [`CircuitBreakerControl`], independent of the sliding window.
//!
//! ```
//! use resilience_core::{Pipeline, PipelineBuilder};
//! use resilience_circuitbreaker::{CircuitBreakerConfigBuilder, PipelineBuilderExt};
//!
//! # #[derive(Debug, Clone)]
//! # struct AppError;
//! # impl From<resilience_core::PipelineRejection> for AppError {
//! #     fn from(_: resilience_core::PipelineRejection) -> Self { AppError }
//! # }
//! let breaker = CircuitBreakerConfigBuilder::new()
//!     .name("payments")
//!     .failure_rate_threshold(0.5)
//!     .minimum_number_of_calls(10)
//!     .build();
//!
//! let pipeline: Pipeline<String, AppError> =
//!     PipelineBuilder::new().add_circuit_breaker(breaker).build();
//! ```

pub mod circuit;
mod config;
mod events;
mod strategy;

pub use circuit::{CircuitMetrics, Permission, Transition};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, FailureClassifierFn, SlidingWindowType};
pub use events::CircuitBreakerEvent;
pub use strategy::{CircuitBreakerControl, CircuitBreakerState, CircuitBreakerStrategy};

use resilience_core::error::PipelineRejection;
use resilience_core::pipeline::PipelineBuilder;
use std::sync::Arc;

/// Extends [`PipelineBuilder`] with `add_circuit_breaker`.
pub trait PipelineBuilderExt<T, E> {
    /// Appends a [`CircuitBreakerStrategy`] built from `config`.
    fn add_circuit_breaker(self, config: CircuitBreakerConfig<T, E>) -> PipelineBuilder<T, E>;
}

impl<T, E> PipelineBuilderExt<T, E> for PipelineBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: From<PipelineRejection> + Send + Sync + 'static,
{
    fn add_circuit_breaker(self, config: CircuitBreakerConfig<T, E>) -> PipelineBuilder<T, E> {
        self.add(Arc::new(CircuitBreakerStrategy::new(config)))
    }
}
