//! Retry strategy for the resilience pipeline.
//!
//! Retries a failed call using a configurable [`BackoffStrategy`]
//! (constant, linear, exponential, or a custom delay generator), with
//! optional jitter and a `max_delay` clamp. See [`RetryConfigBuilder`] for
//! the full set of knobs. An optional [`RetryBudget`] can cap total
//! retries shared across every call through one strategy instance,
//! independent of each call's own `max_attempts`.
//!
//! ```
//! use resilience_core::{Pipeline, PipelineBuilder};
//! use resilience_retry::{PipelineBuilderExt, RetryConfigBuilder};
//! use std::time::Duration;
//!
//! # #[derive(Debug, Clone)]
//! # struct AppError;
//! # impl From<resilience_core::PipelineRejection> for AppError {
//! #     fn from(_: resilience_core::PipelineRejection) -> Self { AppError }
//! # }
//! let retry = RetryConfigBuilder::new()
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(50), 2.0)
//!     .jitter(true)
//!     .build();
//!
//! let pipeline: Pipeline<String, AppError> = PipelineBuilder::new().add_retry(retry).build();
//! ```

mod backoff;
pub mod budget;
mod config;
mod events;
mod strategy;

pub use backoff::BackoffStrategy;
pub use budget::{AimdBudget, RetryBudget, RetryBudgetBuilder, TokenBucketBudget};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use strategy::RetryStrategy;

use resilience_core::error::PipelineRejection;
use resilience_core::pipeline::PipelineBuilder;
use std::sync::Arc;

/// Extends [`PipelineBuilder`] with `add_retry`, so retry composes with
/// every other strategy crate's own extension trait without this crate (or
/// `resilience-core`) needing to know the others exist.
pub trait PipelineBuilderExt<T, E> {
    /// Appends a [`RetryStrategy`] built from `config`.
    fn add_retry(self, config: RetryConfig<E>) -> PipelineBuilder<T, E>;
}

impl<T, E> PipelineBuilderExt<T, E> for PipelineBuilder<T, E>
where
    T: Send + 'static,
    E: From<PipelineRejection> + Clone + Send + Sync + 'static,
{
    fn add_retry(self, config: RetryConfig<E>) -> PipelineBuilder<T, E> {
        self.add(Arc::new(RetryStrategy::new(config)))
    }
}
