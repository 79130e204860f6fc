//! Timeout strategy for the resilience pipeline.
//!
//! Bounds how long a call may run, either with a fixed duration or one
//! computed per call from the [`resilience_core::ResilienceContext`].
//! When the deadline passes, the context's cancellation signal is set (see
//! [`crate::config::TimeoutConfigBuilder::cancel_on_timeout`]) so any
//! cooperative strategy or operation downstream can stop early, and the
//! pipeline observes [`resilience_core::PipelineRejection::TimeoutRejected`].
//!
//! ```
//! use resilience_core::{Pipeline, PipelineBuilder};
//! use resilience_timeout::{PipelineBuilderExt, TimeoutConfigBuilder};
//! use std::time::Duration;
//!
//! # #[derive(Debug, Clone)]
//! # struct AppError;
//! # impl From<resilience_core::PipelineRejection> for AppError {
//! #     fn from(_: resilience_core::PipelineRejection) -> Self { AppError }
//! # }
//! let timeout = TimeoutConfigBuilder::new()
//!     .timeout_duration(Duration::from_secs(2))
//!     .build();
//!
//! let pipeline: Pipeline<String, AppError> = PipelineBuilder::new().add_timeout(timeout).build();
//! ```

mod config;
mod events;
mod strategy;

pub use config::{TimeoutConfig, TimeoutConfigBuilder, TimeoutSource};
pub use events::TimeoutEvent;
pub use strategy::TimeoutStrategy;

use resilience_core::error::PipelineRejection;
use resilience_core::pipeline::PipelineBuilder;
use std::sync::Arc;

/// Extends [`PipelineBuilder`] with `add_timeout`.
pub trait PipelineBuilderExt<T, E> {
    /// Appends a [`TimeoutStrategy`] built from `config`.
    fn add_timeout(self, config: TimeoutConfig) -> PipelineBuilder<T, E>;
}

impl<T, E> PipelineBuilderExt<T, E> for PipelineBuilder<T, E>
where
    T: Send + 'static,
    E: From<PipelineRejection> + Send + Sync + 'static,
{
    fn add_timeout(self, config: TimeoutConfig) -> PipelineBuilder<T, E> {
        self.add(Arc::new(TimeoutStrategy::new(config)))
    }
}
