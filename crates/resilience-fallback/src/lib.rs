//! Fallback strategy for the resilience pipeline.
//!
//! Catches a failure accepted by an optional `should_handle` predicate and
//! substitutes the result of a `fallback_action` -- a fixed value, or an
//! arbitrary function of the original error and the call's
//! [`resilience_core::ResilienceContext`].
//!
//! ```
//! use resilience_core::{Pipeline, PipelineBuilder};
//! use resilience_fallback::{FallbackConfigBuilder, PipelineBuilderExt};
//!
//! let fallback = FallbackConfigBuilder::new()
//!     .fallback_value("cached response".to_string())
//!     .build();
//!
//! let pipeline: Pipeline<String, String> =
//!     PipelineBuilder::new().add_fallback(fallback).build();
//! ```

mod config;
mod events;
mod strategy;

pub use config::{FallbackActionFn, FallbackConfig, FallbackConfigBuilder, ShouldHandleFn};
pub use events::FallbackEvent;
pub use strategy::FallbackStrategy;

use resilience_core::pipeline::PipelineBuilder;
use std::sync::Arc;

/// Extends [`PipelineBuilder`] with `add_fallback`.
pub trait PipelineBuilderExt<T, E> {
    /// Appends a [`FallbackStrategy`] built from `config`.
    fn add_fallback(self, config: FallbackConfig<T, E>) -> PipelineBuilder<T, E>;
}

impl<T, E> PipelineBuilderExt<T, E> for PipelineBuilder<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn add_fallback(self, config: FallbackConfig<T, E>) -> PipelineBuilder<T, E> {
        self.add(Arc::new(FallbackStrategy::new(config)))
    }
}
