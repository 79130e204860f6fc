//! Rate limiter strategy for the resilience pipeline.
//!
//! Admits calls under a configured rate limit -- fixed window, sliding
//! log, sliding counter, or token bucket -- or, in concurrency-limiting
//! mode, bounds the number of calls in flight at once (a bulkhead).
//!
//! ```
//! use resilience_core::{Pipeline, PipelineBuilder};
//! use resilience_ratelimiter::{PipelineBuilderExt, RateLimiterConfigBuilder};
//! use std::time::Duration;
//!
//! # #[derive(Debug, Clone)]
//! # struct AppError;
//! # impl From<resilience_core::PipelineRejection> for AppError {
//! #     fn from(_: resilience_core::PipelineRejection) -> Self { AppError }
//! # }
//! let limiter = RateLimiterConfigBuilder::new()
//!     .limit_for_period(100)
//!     .refresh_period(Duration::from_secs(1))
//!     .build();
//!
//! let pipeline: Pipeline<String, AppError> =
//!     PipelineBuilder::new().add_rate_limiter(limiter).build();
//! ```

mod config;
mod error;
mod events;
mod limiter;
mod strategy;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use limiter::WindowType;
pub use strategy::RateLimiterStrategy;

use resilience_core::error::PipelineRejection;
use resilience_core::pipeline::PipelineBuilder;
use std::sync::Arc;

/// Extends [`PipelineBuilder`] with `add_rate_limiter`.
pub trait PipelineBuilderExt<T, E> {
    /// Appends a [`RateLimiterStrategy`] built from `config`.
    fn add_rate_limiter(self, config: RateLimiterConfig) -> PipelineBuilder<T, E>;
}

impl<T, E> PipelineBuilderExt<T, E> for PipelineBuilder<T, E>
where
    T: Send + 'static,
    E: From<PipelineRejection> + Send + Sync + 'static,
{
    fn add_rate_limiter(self, config: RateLimiterConfig) -> PipelineBuilder<T, E> {
        self.add(Arc::new(RateLimiterStrategy::new(config)))
    }
}
