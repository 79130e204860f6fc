//! Hedging strategy for the resilience pipeline.
//!
//! Reduces tail latency by dispatching redundant attempts of the same
//! call and returning whichever completes first. In the default "latency
//! mode" a hedge only fires after [`HedgeDelay::Fixed`] elapses with the
//! primary still pending; `no_delay()` switches to "parallel mode",
//! firing every attempt immediately. Losing attempts are signalled to
//! cancel via their own child [`resilience_core::CancellationSignal`] --
//! cooperative code downstream can observe this and stop early.
//!
//! ```
//! use resilience_core::{Pipeline, PipelineBuilder};
//! use resilience_hedge::{HedgeConfigBuilder, PipelineBuilderExt};
//! use std::time::Duration;
//!
//! let hedge = HedgeConfigBuilder::new()
//!     .delay(Duration::from_millis(50))
//!     .max_attempts(2)
//!     .build();
//!
//! let pipeline: Pipeline<String, String> = PipelineBuilder::new().add_hedge(hedge).build();
//! ```

mod config;
mod events;
mod strategy;

pub use config::{HedgeConfig, HedgeConfigBuilder, HedgeDelay};
pub use events::HedgeEvent;
pub use strategy::HedgeStrategy;

use resilience_core::pipeline::PipelineBuilder;
use std::sync::Arc;

/// Extends [`PipelineBuilder`] with `add_hedge`.
pub trait PipelineBuilderExt<T, E> {
    /// Appends a [`HedgeStrategy`] built from `config`.
    fn add_hedge(self, config: HedgeConfig<E>) -> PipelineBuilder<T, E>;
}

impl<T, E> PipelineBuilderExt<T, E> for PipelineBuilder<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    fn add_hedge(self, config: HedgeConfig<E>) -> PipelineBuilder<T, E> {
        self.add(Arc::new(HedgeStrategy::new(config)))
    }
}
