//! Core substrate shared by every resilience strategy: [`Outcome`],
//! [`ResilienceContext`], [`Strategy`] and [`Pipeline`].
//!
//! Strategy crates (`resilience-retry`, `resilience-circuitbreaker`, …)
//! each depend on this crate and extend [`PipelineBuilder`] with their own
//! fluent `add_*` method via an extension trait, rather than this crate
//! depending on them — see the `resilience` umbrella crate for the
//! combined builder surface.

pub mod cancellation;
pub mod context;
pub mod error;
pub mod events;
pub mod outcome;
pub mod pipeline;
pub mod strategy;

pub use cancellation::CancellationSignal;
pub use context::{PropertyBag, ResilienceContext};
pub use error::{CircuitState, PipelineRejection, RateLimiterRejectionReason, ResilienceError};
pub use outcome::{CallStackSnapshot, Outcome};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use strategy::{NextFn, Strategy};
