//! A composable pipeline of resilience strategies for asynchronous Rust.
//!
//! `resilience` wraps a fallible async operation in an ordered stack of
//! strategies — retry, circuit breaker, timeout, fallback, rate limiter,
//! hedging, cache — each of which observes the call's [`Outcome`] and may
//! retry it, substitute it, reject it outright, or let it through
//! unchanged. The wiring that makes this possible ([`Pipeline`],
//! [`PipelineBuilder`], [`ResilienceContext`], the [`Strategy`] trait) lives
//! in [`resilience_core`] and is always available; every strategy is its
//! own crate, pulled in here behind a feature flag of the same name.
//!
//! # Quick start
//!
//! ```toml
//! [dependencies]
//! resilience = { version = "0.1", features = ["retry", "circuitbreaker"] }
//! ```
//!
//! ```
//! use resilience::core::{Pipeline, PipelineBuilder};
//! use resilience::retry::{PipelineBuilderExt as _, RetryConfigBuilder};
//! use resilience::circuitbreaker::{PipelineBuilderExt as _, CircuitBreakerConfigBuilder};
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone)]
//! struct AppError;
//!
//! impl From<resilience::core::PipelineRejection> for AppError {
//!     fn from(_: resilience::core::PipelineRejection) -> Self {
//!         AppError
//!     }
//! }
//!
//! # async fn run() {
//! let retry = RetryConfigBuilder::new()
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(50), 2.0)
//!     .build();
//!
//! let breaker = CircuitBreakerConfigBuilder::new()
//!     .failure_rate_threshold(0.5)
//!     .minimum_number_of_calls(10)
//!     .build();
//!
//! let pipeline: Pipeline<String, AppError> = PipelineBuilder::new()
//!     .add_retry(retry)
//!     .add_circuit_breaker(breaker)
//!     .build();
//!
//! let result = pipeline
//!     .execute("fetch-user", |_ctx| Box::pin(async { Ok("ok".to_string()) }))
//!     .await;
//! # let _ = result;
//! # }
//! ```
//!
//! # Composition order
//!
//! Strategies nest outermost-first in the order they are `add_*`-ed: the
//! first one added is the outermost wrapper and sees every call (including
//! ones it triggers itself, like a retry loop), the last one sits closest
//! to your own operation. `add_retry(..).add_circuit_breaker(..)` retries
//! *around* the breaker — a single logical call can still drive several
//! attempts against it — which is almost always what you want; reversing
//! the order would have the breaker open or close around a whole retry
//! loop's worth of attempts bundled into one sample.
//!
//! # Strategies
//!
//! | Feature | Crate | Behavior |
//! |---|---|---|
//! | `retry` | [`resilience_retry`] | Re-run a failed call with constant/linear/exponential backoff, optional jitter |
//! | `circuitbreaker` | [`resilience_circuitbreaker`] | Stop calling a downstream that is failing past a threshold, recovering through a half-open probe |
//! | `timeout` | [`resilience_timeout`] | Bound how long a call may run; signals cooperative cancellation on expiry |
//! | `fallback` | [`resilience_fallback`] | Substitute a value or alternate call for a handled failure |
//! | `ratelimiter` | [`resilience_ratelimiter`] | Admit calls under a fixed window, sliding window, token bucket, or concurrency (bulkhead) limit |
//! | `hedge` | [`resilience_hedge`] | Race redundant attempts to cut tail latency, cancelling the losers |
//! | `cache` | [`resilience_cache`] | Cache-aside a successful result behind a pluggable provider |
//!
//! None of these depend on each other or on this crate — each is usable
//! standalone. This crate exists purely to re-export them under one
//! dependency and one feature gate per pattern, the way [`resilience_core`]'s
//! own doc comment describes: strategy crates each extend
//! [`PipelineBuilder`] with their own `add_*` method via an extension
//! trait, so composing them never requires `resilience-retry` to know
//! `resilience-circuitbreaker` exists.
//!
//! # What this crate does not do
//!
//! It does not impose a transport (HTTP, gRPC, database driver — you
//! supply the operation), does not persist state across process restarts,
//! and does not coordinate rate limits or circuit state across processes.
//! Failure classification (`should_handle`, `should_cache`, …) is always
//! caller-supplied; the core has no opinion about which errors are
//! transient.

#[doc(inline)]
pub use resilience_core as core;

#[cfg(feature = "retry")]
#[doc(inline)]
pub use resilience_retry as retry;

#[cfg(feature = "circuitbreaker")]
#[doc(inline)]
pub use resilience_circuitbreaker as circuitbreaker;

#[cfg(feature = "timeout")]
#[doc(inline)]
pub use resilience_timeout as timeout;

#[cfg(feature = "fallback")]
#[doc(inline)]
pub use resilience_fallback as fallback;

#[cfg(feature = "ratelimiter")]
#[doc(inline)]
pub use resilience_ratelimiter as ratelimiter;

#[cfg(feature = "hedge")]
#[doc(inline)]
pub use resilience_hedge as hedge;

#[cfg(feature = "cache")]
#[doc(inline)]
pub use resilience_cache as cache;

/// Re-exports the core substrate and every enabled strategy's extension
/// trait, so `use resilience::prelude::*;` is enough to start chaining
/// `add_*` calls on a [`PipelineBuilder`] without hunting down which crate
/// each trait lives in.
pub mod prelude {
    pub use resilience_core::{
        CancellationSignal, Outcome, Pipeline, PipelineBuilder, PipelineRejection,
        PropertyBag, ResilienceContext, ResilienceError,
    };

    #[cfg(feature = "retry")]
    pub use resilience_retry::PipelineBuilderExt as _;

    #[cfg(feature = "circuitbreaker")]
    pub use resilience_circuitbreaker::PipelineBuilderExt as _;

    #[cfg(feature = "timeout")]
    pub use resilience_timeout::PipelineBuilderExt as _;

    #[cfg(feature = "fallback")]
    pub use resilience_fallback::PipelineBuilderExt as _;

    #[cfg(feature = "ratelimiter")]
    pub use resilience_ratelimiter::PipelineBuilderExt as _;

    #[cfg(feature = "hedge")]
    pub use resilience_hedge::PipelineBuilderExt as _;

    #[cfg(feature = "cache")]
    pub use resilience_cache::PipelineBuilderExt as _;
}
