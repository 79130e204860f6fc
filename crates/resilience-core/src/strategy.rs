//! The [`Strategy`] trait: the single extension point every resilience
//! pattern implements.

use crate::context::ResilienceContext;
use crate::outcome::Outcome;
use futures::future::BoxFuture;
use std::sync::Arc;

/// The callback a [`Strategy`] invokes to reach the next strategy in the
/// pipeline (or, for the innermost strategy, the user's own operation).
pub type NextFn<T, E> =
    Arc<dyn Fn(ResilienceContext) -> BoxFuture<'static, Outcome<T, E>> + Send + Sync>;

/// A single resilience pattern.
///
/// A strategy composes purely by delegation: it may inspect the context,
/// decide not to call `next` at all (a rejecting strategy like the circuit
/// breaker or rate limiter), call `next` exactly once (timeout, fallback),
/// or call `next` more than once (retry, hedging). It never needs to know
/// what strategies, if any, sit inside or outside it.
#[async_trait::async_trait]
pub trait Strategy<T, E>: Send + Sync
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Runs this strategy's logic, calling `next` zero or more times.
    async fn execute_core(&self, next: NextFn<T, E>, ctx: ResilienceContext) -> Outcome<T, E>;
}
