//! Shared error taxonomy.
//!
//! [`PipelineRejection`] is the single, non-generic enum every *rejecting*
//! built-in strategy (circuit breaker, timeout, rate limiter) synthesizes
//! instead of calling the wrapped operation. Application code chooses how
//! its own error type `E` absorbs a rejection by implementing
//! `From<PipelineRejection> for E` — or by using the ready-made
//! [`ResilienceError<E>`] wrapper below, which does this for you.

use std::fmt;
use std::time::Duration;

/// The lifecycle state of a circuit breaker.
///
/// Lives here, rather than in `resilience-circuitbreaker`, purely so that
/// [`PipelineRejection::CircuitBreakerRejected`] can reference it without
/// introducing a dependency cycle between the circuit breaker crate and
/// this shared error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls pass through; failures are recorded against the window.
    Closed,
    /// Calls are rejected without reaching the wrapped operation.
    Open,
    /// A single trial call is permitted to decide whether to re-close.
    HalfOpen,
    /// Manually forced open; ignores the window entirely until manually
    /// closed again.
    Isolated,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
            CircuitState::Isolated => write!(f, "isolated"),
        }
    }
}

/// Why a rate limiter rejected a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimiterRejectionReason {
    /// No permit was available within the configured wait/timeout budget
    /// (fixed window, sliding window, or token bucket variants).
    NoPermitAvailable,
    /// The concurrency-limiter variant's bounded FIFO wait queue was full.
    QueueFull,
}

impl fmt::Display for RateLimiterRejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimiterRejectionReason::NoPermitAvailable => write!(f, "no permit available"),
            RateLimiterRejectionReason::QueueFull => write!(f, "wait queue full"),
        }
    }
}

/// The four ways a strategy may synthesize a failure without ever invoking
/// the wrapped operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineRejection {
    /// The circuit breaker rejected the call in its current state.
    #[error("circuit breaker rejected call (state: {state})")]
    CircuitBreakerRejected {
        /// The state the breaker was in when it rejected the call.
        state: CircuitState,
    },

    /// The wrapped operation did not complete within the configured
    /// timeout and was signalled to cancel cooperatively.
    #[error("operation timed out after {timeout:?}")]
    TimeoutRejected {
        /// The timeout duration that elapsed.
        timeout: Duration,
    },

    /// The rate limiter rejected the call.
    #[error("rate limiter rejected call: {reason}")]
    RateLimiterRejected {
        /// Why the call was rejected.
        reason: RateLimiterRejectionReason,
    },

    /// The operation's [`crate::context::ResilienceContext`] was cancelled
    /// before or during the call.
    #[error("operation was cancelled")]
    OperationCancelled,
}

impl PipelineRejection {
    /// True if this is [`PipelineRejection::CircuitBreakerRejected`].
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PipelineRejection::CircuitBreakerRejected { .. })
    }

    /// True if this is [`PipelineRejection::TimeoutRejected`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineRejection::TimeoutRejected { .. })
    }

    /// True if this is [`PipelineRejection::RateLimiterRejected`].
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PipelineRejection::RateLimiterRejected { .. })
    }

    /// True if this is [`PipelineRejection::OperationCancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineRejection::OperationCancelled)
    }
}

/// A ready-made unification of [`PipelineRejection`] and an application
/// error type `E`, for callers who don't want to hand-write `From` impls
/// for every strategy they compose.
///
/// Strategies never require `ResilienceError<E>` specifically — only
/// `E: From<PipelineRejection>` — but this wrapper is the path of least
/// resistance for most pipelines. Mirrors the shape of a plain
/// `Result<T, E>` plus one extra `Rejected` arm rather than growing a
/// variant per strategy, since `PipelineRejection` already distinguishes
/// the rejection reasons.
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// A strategy rejected the call without reaching the wrapped operation.
    Rejected(PipelineRejection),

    /// The wrapped operation itself returned an application error.
    Application(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::Rejected(r) => write!(f, "{r}"),
            ResilienceError::Application(e) => write!(f, "operation failed: {e}"),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E> where E: std::error::Error {}

impl<E> From<PipelineRejection> for ResilienceError<E> {
    fn from(rejection: PipelineRejection) -> Self {
        ResilienceError::Rejected(rejection)
    }
}

impl<E> ResilienceError<E> {
    /// True if the operation was rejected by the circuit breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::Rejected(r) if r.is_circuit_open())
    }

    /// True if the operation timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Rejected(r) if r.is_timeout())
    }

    /// True if the operation was rejected by a rate limiter.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::Rejected(r) if r.is_rate_limited())
    }

    /// True if the operation's context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Rejected(r) if r.is_cancelled())
    }

    /// True if this wraps an application error rather than a rejection.
    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// Returns the application error, if any.
    pub fn application_error(&self) -> Option<&E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            ResilienceError::Rejected(_) => None,
        }
    }

    /// Consumes the error, returning the application error if present.
    pub fn into_application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            ResilienceError::Rejected(_) => None,
        }
    }

    /// Maps the application error, leaving a rejection untouched.
    pub fn map_application<E2>(self, f: impl FnOnce(E) -> E2) -> ResilienceError<E2> {
        match self {
            ResilienceError::Rejected(r) => ResilienceError::Rejected(r),
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct AppError(&'static str);

    impl fmt::Display for AppError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for AppError {}

    #[test]
    fn rejection_converts_via_from() {
        let err: ResilienceError<AppError> = PipelineRejection::TimeoutRejected {
            timeout: Duration::from_secs(1),
        }
        .into();
        assert!(err.is_timeout());
        assert!(!err.is_application());
    }

    #[test]
    fn application_error_roundtrips() {
        let err: ResilienceError<AppError> = ResilienceError::Application(AppError("boom"));
        assert!(err.is_application());
        assert_eq!(err.application_error(), Some(&AppError("boom")));
    }

    #[test]
    fn circuit_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }

    const _: () = {
        const fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<ResilienceError<AppError>>();
    };
}
