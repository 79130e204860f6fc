//! Error type for [`crate::RateLimiterStrategy`].

use resilience_core::error::{PipelineRejection, RateLimiterRejectionReason, ResilienceError};
use std::time::Duration;

/// A call was rejected by the rate limiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimiterError {
    /// No permit became available within `timeout_duration`.
    #[error("rate limit exceeded: no permit available within {waited:?}")]
    LimitExceeded { waited: Duration },
    /// The bounded wait queue (concurrency limiting) was full.
    #[error("rate limiter queue is full")]
    QueueFull,
}

impl<E> From<RateLimiterError> for ResilienceError<E> {
    fn from(err: RateLimiterError) -> Self {
        let reason = match err {
            RateLimiterError::LimitExceeded { .. } => RateLimiterRejectionReason::NoPermitAvailable,
            RateLimiterError::QueueFull => RateLimiterRejectionReason::QueueFull,
        };
        ResilienceError::Rejected(PipelineRejection::RateLimiterRejected { reason })
    }
}

impl From<RateLimiterError> for PipelineRejection {
    fn from(err: RateLimiterError) -> Self {
        let reason = match err {
            RateLimiterError::LimitExceeded { .. } => RateLimiterRejectionReason::NoPermitAvailable,
            RateLimiterError::QueueFull => RateLimiterRejectionReason::QueueFull,
        };
        PipelineRejection::RateLimiterRejected { reason }
    }
}
