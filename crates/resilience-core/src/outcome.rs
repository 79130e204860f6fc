//! The [`Outcome`] envelope every strategy and the pipeline itself return.

use std::backtrace::Backtrace;
use std::fmt;

/// A snapshot of the call stack captured at the moment a `Result::Err` was
/// converted into an [`Outcome::Failure`].
///
/// Wraps `std::backtrace::Backtrace` rather than a bespoke frame-walking
/// implementation: capturing it lazily (only when a failure actually
/// happens) keeps the success path free of any overhead.
pub struct CallStackSnapshot {
    backtrace: Backtrace,
}

impl CallStackSnapshot {
    /// Captures a snapshot at the current point of execution.
    ///
    /// Respects `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` the same way any other
    /// `Backtrace::capture()` call does; when neither is set this is a cheap
    /// `Backtrace::disabled()`.
    pub fn capture() -> Self {
        Self {
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns the captured backtrace for rendering or inspection.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for CallStackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStackSnapshot")
            .field("backtrace", &self.backtrace)
            .finish()
    }
}

impl fmt::Display for CallStackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.backtrace)
    }
}

/// The result of executing a pipeline, or any single strategy within it.
///
/// Unlike a bare `Result<T, E>`, a `Failure` carries the [`CallStackSnapshot`]
/// captured at the point the error was produced, so a strategy several
/// layers removed (for example a `Fallback` wrapping a `Retry` wrapping a
/// `CircuitBreaker`) can still report where the failure actually originated.
#[derive(Debug)]
pub enum Outcome<T, E> {
    /// The operation completed successfully.
    Success(T),
    /// The operation failed; `trace` was captured where `error` was produced.
    Failure { error: E, trace: CallStackSnapshot },
}

impl<T, E> Outcome<T, E> {
    /// Wraps a successful value.
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Wraps an error, capturing a [`CallStackSnapshot`] at this call site.
    pub fn failure(error: E) -> Self {
        Outcome::Failure {
            error,
            trace: CallStackSnapshot::capture(),
        }
    }

    /// Returns true if this is a [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns true if this is a [`Outcome::Failure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }

    /// Returns a reference to the success value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(v) => Some(v),
            Outcome::Failure { .. } => None,
        }
    }

    /// Returns a reference to the failure error, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }

    /// Converts this outcome into a `Result`, discarding the captured trace.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure { error, .. } => Err(error),
        }
    }

    /// Builds an `Outcome` from a `Result`, capturing a trace on `Err`.
    pub fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Outcome::Success(v),
            Err(e) => Outcome::failure(e),
        }
    }

    /// Maps the success value, leaving a failure untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Failure { error, trace } => Outcome::Failure { error, trace },
        }
    }

    /// Maps the failure error, leaving a success untouched. The original
    /// trace is preserved: mapping the error type does not change where the
    /// underlying fault occurred.
    pub fn map_err<E2>(self, f: impl FnOnce(E) -> E2) -> Outcome<T, E2> {
        match self {
            Outcome::Success(v) => Outcome::Success(v),
            Outcome::Failure { error, trace } => Outcome::Failure {
                error: f(error),
                trace,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_roundtrips_through_result() {
        let outcome: Outcome<i32, &str> = Outcome::success(42);
        assert!(outcome.is_success());
        assert_eq!(outcome.into_result(), Ok(42));
    }

    #[test]
    fn failure_captures_a_trace() {
        let outcome: Outcome<i32, &str> = Outcome::failure("boom");
        assert!(outcome.is_failure());
        match &outcome {
            Outcome::Failure { error, .. } => assert_eq!(*error, "boom"),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn map_err_preserves_failure_shape() {
        let outcome: Outcome<i32, &str> = Outcome::failure("boom");
        let mapped = outcome.map_err(|e| format!("wrapped: {e}"));
        assert_eq!(mapped.error().unwrap(), "wrapped: boom");
    }
}
