//! Backoff delay computation between retry attempts.

use std::sync::Arc;
use std::time::Duration;

/// A custom delay generator: given the 1-based attempt number that just
/// failed, returns the delay before the next attempt.
pub type DelayGeneratorFn = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// How the delay between retry attempts grows.
#[derive(Clone)]
pub enum BackoffStrategy {
    /// The same delay before every retry.
    Constant(Duration),
    /// `initial + (attempt - 1) * increment`.
    Linear {
        /// Delay before the first retry.
        initial: Duration,
        /// Additional delay added per subsequent attempt.
        increment: Duration,
    },
    /// `initial * multiplier.powi(attempt - 1)`.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Multiplier applied per subsequent attempt.
        multiplier: f64,
    },
    /// A caller-supplied function computing the delay for a given attempt,
    /// overriding the other fields entirely.
    Custom(DelayGeneratorFn),
}

impl BackoffStrategy {
    /// Computes the raw delay for the given 1-based attempt number, before
    /// jitter or the `max_delay` clamp are applied.
    pub fn base_delay(&self, attempt: usize) -> Duration {
        match self {
            BackoffStrategy::Constant(d) => *d,
            BackoffStrategy::Linear { initial, increment } => {
                *initial + *increment * (attempt.saturating_sub(1) as u32)
            }
            BackoffStrategy::Exponential { initial, multiplier } => {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                Duration::from_secs_f64((initial.as_secs_f64() * factor).max(0.0))
            }
            BackoffStrategy::Custom(f) => f(attempt),
        }
    }
}

impl std::fmt::Debug for BackoffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackoffStrategy::Constant(d) => f.debug_tuple("Constant").field(d).finish(),
            BackoffStrategy::Linear { initial, increment } => f
                .debug_struct("Linear")
                .field("initial", initial)
                .field("increment", increment)
                .finish(),
            BackoffStrategy::Exponential { initial, multiplier } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("multiplier", multiplier)
                .finish(),
            BackoffStrategy::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

/// Applies an optional `max_delay` clamp and then optional full jitter
/// (`U(0, delay)`) to a raw backoff delay.
///
/// Order matters: clamping first then jittering over the clamped delay
/// keeps jitter uniform over `[0, min(delay, max_delay)]`. Jittering first
/// would pile probability mass at `max_delay` (every draw above it gets
/// flattened to the same clamp value).
pub(crate) fn apply_jitter_and_clamp(
    delay: Duration,
    jitter: bool,
    max_delay: Option<Duration>,
) -> Duration {
    let delay = match max_delay {
        Some(max) => delay.min(max),
        None => delay,
    };

    if jitter {
        let millis = delay.as_millis().min(u64::MAX as u128) as u64;
        if millis == 0 {
            delay
        } else {
            Duration::from_millis(rand::random_range(0..=millis))
        }
    } else {
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_backoff_never_changes() {
        let backoff = BackoffStrategy::Constant(Duration::from_millis(100));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(100));
        assert_eq!(backoff.base_delay(5), Duration::from_millis(100));
    }

    #[test]
    fn linear_backoff_grows_by_increment() {
        let backoff = BackoffStrategy::Linear {
            initial: Duration::from_millis(100),
            increment: Duration::from_millis(50),
        };
        assert_eq!(backoff.base_delay(1), Duration::from_millis(100));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(150));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(200));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = BackoffStrategy::Exponential {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
        };
        assert_eq!(backoff.base_delay(1), Duration::from_millis(100));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(200));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn max_delay_clamps_the_result() {
        let delay = apply_jitter_and_clamp(
            Duration::from_secs(10),
            false,
            Some(Duration::from_secs(2)),
        );
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn jitter_never_exceeds_the_base_delay() {
        let base = Duration::from_millis(200);
        for _ in 0..20 {
            let delay = apply_jitter_and_clamp(base, true, None);
            assert!(delay <= base);
        }
    }

    #[test]
    fn jitter_is_drawn_over_the_clamped_delay_not_the_raw_one() {
        let max = Duration::from_millis(50);
        for _ in 0..20 {
            let delay = apply_jitter_and_clamp(Duration::from_secs(10), true, Some(max));
            assert!(delay <= max, "delay {delay:?} exceeded max_delay {max:?}");
        }
    }

    #[test]
    fn custom_generator_overrides_the_formula() {
        let backoff = BackoffStrategy::Custom(Arc::new(|attempt| {
            Duration::from_millis(attempt as u64 * 10)
        }));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(30));
    }
}
