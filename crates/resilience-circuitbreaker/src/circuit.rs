//! The circuit breaker state machine, independent of the [`Strategy`] glue
//! and of the wrapped operation's value/error types.
//!
//! [`Strategy`]: resilience_core::strategy::Strategy

use crate::config::SlidingWindowType;
use resilience_core::error::CircuitState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

fn state_to_u8(state: CircuitState) -> u8 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::Open => 1,
        CircuitState::HalfOpen => 2,
        CircuitState::Isolated => 3,
    }
}

fn u8_to_state(value: u8) -> CircuitState {
    match value {
        0 => CircuitState::Closed,
        1 => CircuitState::Open,
        2 => CircuitState::HalfOpen,
        _ => CircuitState::Isolated,
    }
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    at: Instant,
    is_failure: bool,
    is_slow: bool,
}

/// A point-in-time snapshot of the breaker's counters, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub calls_recorded: usize,
    pub failure_rate: f64,
    pub slow_call_rate: f64,
}

/// What a caller should do given a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// The call may proceed. In `HalfOpen`, this consumes one of the
    /// permitted trial calls.
    Allowed,
    /// The call must be rejected without reaching the wrapped operation.
    Rejected,
}

struct Inner {
    state: CircuitState,
    records: VecDeque<CallRecord>,
    opened_at: Option<Instant>,
    half_open_permits_used: usize,
}

/// Tracks the sliding window of outcomes for one named circuit and decides
/// state transitions. Has no knowledge of the wrapped operation's types;
/// [`crate::strategy::CircuitBreakerStrategy`] classifies outcomes into
/// `record_success`/`record_failure` calls.
pub struct Circuit {
    state_fast: AtomicU8,
    inner: Mutex<Inner>,
    failure_rate_threshold: f64,
    sliding_window_type: SlidingWindowType,
    sliding_window_size: usize,
    sliding_window_duration: Option<Duration>,
    minimum_number_of_calls: usize,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    slow_call_duration_threshold: Option<Duration>,
    slow_call_rate_threshold: f64,
}

/// What happened as a result of recording a call outcome or evaluating a
/// permission check -- used by the strategy to decide which events to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

impl Circuit {
    pub fn new(
        failure_rate_threshold: f64,
        sliding_window_type: SlidingWindowType,
        sliding_window_size: usize,
        sliding_window_duration: Option<Duration>,
        minimum_number_of_calls: usize,
        wait_duration_in_open: Duration,
        permitted_calls_in_half_open: usize,
        slow_call_duration_threshold: Option<Duration>,
        slow_call_rate_threshold: f64,
    ) -> Self {
        Self {
            state_fast: AtomicU8::new(state_to_u8(CircuitState::Closed)),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                records: VecDeque::new(),
                opened_at: None,
                half_open_permits_used: 0,
            }),
            failure_rate_threshold,
            sliding_window_type,
            sliding_window_size,
            sliding_window_duration,
            minimum_number_of_calls,
            wait_duration_in_open,
            permitted_calls_in_half_open,
            slow_call_duration_threshold,
            slow_call_rate_threshold,
        }
    }

    /// Lock-free read of the current state, for diagnostics and for the
    /// read-only `CircuitBreakerState` handle.
    pub fn current_state(&self) -> CircuitState {
        u8_to_state(self.state_fast.load(Ordering::Acquire))
    }

    fn set_state(&self, inner: &mut Inner, state: CircuitState) {
        inner.state = state;
        self.state_fast.store(state_to_u8(state), Ordering::Release);
    }

    /// Checks whether a new call may proceed, transitioning Open -> HalfOpen
    /// if `wait_duration_in_open` has elapsed.
    pub fn try_acquire(&self) -> (Permission, Option<Transition>) {
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            CircuitState::Closed => (Permission::Allowed, None),
            CircuitState::Isolated => (Permission::Rejected, None),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|opened_at| opened_at.elapsed() >= self.wait_duration_in_open)
                    .unwrap_or(false);

                if elapsed {
                    let from = inner.state;
                    inner.half_open_permits_used = 1;
                    self.set_state(&mut inner, CircuitState::HalfOpen);
                    (
                        Permission::Allowed,
                        Some(Transition {
                            from,
                            to: CircuitState::HalfOpen,
                        }),
                    )
                } else {
                    (Permission::Rejected, None)
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_permits_used < self.permitted_calls_in_half_open {
                    inner.half_open_permits_used += 1;
                    (Permission::Allowed, None)
                } else {
                    (Permission::Rejected, None)
                }
            }
        }
    }

    /// Records a completed call's outcome and evaluates the window,
    /// possibly transitioning state.
    pub fn record(&self, is_failure: bool, duration: Duration) -> (bool, Option<Transition>) {
        let is_slow = self
            .slow_call_duration_threshold
            .map(|threshold| duration >= threshold)
            .unwrap_or(false);

        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        // A HalfOpen trial call resolves the breaker immediately: one
        // failure reopens it, one success (with no other permits
        // outstanding) closes it.
        if inner.state == CircuitState::HalfOpen {
            let from = inner.state;
            if is_failure {
                inner.records.clear();
                inner.opened_at = Some(now);
                self.set_state(&mut inner, CircuitState::Open);
                return (
                    is_slow,
                    Some(Transition {
                        from,
                        to: CircuitState::Open,
                    }),
                );
            } else {
                inner.records.clear();
                inner.opened_at = None;
                self.set_state(&mut inner, CircuitState::Closed);
                return (
                    is_slow,
                    Some(Transition {
                        from,
                        to: CircuitState::Closed,
                    }),
                );
            }
        }

        if inner.state == CircuitState::Isolated {
            return (is_slow, None);
        }

        inner.records.push_back(CallRecord {
            at: now,
            is_failure,
            is_slow,
        });
        self.prune(&mut inner, now);

        if inner.records.len() < self.minimum_number_of_calls {
            return (is_slow, None);
        }

        let total = inner.records.len() as f64;
        let failures = inner.records.iter().filter(|r| r.is_failure).count() as f64;
        let slow = inner.records.iter().filter(|r| r.is_slow).count() as f64;

        let failure_rate = failures / total;
        let slow_call_rate = slow / total;

        let should_open = failure_rate >= self.failure_rate_threshold
            || (self.slow_call_duration_threshold.is_some()
                && slow_call_rate >= self.slow_call_rate_threshold);

        if should_open && inner.state == CircuitState::Closed {
            let from = inner.state;
            inner.opened_at = Some(now);
            self.set_state(&mut inner, CircuitState::Open);
            return (
                is_slow,
                Some(Transition {
                    from,
                    to: CircuitState::Open,
                }),
            );
        }

        (is_slow, None)
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        match self.sliding_window_type {
            SlidingWindowType::CountBased => {
                while inner.records.len() > self.sliding_window_size {
                    inner.records.pop_front();
                }
            }
            SlidingWindowType::TimeBased => {
                let duration = self
                    .sliding_window_duration
                    .expect("time-based window requires sliding_window_duration");
                while let Some(front) = inner.records.front() {
                    if now.duration_since(front.at) > duration {
                        inner.records.pop_front();
                    } else {
                        break;
                    }
                }
            }
        }
    }

    /// Forces the breaker into `Isolated`. Only reachable manually, via
    /// [`crate::CircuitBreakerControl::isolate`].
    pub fn isolate(&self) -> Option<Transition> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::Isolated {
            return None;
        }
        let from = inner.state;
        inner.records.clear();
        inner.opened_at = None;
        self.set_state(&mut inner, CircuitState::Isolated);
        Some(Transition {
            from,
            to: CircuitState::Isolated,
        })
    }

    /// Forces the breaker back to `Closed` from any state, clearing the
    /// window. Reachable manually via [`crate::CircuitBreakerControl::close`].
    pub fn force_closed(&self) -> Option<Transition> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::Closed {
            return None;
        }
        let from = inner.state;
        inner.records.clear();
        inner.opened_at = None;
        inner.half_open_permits_used = 0;
        self.set_state(&mut inner, CircuitState::Closed);
        Some(Transition {
            from,
            to: CircuitState::Closed,
        })
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock().unwrap();
        let total = inner.records.len();
        let failure_rate = if total == 0 {
            0.0
        } else {
            inner.records.iter().filter(|r| r.is_failure).count() as f64 / total as f64
        };
        let slow_call_rate = if total == 0 {
            0.0
        } else {
            inner.records.iter().filter(|r| r.is_slow).count() as f64 / total as f64
        };
        CircuitMetrics {
            state: inner.state,
            calls_recorded: total,
            failure_rate,
            slow_call_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit(threshold: f64, min_calls: usize, wait: Duration) -> Circuit {
        Circuit::new(
            threshold,
            SlidingWindowType::CountBased,
            10,
            None,
            min_calls,
            wait,
            1,
            None,
            1.0,
        )
    }

    #[test]
    fn stays_closed_below_the_minimum_number_of_calls() {
        let c = circuit(0.5, 5, Duration::from_secs(30));
        for _ in 0..4 {
            c.record(true, Duration::from_millis(1));
        }
        assert_eq!(c.current_state(), CircuitState::Closed);
    }

    #[test]
    fn opens_once_failure_rate_crosses_the_threshold() {
        let c = circuit(0.5, 4, Duration::from_secs(30));
        c.record(true, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        c.record(false, Duration::from_millis(1));
        let (_, transition) = c.record(false, Duration::from_millis(1));
        assert_eq!(c.current_state(), CircuitState::Open);
        assert_eq!(
            transition,
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );
    }

    #[test]
    fn rejects_calls_while_open_and_before_the_wait_elapses() {
        let c = circuit(0.5, 2, Duration::from_secs(30));
        c.record(true, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        assert_eq!(c.current_state(), CircuitState::Open);

        let (permission, _) = c.try_acquire();
        assert_eq!(permission, Permission::Rejected);
    }

    #[test]
    fn transitions_to_half_open_after_the_wait_elapses() {
        let c = circuit(0.5, 2, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));

        let (permission, transition) = c.try_acquire();
        assert_eq!(permission, Permission::Allowed);
        assert_eq!(c.current_state(), CircuitState::HalfOpen);
        assert_eq!(
            transition,
            Some(Transition {
                from: CircuitState::Open,
                to: CircuitState::HalfOpen
            })
        );
    }

    #[test]
    fn a_half_open_failure_reopens_the_circuit() {
        let c = circuit(0.5, 2, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        c.try_acquire();

        let (_, transition) = c.record(true, Duration::from_millis(1));
        assert_eq!(c.current_state(), CircuitState::Open);
        assert_eq!(
            transition,
            Some(Transition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Open
            })
        );
    }

    #[test]
    fn a_half_open_success_closes_the_circuit() {
        let c = circuit(0.5, 2, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        c.record(true, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        c.try_acquire();

        let (_, transition) = c.record(false, Duration::from_millis(1));
        assert_eq!(c.current_state(), CircuitState::Closed);
        assert_eq!(
            transition,
            Some(Transition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Closed
            })
        );
    }

    #[test]
    fn isolate_rejects_until_manually_closed() {
        let c = circuit(0.5, 2, Duration::from_secs(30));
        c.isolate();
        assert_eq!(c.current_state(), CircuitState::Isolated);
        assert_eq!(c.try_acquire().0, Permission::Rejected);

        c.force_closed();
        assert_eq!(c.current_state(), CircuitState::Closed);
        assert_eq!(c.try_acquire().0, Permission::Allowed);
    }

    #[test]
    fn slow_calls_can_open_the_circuit_independent_of_failure_rate() {
        let c = Circuit::new(
            1.0,
            SlidingWindowType::CountBased,
            10,
            None,
            2,
            Duration::from_secs(30),
            1,
            Some(Duration::from_millis(50)),
            0.5,
        );
        c.record(false, Duration::from_millis(100));
        let (_, transition) = c.record(false, Duration::from_millis(100));
        assert_eq!(c.current_state(), CircuitState::Open);
        assert!(transition.is_some());
    }
}
