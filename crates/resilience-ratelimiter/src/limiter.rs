//! Rate limiting algorithms, independent of the [`Strategy`] glue.
//!
//! [`Strategy`]: resilience_core::strategy::Strategy

use resilience_core::cancellation::CancellationSignal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::sleep;

/// Result of a single, non-blocking acquisition attempt.
/// `Ok(wait)` means a permit was (or will be) available after waiting
/// `wait`. `Err(timeout)` means the wait would exceed `timeout_duration`.
type AcquireResult = Result<Duration, Duration>;

/// Which rate limiting algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// Resets all permits at fixed interval boundaries. Simple, but allows
    /// up to `2x limit_for_period` calls across a boundary.
    Fixed,
    /// Keeps a timestamp per call within the window. Precise, O(n) memory.
    SlidingLog,
    /// Weighted average of the current and previous fixed buckets.
    /// Approximates a sliding window in O(1) memory.
    SlidingCounter,
    /// Classic token bucket: tokens refill continuously up to a capacity,
    /// one token consumed per call.
    TokenBucket,
}

#[derive(Debug)]
struct FixedWindowState {
    limit_for_period: usize,
    refresh_period: Duration,
    available_permits: usize,
    period_start: Instant,
}

impl FixedWindowState {
    fn new(limit_for_period: usize, refresh_period: Duration) -> Self {
        Self {
            limit_for_period,
            refresh_period,
            available_permits: limit_for_period,
            period_start: Instant::now(),
        }
    }

    fn try_acquire(&mut self, timeout_duration: Duration) -> AcquireResult {
        let now = Instant::now();

        if now.duration_since(self.period_start) >= self.refresh_period {
            self.available_permits = self.limit_for_period;
            self.period_start = now;
        }

        if self.available_permits > 0 {
            self.available_permits -= 1;
            return Ok(Duration::ZERO);
        }

        let time_until_refresh = self
            .refresh_period
            .saturating_sub(now.duration_since(self.period_start));

        if time_until_refresh > timeout_duration {
            Err(timeout_duration)
        } else {
            Ok(time_until_refresh)
        }
    }

    fn available_permits(&self) -> usize {
        self.available_permits
    }
}

#[derive(Debug)]
struct SlidingLogState {
    limit_for_period: usize,
    window_duration: Duration,
    request_log: VecDeque<Instant>,
}

impl SlidingLogState {
    fn new(limit_for_period: usize, window_duration: Duration) -> Self {
        Self {
            limit_for_period,
            window_duration,
            request_log: VecDeque::with_capacity(limit_for_period),
        }
    }

    fn try_acquire(&mut self, timeout_duration: Duration) -> AcquireResult {
        let now = Instant::now();

        while let Some(&oldest) = self.request_log.front() {
            if now.duration_since(oldest) >= self.window_duration {
                self.request_log.pop_front();
            } else {
                break;
            }
        }

        if self.request_log.len() < self.limit_for_period {
            self.request_log.push_back(now);
            return Ok(Duration::ZERO);
        }

        let oldest = *self.request_log.front().expect("limit_for_period > 0");
        let time_until_slot = oldest
            .checked_add(self.window_duration)
            .map(|expiry| expiry.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        if time_until_slot > timeout_duration {
            Err(timeout_duration)
        } else {
            Ok(time_until_slot)
        }
    }

    fn available_permits(&self) -> usize {
        self.limit_for_period.saturating_sub(self.request_log.len())
    }
}

#[derive(Debug)]
struct SlidingCounterState {
    limit_for_period: usize,
    bucket_duration: Duration,
    previous_count: usize,
    current_count: usize,
    bucket_start: Instant,
}

impl SlidingCounterState {
    fn new(limit_for_period: usize, bucket_duration: Duration) -> Self {
        Self {
            limit_for_period,
            bucket_duration,
            previous_count: 0,
            current_count: 0,
            bucket_start: Instant::now(),
        }
    }

    fn maybe_rotate(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.bucket_start);
        if elapsed >= self.bucket_duration {
            let buckets_passed = (elapsed.as_secs_f64() / self.bucket_duration.as_secs_f64()) as u32;
            if buckets_passed >= 2 {
                self.previous_count = 0;
                self.current_count = 0;
            } else {
                self.previous_count = self.current_count;
                self.current_count = 0;
            }
            self.bucket_start = now;
        }
    }

    fn try_acquire(&mut self, timeout_duration: Duration) -> AcquireResult {
        let now = Instant::now();
        self.maybe_rotate(now);

        let elapsed_ratio = (now.duration_since(self.bucket_start).as_secs_f64()
            / self.bucket_duration.as_secs_f64())
        .clamp(0.0, 1.0);
        let previous_weight = 1.0 - elapsed_ratio;
        let weighted_count =
            self.previous_count as f64 * previous_weight + self.current_count as f64;

        if weighted_count < self.limit_for_period as f64 {
            self.current_count += 1;
            return Ok(Duration::ZERO);
        }

        let remaining = self.bucket_duration.as_secs_f64() * (1.0 - elapsed_ratio);
        let wait = Duration::from_secs_f64(remaining.max(0.0));

        if wait > timeout_duration {
            Err(timeout_duration)
        } else {
            Ok(wait)
        }
    }

    fn available_permits(&self) -> usize {
        let now = Instant::now();
        let elapsed_ratio = (now.duration_since(self.bucket_start).as_secs_f64()
            / self.bucket_duration.as_secs_f64())
        .clamp(0.0, 1.0);
        let previous_weight = 1.0 - elapsed_ratio;
        let weighted =
            self.previous_count as f64 * previous_weight + self.current_count as f64;
        self.limit_for_period.saturating_sub(weighted.ceil() as usize)
    }
}

/// **(ADDED)** Classic token bucket: refills continuously at `rate` tokens
/// per `refresh_period`, up to `limit_for_period` tokens banked.
#[derive(Debug)]
struct TokenBucketState {
    capacity: f64,
    refill_per_second: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketState {
    fn new(limit_for_period: usize, refresh_period: Duration) -> Self {
        Self {
            capacity: limit_for_period as f64,
            refill_per_second: limit_for_period as f64 / refresh_period.as_secs_f64(),
            tokens: limit_for_period as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, timeout_duration: Duration) -> AcquireResult {
        let now = Instant::now();
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(Duration::ZERO);
        }

        let deficit = 1.0 - self.tokens;
        let wait = Duration::from_secs_f64(deficit / self.refill_per_second);

        if wait > timeout_duration {
            Err(timeout_duration)
        } else {
            Ok(wait)
        }
    }

    fn available_permits(&self) -> usize {
        self.tokens.floor().max(0.0) as usize
    }
}

#[derive(Debug)]
enum WindowState {
    Fixed(FixedWindowState),
    SlidingLog(SlidingLogState),
    SlidingCounter(SlidingCounterState),
    TokenBucket(TokenBucketState),
}

impl WindowState {
    fn new(window_type: WindowType, limit_for_period: usize, refresh_period: Duration) -> Self {
        match window_type {
            WindowType::Fixed => Self::Fixed(FixedWindowState::new(limit_for_period, refresh_period)),
            WindowType::SlidingLog => {
                Self::SlidingLog(SlidingLogState::new(limit_for_period, refresh_period))
            }
            WindowType::SlidingCounter => {
                Self::SlidingCounter(SlidingCounterState::new(limit_for_period, refresh_period))
            }
            WindowType::TokenBucket => {
                Self::TokenBucket(TokenBucketState::new(limit_for_period, refresh_period))
            }
        }
    }

    fn try_acquire(&mut self, timeout_duration: Duration) -> AcquireResult {
        match self {
            Self::Fixed(s) => s.try_acquire(timeout_duration),
            Self::SlidingLog(s) => s.try_acquire(timeout_duration),
            Self::SlidingCounter(s) => s.try_acquire(timeout_duration),
            Self::TokenBucket(s) => s.try_acquire(timeout_duration),
        }
    }

    fn available_permits(&self) -> usize {
        match self {
            Self::Fixed(s) => s.available_permits(),
            Self::SlidingLog(s) => s.available_permits(),
            Self::SlidingCounter(s) => s.available_permits(),
            Self::TokenBucket(s) => s.available_permits(),
        }
    }
}

/// A window-based limiter (fixed, sliding-log, sliding-counter, or token
/// bucket), shareable across clones of the owning strategy.
#[derive(Debug, Clone)]
pub(crate) struct WindowLimiter {
    state: Arc<Mutex<WindowState>>,
    timeout_duration: Duration,
}

impl WindowLimiter {
    pub(crate) fn new(
        window_type: WindowType,
        limit_for_period: usize,
        refresh_period: Duration,
        timeout_duration: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowState::new(
                window_type,
                limit_for_period,
                refresh_period,
            ))),
            timeout_duration,
        }
    }

    /// Acquires a permit, waiting up to `timeout_duration` if none are
    /// immediately available. Returns the time spent waiting, or `Err` if
    /// the timeout was exceeded.
    pub(crate) async fn acquire(&self) -> Result<Duration, ()> {
        let first = {
            let mut state = self.state.lock().unwrap();
            state.try_acquire(self.timeout_duration)
        };

        match first {
            Ok(Duration::ZERO) => Ok(Duration::ZERO),
            Ok(wait) => {
                sleep(wait).await;
                let mut state = self.state.lock().unwrap();
                match state.try_acquire(self.timeout_duration) {
                    Ok(additional) => Ok(wait + additional),
                    Err(_) => Err(()),
                }
            }
            Err(_) => Err(()),
        }
    }

    #[allow(dead_code)]
    pub(crate) fn available_permits(&self) -> usize {
        self.state.lock().unwrap().available_permits()
    }
}

/// Why a concurrency permit could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConcurrencyRejection {
    /// Both `permit_limit` in-flight slots and the `queue_limit` wait slots
    /// were occupied; rejected synchronously without waiting at all.
    QueueFull,
    /// Queued for a permit, but `max_wait` elapsed first.
    TimedOut,
    /// Queued for a permit, but the caller's context was cancelled first.
    Cancelled,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

struct ConcurrencyInner {
    permit_limit: usize,
    in_flight: usize,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

/// **(ADDED, from the teacher's separate bulkhead crate)** Bounds the number
/// of concurrent calls rather than the call rate: up to `permit_limit` calls
/// run at once, up to `queue_limit` more wait in FIFO order for a freed
/// slot, and anything beyond that is rejected synchronously.
#[derive(Clone)]
pub(crate) struct ConcurrencyLimiter {
    inner: Arc<Mutex<ConcurrencyInner>>,
    queue_limit: usize,
    max_wait: Option<Duration>,
}

impl ConcurrencyLimiter {
    pub(crate) fn new(permit_limit: usize, queue_limit: usize, max_wait: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConcurrencyInner {
                permit_limit,
                in_flight: 0,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            })),
            queue_limit,
            max_wait,
        }
    }

    /// Removes the waiter with the given id if it is still queued. Returns
    /// `true` if it was removed, `false` if a release already popped it
    /// (meaning a permit is -- or is about to be -- on its way).
    fn remove_waiter(&self, id: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.waiters.iter().position(|w| w.id == id) {
            Some(pos) => {
                inner.waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Acquires a concurrency permit, held for the duration of the call.
    /// Races a queued wait against `cancellation` so a cancelled caller
    /// dequeues itself and returns promptly instead of waiting out
    /// `max_wait`.
    pub(crate) async fn acquire(
        &self,
        cancellation: &CancellationSignal,
    ) -> Result<ConcurrencyPermit, ConcurrencyRejection> {
        let waiter = {
            let mut inner = self.inner.lock().unwrap();
            if inner.in_flight < inner.permit_limit {
                inner.in_flight += 1;
                None
            } else if inner.waiters.len() < self.queue_limit {
                let id = inner.next_waiter_id;
                inner.next_waiter_id += 1;
                let (tx, rx) = oneshot::channel();
                inner.waiters.push_back(Waiter { id, tx });
                Some((id, rx))
            } else {
                return Err(ConcurrencyRejection::QueueFull);
            }
        };

        let (id, rx) = match waiter {
            None => return Ok(ConcurrencyPermit { inner: Arc::clone(&self.inner) }),
            Some(w) => w,
        };

        let granted = match self.max_wait {
            Some(max_wait) => {
                tokio::select! {
                    r = rx => Some(r),
                    _ = cancellation.cancelled() => None,
                    _ = sleep(max_wait) => None,
                }
            }
            None => {
                tokio::select! {
                    r = rx => Some(r),
                    _ = cancellation.cancelled() => None,
                }
            }
        };

        match granted {
            Some(Ok(())) => Ok(ConcurrencyPermit { inner: Arc::clone(&self.inner) }),
            Some(Err(_)) => Err(ConcurrencyRejection::Cancelled),
            None => {
                if self.remove_waiter(id) {
                    if cancellation.is_cancelled() {
                        Err(ConcurrencyRejection::Cancelled)
                    } else {
                        Err(ConcurrencyRejection::TimedOut)
                    }
                } else {
                    // A release already popped us right as we lost the
                    // race; take the slot and hand it straight back so it
                    // isn't leaked.
                    drop(ConcurrencyPermit { inner: Arc::clone(&self.inner) });
                    if cancellation.is_cancelled() {
                        Err(ConcurrencyRejection::Cancelled)
                    } else {
                        Err(ConcurrencyRejection::TimedOut)
                    }
                }
            }
        }
    }
}

/// An acquired concurrency slot. Releases itself on drop, handing the slot
/// straight to the next FIFO waiter if one is queued.
pub(crate) struct ConcurrencyPermit {
    inner: Arc<Mutex<ConcurrencyInner>>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.waiters.pop_front() {
            Some(waiter) => {
                // `in_flight` stays unchanged: the slot transfers directly
                // to the waiter instead of being freed and re-acquired.
                let _ = waiter.tx.send(());
            }
            None => {
                inner.in_flight -= 1;
            }
        }
    }
}
