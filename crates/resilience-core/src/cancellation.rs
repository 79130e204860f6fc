//! Cooperative cancellation signal.
//!
//! A [`CancellationSignal`] is never forcibly killed; it is observed. Code
//! that wants to be cancellable must check [`CancellationSignal::is_cancelled`]
//! between steps, or await [`CancellationSignal::cancelled`] inside a
//! `tokio::select!`. [`crate::strategy::timeout`]-equivalent strategies and
//! hedging rely on this rather than dropping futures outright, since a
//! dropped future can still have left side effects in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cheaply-`Clone`able, edge-triggered cancellation signal.
///
/// Cloning a `CancellationSignal` shares the same underlying flag — all
/// clones observe the same cancellation. Use [`CancellationSignal::child`]
/// to derive an *independent* signal that additionally observes its
/// parent, which is what hedging uses to cancel a single losing attempt
/// without affecting its siblings or the parent operation.
#[derive(Clone)]
pub struct CancellationSignal {
    own: Arc<Inner>,
    parent: Option<Arc<CancellationSignal>>,
}

impl CancellationSignal {
    /// Creates a new, uncancelled root signal.
    pub fn new() -> Self {
        Self {
            own: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
            parent: None,
        }
    }

    /// Derives a child signal: cancelling the child does not cancel the
    /// parent, but cancelling the parent is observed by the child.
    ///
    /// This is how hedging isolates a single losing attempt: each hedge
    /// attempt gets `context.cancellation().child()`, so cancelling one
    /// loser never disturbs the other in-flight attempts, while a
    /// cancellation of the overall operation (the parent) still propagates
    /// down to every attempt.
    pub fn child(&self) -> Self {
        Self {
            own: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Marks this signal (and everything derived from it) as cancelled.
    ///
    /// Idempotent: cancelling an already-cancelled signal is a no-op beyond
    /// waking any current waiters.
    pub fn cancel(&self) {
        self.own.cancelled.store(true, Ordering::SeqCst);
        self.own.notify.notify_waiters();
    }

    /// True if this signal or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        if self.own.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Resolves once this signal (or an ancestor) is cancelled.
    ///
    /// Safe to call from inside `tokio::select!` alongside other branches;
    /// uses the standard check-flag / subscribe / recheck pattern so a
    /// cancellation that lands between the initial check and the await is
    /// never missed.
    pub async fn cancelled(&self) {
        match &self.parent {
            None => self.wait_own().await,
            Some(parent) => {
                tokio::select! {
                    _ = self.wait_own() => {}
                    _ = Box::pin(parent.cancelled()) => {}
                }
            }
        }
    }

    async fn wait_own(&self) {
        loop {
            if self.own.cancelled.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.own.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.own.cancelled.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_a_waiting_future() {
        let signal = CancellationSignal::new();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancellation should wake the waiter")
            .unwrap();
    }

    #[test]
    fn clones_share_the_same_flag() {
        let signal = CancellationSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        signal.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancelling_a_child_does_not_cancel_the_parent() {
        let parent = CancellationSignal::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn cancelling_the_parent_is_observed_by_the_child() {
        let parent = CancellationSignal::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn child_cancelled_future_observes_parent_cancellation() {
        let parent = CancellationSignal::new();
        let child = parent.child();

        let handle = tokio::spawn(async move {
            child.cancelled().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        parent.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("child should observe parent cancellation")
            .unwrap();
    }
}
