//! Tokio-backed execution (feature `tokio`).
//!
//! Bridges the scheduler contract onto a running Tokio runtime: every work
//! item becomes a spawned task, delays ride `tokio::time`, and a
//! [`CancellationToken`] can drive a [`Subscription`].
//!
//! ## Rules
//! - All clocks go through the runtime, so a paused test clock is honored.
//! - Handles returned from scheduling abort the spawned task. Work that has
//!   already started is never interrupted mid-call.
//! - [`bind_cancellation`] must be called from within a runtime.

use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::schedulers::{recurse_via, RecursiveWork, Scheduler, Work};
use crate::subscriptions::Subscription;

/// Scheduler that spawns submitted work onto a Tokio runtime.
///
/// Timed operators built on this scheduler use `tokio::time`, which means
/// `start_paused` test runtimes fast-forward through delays instead of
/// sleeping for real.
///
/// # Example
/// ```
/// use onesig::{Signal, TokioScheduler};
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread", start_paused = true)]
/// async fn main() {
///     let sched = TokioScheduler::current();
///     let done = Signal::timer_on(Duration::from_secs(3), sched).await;
///     assert!(done.is_ok());
/// }
/// ```
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Binds to the runtime of the calling context.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    /// Binds to an explicit runtime handle.
    ///
    /// Lets synchronous code schedule onto a runtime it does not run on.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, work: Work) -> Subscription {
        let join = self.handle.spawn(async move { work() });
        Subscription::from_fn(move || join.abort())
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            work();
        });
        Subscription::from_fn(move || join.abort())
    }

    // Every step is its own spawned task, so chains of any length keep the
    // stack flat.
    fn schedule_recursive(&self, work: RecursiveWork) -> Subscription {
        recurse_via(self, work)
    }

    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Cancels `subscription` when `token` fires.
///
/// Spawns a watcher onto the current runtime; the returned handle detaches
/// the watcher without touching the underlying subscription. A token that is
/// already cancelled takes effect on the next runtime tick.
///
/// # Panics
/// Panics when called outside a Tokio runtime.
///
/// # Example
/// ```
/// use onesig::{bind_cancellation, Latch};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let latch = Latch::new();
///     let sub = latch.signal().subscribe_fn(|| (), |_fault| ());
///     let token = CancellationToken::new();
///     let _watch = bind_cancellation(sub, token.clone());
///
///     token.cancel();
///     tokio::task::yield_now().await;
///     assert_eq!(latch.subscriber_count(), 0);
/// }
/// ```
pub fn bind_cancellation(subscription: Subscription, token: CancellationToken) -> Subscription {
    let join = tokio::spawn(async move {
        token.cancelled().await;
        subscription.cancel();
    });
    Subscription::from_fn(move || join.abort())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    use crate::error::SignalError;
    use crate::latch::Latch;
    use crate::signals::Signal;

    #[tokio::test(start_paused = true)]
    async fn schedule_runs_spawned_work() {
        let sched = TokioScheduler::current();
        let (tx, rx) = oneshot::channel();

        let _sub = sched.schedule(Box::new(move || {
            let _ = tx.send(());
        }));

        rx.await.expect("work ran on the runtime");
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_after_rides_the_paused_clock() {
        let sched = TokioScheduler::current();
        let (tx, rx) = oneshot::channel();
        let started = sched.now();

        let _sub = sched.schedule_after(
            Duration::from_secs(5),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        rx.await.expect("delayed work fired");
        assert!(sched.now().duration_since(started) >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_delay_prevents_the_work() {
        let sched = TokioScheduler::current();
        let hit = Arc::new(AtomicBool::new(false));
        let flag = hit.clone();

        let sub = sched.schedule_after(
            Duration::from_secs(1),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        sub.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!hit.load(Ordering::SeqCst), "aborted task never ran");
    }

    #[tokio::test(start_paused = true)]
    async fn recursion_steps_through_spawned_tasks() {
        let sched = TokioScheduler::current();
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let _sub = sched.schedule_recursive(Arc::new(move |cont| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 100 {
                cont.resume();
            } else if let Some(tx) = tx.lock().take() {
                let _ = tx.send(());
            }
        }));

        rx.await.expect("recursion reached the end");
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_operator_end_to_end() {
        let sched = TokioScheduler::current();
        let slow = Signal::timer_on(Duration::from_secs(60), sched.clone());

        let fault = slow
            .timeout_on(Duration::from_secs(1), sched)
            .into_future()
            .await
            .expect_err("deadline beats the slow source");

        match fault.downcast_ref::<SignalError>() {
            Some(SignalError::Deadline { after }) => assert_eq!(*after, Duration::from_secs(1)),
            other => panic!("expected a deadline fault, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bound_token_cancels_the_subscription() {
        let latch = Latch::new();
        let sub = latch.signal().subscribe_fn(|| (), |_fault| ());
        assert_eq!(latch.subscriber_count(), 1);

        let token = CancellationToken::new();
        let _watch = bind_cancellation(sub, token.clone());

        token.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(latch.subscriber_count(), 0, "token fired into the latch");
    }

    #[tokio::test(start_paused = true)]
    async fn unbinding_detaches_the_watcher() {
        let latch = Latch::new();
        let sub = latch.signal().subscribe_fn(|| (), |_fault| ());

        let token = CancellationToken::new();
        let watch = bind_cancellation(sub, token.clone());
        watch.cancel();

        token.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(
            latch.subscriber_count(),
            1,
            "detached token no longer reaches the subscription"
        );
    }
}
