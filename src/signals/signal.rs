//! The [`Signal`] handle, the [`Source`] contract, and the subscribe scaffold.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Fault;
use crate::operators;
use crate::operators::timing::Due;
use crate::schedulers::{trampoline, Scheduler, SchedulerRef};
use crate::subscribers::{
    CallbackSubscriber, StateSubscriber, Subscriber, SubscriberRef, TerminalGuard,
};
use crate::subscriptions::{OnceSlot, Subscription};

/// Per-subscription behavior behind a [`Signal`].
///
/// Implementors start one execution per [`attach`](Source::attach) call and
/// report its outcome to the given subscriber: exactly one of
/// `on_completed` / `on_error`, or neither if the returned handle is
/// cancelled first.
///
/// ### Implementation requirements
/// - `attach` may deliver synchronously, before it returns.
/// - The returned [`Subscription`] must stop the execution without emitting
///   a terminal event.
/// - Never call both terminals; the scaffold guards downstream, but a source
///   should not rely on that.
pub trait Source: Send + Sync + 'static {
    /// Starts one execution for `subscriber`.
    fn attach(&self, subscriber: SubscriberRef) -> Subscription;

    /// Whether `attach` must be routed through the caller-thread trampoline.
    ///
    /// Sources that re-subscribe recursively (sequencing over long chains)
    /// return `true` so that nested attaches queue instead of growing the
    /// call stack.
    fn subscribes_on_caller(&self) -> bool {
        false
    }
}

/// A cold, exactly-once completion signal.
///
/// `Signal` is an immutable factory value: cloning it is cheap and clones
/// share the same recipe, not the same execution. Subscribing starts a fresh
/// execution that ends in exactly one terminal event, success or failure,
/// unless the subscription is cancelled first.
///
/// Operators are inherent methods returning new `Signal`s; nothing happens
/// until a terminal consumer subscribes.
///
/// ## Example
/// ```
/// use onesig::Signal;
///
/// let pipeline = Signal::empty()
///     .then_with(|| Signal::empty())
///     .do_on_completed(|| {
///         println!("all steps done");
///         Ok(())
///     });
///
/// assert!(pipeline.wait().is_ok());
/// ```
#[derive(Clone)]
pub struct Signal {
    source: Arc<dyn Source>,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signal")
    }
}

impl Signal {
    pub(crate) fn from_arc(source: Arc<dyn Source>) -> Self {
        Self { source }
    }

    /// Subscribes a shared subscriber.
    ///
    /// The subscriber is wrapped in a one-shot guard: the first terminal is
    /// forwarded, the subscription handle is released right after it, and any
    /// late or racing terminal from a misbehaving source is dropped.
    ///
    /// The returned handle cancels this execution; dropping it does nothing.
    pub fn subscribe_ref(&self, subscriber: SubscriberRef) -> Subscription {
        let slot = OnceSlot::new();
        let handle = slot.subscription();
        let guarded: SubscriberRef = Arc::new(TerminalGuard::new(subscriber, handle.clone()));

        if self.source.subscribes_on_caller() && !trampoline::is_active() {
            let source = self.source.clone();
            trampoline::run_or_enqueue(Box::new(move || {
                slot.set(source.attach(guarded));
            }));
        } else {
            slot.set(self.source.attach(guarded));
        }
        handle
    }

    /// Subscribes an owned subscriber. See [`subscribe_ref`](Self::subscribe_ref).
    pub fn subscribe(&self, subscriber: impl Subscriber) -> Subscription {
        self.subscribe_ref(Arc::new(subscriber))
    }

    /// Subscribes a pair of closures, one per terminal.
    pub fn subscribe_fn(
        &self,
        on_completed: impl Fn() + Send + Sync + 'static,
        on_error: impl Fn(Fault) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_ref(Arc::new(CallbackSubscriber::new(on_completed, on_error)))
    }

    /// Subscribes owned state plus plain function pointers, no captures.
    ///
    /// Useful where boxing a closure per subscription is unwanted; the state
    /// travels with the subscription and is dropped when it is released.
    pub fn subscribe_with_state<S>(
        &self,
        state: S,
        on_completed: fn(&S),
        on_error: fn(&S, Fault),
    ) -> Subscription
    where
        S: Send + Sync + 'static,
    {
        self.subscribe_ref(Arc::new(StateSubscriber::new(state, on_completed, on_error)))
    }

    // ---- sequencing ------------------------------------------------------

    /// Runs `self`, then `next`; fails fast on the first failure.
    ///
    /// ## Example
    /// ```
    /// use onesig::{Fault, Signal};
    ///
    /// let chain = Signal::fail(Fault::msg("first step broke")).then(Signal::empty());
    /// assert!(chain.wait().is_err(), "second step never runs");
    /// ```
    pub fn then(self, next: Signal) -> Signal {
        Signal::concat([self, next])
    }

    /// Like [`then`](Self::then), but builds the continuation only when the
    /// first part has completed.
    pub fn then_with(self, next: impl Fn() -> Signal + Send + Sync + 'static) -> Signal {
        Signal::concat([self, Signal::defer(next)])
    }

    /// Runs `sources` one at a time, in order.
    ///
    /// The sequence is iterated lazily, one element per step: after a failure
    /// or a cancel the remainder is never touched. Success of the last
    /// element completes the whole; an empty sequence completes immediately.
    /// Advancing goes through the caller-thread trampoline, so arbitrarily
    /// long chains of immediately-completing elements run in constant stack.
    pub fn concat<I>(sources: I) -> Signal
    where
        I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        operators::concat::concat(sources)
    }

    // ---- fan-out ---------------------------------------------------------

    /// Runs all `sources` concurrently; completes when every one has
    /// completed, fails on the first failure (the rest are cancelled and the
    /// sequence is not iterated further).
    pub fn merge<I>(sources: I) -> Signal
    where
        I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        operators::merge::merge_bounded(sources, usize::MAX)
    }

    /// [`merge`](Self::merge) with at most `max_concurrent` live executions;
    /// further elements are pulled as slots free up. The bound is clamped to
    /// at least 1.
    pub fn merge_bounded<I>(sources: I, max_concurrent: usize) -> Signal
    where
        I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        operators::merge::merge_bounded(sources, max_concurrent)
    }

    /// Eagerly materializes `sources` and waits for all of them.
    ///
    /// Every signal is subscribed up front; completion counts down, the first
    /// failure wins and cancels the rest. An empty set completes immediately.
    pub fn when_all(sources: impl IntoIterator<Item = Signal>) -> Signal {
        operators::merge::when_all(sources.into_iter().collect())
    }

    // ---- timing ----------------------------------------------------------

    /// Completes once `delay` has elapsed on the process default timer.
    pub fn timer(delay: Duration) -> Signal {
        operators::timing::timer(Due::After(delay), None)
    }

    /// [`timer`](Self::timer) on an explicit scheduler.
    pub fn timer_on(delay: Duration, scheduler: impl Scheduler) -> Signal {
        operators::timing::timer(Due::After(delay), Some(into_ref(scheduler)))
    }

    /// Completes at an absolute `deadline` (already-passed deadlines complete
    /// immediately) on the process default timer.
    pub fn timer_at(deadline: Instant) -> Signal {
        operators::timing::timer(Due::At(deadline), None)
    }

    /// [`timer_at`](Self::timer_at) on an explicit scheduler; the remaining
    /// delay is computed against that scheduler's clock at subscribe time.
    pub fn timer_at_on(deadline: Instant, scheduler: impl Scheduler) -> Signal {
        operators::timing::timer(Due::At(deadline), Some(into_ref(scheduler)))
    }

    /// Fails with [`SignalError::Deadline`](crate::SignalError::Deadline) if
    /// `self` has not terminated within `delay`.
    ///
    /// Upstream and the deadline race; the first terminal wins and the loser
    /// is cancelled and silenced.
    ///
    /// ## Example
    /// ```
    /// use onesig::{Signal, SignalError, VirtualScheduler};
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let clock = VirtualScheduler::new();
    /// let deadline_hit = Arc::new(AtomicBool::new(false));
    ///
    /// let hit = deadline_hit.clone();
    /// let _sub = Signal::never()
    ///     .timeout_on(Duration::from_millis(10), clock.clone())
    ///     .subscribe_fn(
    ///         || {},
    ///         move |fault| hit.store(fault.is::<SignalError>(), Ordering::SeqCst),
    ///     );
    ///
    /// clock.advance_by(Duration::from_millis(9));
    /// assert!(!deadline_hit.load(Ordering::SeqCst), "one tick early");
    /// clock.advance_by(Duration::from_millis(1));
    /// assert!(deadline_hit.load(Ordering::SeqCst));
    /// ```
    pub fn timeout(self, delay: Duration) -> Signal {
        operators::timing::timeout(self, Due::After(delay), None)
    }

    /// [`timeout`](Self::timeout) on an explicit scheduler.
    pub fn timeout_on(self, delay: Duration, scheduler: impl Scheduler) -> Signal {
        operators::timing::timeout(self, Due::After(delay), Some(into_ref(scheduler)))
    }

    /// [`timeout`](Self::timeout) against an absolute deadline.
    pub fn timeout_at(self, deadline: Instant) -> Signal {
        operators::timing::timeout(self, Due::At(deadline), None)
    }

    /// [`timeout_at`](Self::timeout_at) on an explicit scheduler.
    pub fn timeout_at_on(self, deadline: Instant, scheduler: impl Scheduler) -> Signal {
        operators::timing::timeout(self, Due::At(deadline), Some(into_ref(scheduler)))
    }

    // ---- recovery --------------------------------------------------------

    /// Replaces a failure of type `E` with the handler's signal.
    ///
    /// The handler runs only when the fault downcasts to `E`; other faults
    /// pass through unchanged. The replacement is subscribed with the
    /// original downstream, so its own failure is not re-caught here.
    ///
    /// ## Example
    /// ```
    /// use onesig::{Fault, Signal, SignalError};
    ///
    /// let recovered = Signal::fail(Fault::msg("flaky backend"))
    ///     .catch(|_fault: &SignalError| Signal::empty());
    /// assert!(recovered.wait().is_ok());
    /// ```
    pub fn catch<E, F>(self, handler: F) -> Signal
    where
        E: StdError + Send + Sync + 'static,
        F: Fn(&E) -> Signal + Send + Sync + 'static,
    {
        operators::recover::catch(self, handler)
    }

    /// Tries `sources` in order until one completes.
    ///
    /// Any failure advances to the next element (through the trampoline, so
    /// long chains are stack-safe). When the sequence is exhausted the last
    /// failure propagates; an empty sequence completes.
    pub fn fallback_chain<I>(sources: I) -> Signal
    where
        I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        operators::recover::fallback_chain(sources)
    }

    /// Swallows any failure, turning it into completion.
    pub fn catch_ignore(self) -> Signal {
        operators::recover::catch_ignore(self)
    }

    /// Swallows a failure of type `E` after running `hook` on it; other
    /// faults propagate unchanged.
    pub fn catch_ignore_with<E, F>(self, hook: F) -> Signal
    where
        E: StdError + Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        operators::recover::catch_ignore_with(self, hook)
    }

    // ---- side-effect hooks ----------------------------------------------

    /// Runs `hook` before the upstream is subscribed; `Err` becomes the
    /// failure and the upstream is never attached.
    pub fn do_on_subscribe(
        self,
        hook: impl Fn() -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Signal {
        operators::hooks::on_subscribe(self, hook)
    }

    /// Runs `hook` before forwarding success; `Err` replaces the success
    /// with the hook's fault.
    pub fn do_on_completed(
        self,
        hook: impl Fn() -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Signal {
        operators::hooks::on_completed(self, hook)
    }

    /// Runs `hook` on the fault before forwarding a failure; `Err` replaces
    /// the original fault.
    pub fn do_on_error(
        self,
        hook: impl Fn(&Fault) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Signal {
        operators::hooks::on_error(self, hook)
    }

    /// Runs `hook` before forwarding either terminal; `Err` overrides the
    /// outcome.
    pub fn do_on_terminate(
        self,
        hook: impl Fn() -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Signal {
        operators::hooks::on_terminate(self, hook)
    }

    /// Runs `hook` when the subscription is cancelled before any terminal
    /// was delivered. Terminal delivery suppresses the hook.
    pub fn do_on_cancel(self, hook: impl Fn() + Send + Sync + 'static) -> Signal {
        operators::hooks::on_cancel(self, hook)
    }

    /// Runs `hook` exactly once after the terminal has been forwarded, or on
    /// cancellation, whichever comes first.
    pub fn finally(self, hook: impl Fn() + Send + Sync + 'static) -> Signal {
        operators::hooks::finally(self, hook)
    }
}

fn into_ref(scheduler: impl Scheduler) -> SchedulerRef {
    Arc::new(scheduler)
}
