//! Built-in factories: immediate terminals, deferred construction, and
//! hand-written subscribe functions.

use std::sync::Arc;

use crate::error::Fault;
use crate::schedulers::{Scheduler, SchedulerRef};
use crate::subscribers::SubscriberRef;
use crate::subscriptions::Subscription;

use super::{Signal, Source};

impl Signal {
    /// Completes immediately on subscribe.
    pub fn empty() -> Signal {
        Signal::from_arc(Arc::new(EmptySource))
    }

    /// Completes on `scheduler` instead of the subscriber's calling thread.
    pub fn empty_on(scheduler: impl Scheduler) -> Signal {
        Signal::from_arc(Arc::new(ScheduledTerminal {
            outcome: None,
            scheduler: Arc::new(scheduler),
        }))
    }

    /// Never terminates; only cancellation ends the subscription.
    pub fn never() -> Signal {
        Signal::from_arc(Arc::new(NeverSource))
    }

    /// Fails immediately with `fault` on subscribe.
    ///
    /// ## Example
    /// ```
    /// use onesig::{Fault, Signal, SignalError};
    ///
    /// let broken = Signal::fail(SignalError::Failure {
    ///     message: "no quorum".into(),
    /// });
    /// let fault = broken.wait().unwrap_err();
    /// assert_eq!(fault.label(), "signal_failure");
    /// ```
    pub fn fail(fault: impl Into<Fault>) -> Signal {
        Signal::from_arc(Arc::new(FailSource {
            fault: fault.into(),
        }))
    }

    /// Fails with `fault` on `scheduler`.
    pub fn fail_on(fault: impl Into<Fault>, scheduler: impl Scheduler) -> Signal {
        Signal::from_arc(Arc::new(ScheduledTerminal {
            outcome: Some(fault.into()),
            scheduler: Arc::new(scheduler),
        }))
    }

    /// Builds the real signal lazily, once per subscription.
    ///
    /// ## Example
    /// ```
    /// use onesig::Signal;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let builds = Arc::new(AtomicUsize::new(0));
    /// let b = builds.clone();
    /// let lazy = Signal::defer(move || {
    ///     b.fetch_add(1, Ordering::SeqCst);
    ///     Signal::empty()
    /// });
    ///
    /// assert_eq!(builds.load(Ordering::SeqCst), 0, "nothing until subscribe");
    /// lazy.subscribe_fn(|| {}, |_| {});
    /// lazy.subscribe_fn(|| {}, |_| {});
    /// assert_eq!(builds.load(Ordering::SeqCst), 2, "one build per subscription");
    /// ```
    pub fn defer(factory: impl Fn() -> Signal + Send + Sync + 'static) -> Signal {
        Signal::from_arc(Arc::new(DeferSource { factory }))
    }

    /// Wraps an arbitrary subscribe function.
    ///
    /// `subscribe` receives the (already guarded) subscriber and returns the
    /// handle that stops the execution. It runs once per subscription.
    ///
    /// ## Example
    /// ```
    /// use onesig::{Signal, Subscription};
    ///
    /// let greet = Signal::create(|subscriber| {
    ///     subscriber.on_completed();
    ///     Subscription::noop()
    /// });
    /// assert!(greet.wait().is_ok());
    /// ```
    pub fn create(
        subscribe: impl Fn(SubscriberRef) -> Subscription + Send + Sync + 'static,
    ) -> Signal {
        Signal::from_arc(Arc::new(FnSource {
            subscribe,
            on_caller: false,
        }))
    }

    /// Like [`create`](Signal::create), but the subscribe function is routed
    /// through the caller-thread trampoline. For sources that recursively
    /// re-subscribe during attach.
    pub fn create_on_caller(
        subscribe: impl Fn(SubscriberRef) -> Subscription + Send + Sync + 'static,
    ) -> Signal {
        Signal::from_arc(Arc::new(FnSource {
            subscribe,
            on_caller: true,
        }))
    }

    /// Wraps a hand-written [`Source`] implementation.
    pub fn from_source(source: impl Source) -> Signal {
        Signal::from_arc(Arc::new(source))
    }
}

struct EmptySource;

impl Source for EmptySource {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        subscriber.on_completed();
        Subscription::noop()
    }
}

struct NeverSource;

impl Source for NeverSource {
    fn attach(&self, _subscriber: SubscriberRef) -> Subscription {
        Subscription::noop()
    }
}

struct FailSource {
    fault: Fault,
}

impl Source for FailSource {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        subscriber.on_error(self.fault.clone());
        Subscription::noop()
    }
}

/// `empty_on` / `fail_on`: delivery rides the scheduler, and cancelling the
/// subscription cancels the scheduled delivery.
struct ScheduledTerminal {
    outcome: Option<Fault>,
    scheduler: SchedulerRef,
}

impl Source for ScheduledTerminal {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let outcome = self.outcome.clone();
        self.scheduler.schedule(Box::new(move || match outcome {
            None => subscriber.on_completed(),
            Some(fault) => subscriber.on_error(fault),
        }))
    }
}

struct DeferSource<F>
where
    F: Fn() -> Signal + Send + Sync + 'static,
{
    factory: F,
}

impl<F> Source for DeferSource<F>
where
    F: Fn() -> Signal + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        (self.factory)().subscribe_ref(subscriber)
    }
}

struct FnSource<F>
where
    F: Fn(SubscriberRef) -> Subscription + Send + Sync + 'static,
{
    subscribe: F,
    on_caller: bool,
}

impl<F> Source for FnSource<F>
where
    F: Fn(SubscriberRef) -> Subscription + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        (self.subscribe)(subscriber)
    }

    fn subscribes_on_caller(&self) -> bool {
        self.on_caller
    }
}
