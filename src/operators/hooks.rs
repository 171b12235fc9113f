//! Side-effect hooks around the subscription lifecycle.
//!
//! Hooks that can influence the outcome return `Result<(), Fault>`: an `Err`
//! replaces whatever was about to be forwarded. `do_on_cancel` and `finally`
//! are pure side effects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Fault;
use crate::signals::{Signal, Source};
use crate::subscribers::{Subscriber, SubscriberRef};
use crate::subscriptions::Subscription;

pub(crate) fn on_subscribe<F>(upstream: Signal, hook: F) -> Signal
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(SubscribeHook { upstream, hook }))
}

pub(crate) fn on_completed<F>(upstream: Signal, hook: F) -> Signal
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(CompletedHook {
        upstream,
        hook: Arc::new(hook),
    }))
}

pub(crate) fn on_error<F>(upstream: Signal, hook: F) -> Signal
where
    F: Fn(&Fault) -> Result<(), Fault> + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(ErrorHook {
        upstream,
        hook: Arc::new(hook),
    }))
}

pub(crate) fn on_terminate<F>(upstream: Signal, hook: F) -> Signal
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(TerminateHook {
        upstream,
        hook: Arc::new(hook),
    }))
}

pub(crate) fn on_cancel<F>(upstream: Signal, hook: F) -> Signal
where
    F: Fn() + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(CancelHook {
        upstream,
        hook: Arc::new(hook),
    }))
}

pub(crate) fn finally<F>(upstream: Signal, hook: F) -> Signal
where
    F: Fn() + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(FinallyHook {
        upstream,
        hook: Arc::new(hook),
    }))
}

struct SubscribeHook<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    upstream: Signal,
    hook: F,
}

impl<F> Source for SubscribeHook<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        // A failing hook settles the outcome; the upstream never starts.
        if let Err(fault) = (self.hook)() {
            subscriber.on_error(fault);
            return Subscription::noop();
        }
        self.upstream.subscribe_ref(subscriber)
    }
}

struct CompletedHook<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    upstream: Signal,
    hook: Arc<F>,
}

impl<F> Source for CompletedHook<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        self.upstream.subscribe_ref(Arc::new(CompletedObserver {
            downstream: subscriber,
            hook: self.hook.clone(),
        }))
    }
}

struct CompletedObserver<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    downstream: SubscriberRef,
    hook: Arc<F>,
}

impl<F> Subscriber for CompletedObserver<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    fn on_completed(&self) {
        match (self.hook)() {
            Ok(()) => self.downstream.on_completed(),
            Err(fault) => self.downstream.on_error(fault),
        }
    }

    fn on_error(&self, fault: Fault) {
        self.downstream.on_error(fault);
    }
}

struct ErrorHook<F>
where
    F: Fn(&Fault) -> Result<(), Fault> + Send + Sync + 'static,
{
    upstream: Signal,
    hook: Arc<F>,
}

impl<F> Source for ErrorHook<F>
where
    F: Fn(&Fault) -> Result<(), Fault> + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        self.upstream.subscribe_ref(Arc::new(ErrorObserver {
            downstream: subscriber,
            hook: self.hook.clone(),
        }))
    }
}

struct ErrorObserver<F>
where
    F: Fn(&Fault) -> Result<(), Fault> + Send + Sync + 'static,
{
    downstream: SubscriberRef,
    hook: Arc<F>,
}

impl<F> Subscriber for ErrorObserver<F>
where
    F: Fn(&Fault) -> Result<(), Fault> + Send + Sync + 'static,
{
    fn on_completed(&self) {
        self.downstream.on_completed();
    }

    fn on_error(&self, fault: Fault) {
        match (self.hook)(&fault) {
            Ok(()) => self.downstream.on_error(fault),
            Err(replacement) => self.downstream.on_error(replacement),
        }
    }
}

struct TerminateHook<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    upstream: Signal,
    hook: Arc<F>,
}

impl<F> Source for TerminateHook<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        self.upstream.subscribe_ref(Arc::new(TerminateObserver {
            downstream: subscriber,
            hook: self.hook.clone(),
        }))
    }
}

struct TerminateObserver<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    downstream: SubscriberRef,
    hook: Arc<F>,
}

impl<F> Subscriber for TerminateObserver<F>
where
    F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
{
    fn on_completed(&self) {
        match (self.hook)() {
            Ok(()) => self.downstream.on_completed(),
            Err(fault) => self.downstream.on_error(fault),
        }
    }

    fn on_error(&self, fault: Fault) {
        match (self.hook)() {
            Ok(()) => self.downstream.on_error(fault),
            Err(replacement) => self.downstream.on_error(replacement),
        }
    }
}

struct CancelHook<F>
where
    F: Fn() + Send + Sync + 'static,
{
    upstream: Signal,
    hook: Arc<F>,
}

impl<F> Source for CancelHook<F>
where
    F: Fn() + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let delivered = Arc::new(AtomicBool::new(false));
        let observer: SubscriberRef = Arc::new(DeliveryFlag {
            downstream: subscriber,
            delivered: delivered.clone(),
        });
        let upstream_sub = self.upstream.subscribe_ref(observer);

        // Release order matters: decide on the hook before tearing down the
        // upstream, and only when no terminal made it out.
        let hook = self.hook.clone();
        Subscription::all([
            Subscription::from_fn(move || {
                if !delivered.load(Ordering::Acquire) {
                    hook();
                }
            }),
            upstream_sub,
        ])
    }
}

/// Marks delivery before forwarding, so a release triggered by the terminal
/// itself never counts as a cancellation.
struct DeliveryFlag {
    downstream: SubscriberRef,
    delivered: Arc<AtomicBool>,
}

impl Subscriber for DeliveryFlag {
    fn on_completed(&self) {
        self.delivered.store(true, Ordering::Release);
        self.downstream.on_completed();
    }

    fn on_error(&self, fault: Fault) {
        self.delivered.store(true, Ordering::Release);
        self.downstream.on_error(fault);
    }
}

struct FinallyHook<F>
where
    F: Fn() + Send + Sync + 'static,
{
    upstream: Signal,
    hook: Arc<F>,
}

impl<F> Source for FinallyHook<F>
where
    F: Fn() + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let upstream_sub = self.upstream.subscribe_ref(subscriber);
        // The outer layer releases this handle right after forwarding the
        // terminal (or on cancel), which is exactly when the hook runs; the
        // once-semantics come from the handle itself.
        let hook = self.hook.clone();
        Subscription::all([upstream_sub, Subscription::from_fn(move || hook())])
    }
}
