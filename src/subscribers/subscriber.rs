//! # The terminal consumer trait.
//!
//! Provides [`Subscriber`], the extension point for observing a signal's
//! terminal event, plus the crate-internal callback adapters behind
//! [`Signal::subscribe_fn`](crate::Signal::subscribe_fn) and
//! [`Signal::subscribe_with_state`](crate::Signal::subscribe_with_state).
//!
//! ## Rules
//! - Exactly one of `on_completed` / `on_error` is called, at most once per
//!   subscription (enforced by [`TerminalGuard`](super::TerminalGuard)).
//! - Callbacks may arrive on any thread: the subscribing thread for
//!   immediate sources, a scheduler worker for timed ones.
//! - Keep callbacks short; they run inline in the producer's delivery path.

use std::sync::Arc;

use crate::error::Fault;

use super::guard::OnceGate;

/// Consumer of exactly one terminal event.
///
/// A subscriber observes either success or failure, never both. Implement it
/// for anything that must react to an operation finishing; closures are
/// covered by [`Signal::subscribe_fn`](crate::Signal::subscribe_fn).
///
/// ### Implementation requirements
/// - Do not block: delivery runs inline in the producer's path.
/// - Handle errors internally; do not panic.
pub trait Subscriber: Send + Sync + 'static {
    /// Success terminal: the operation finished.
    fn on_completed(&self);

    /// Failure terminal: the operation failed with `fault`.
    fn on_error(&self, fault: Fault);
}

/// Shared reference to a subscriber.
pub type SubscriberRef = Arc<dyn Subscriber>;

impl<S> Subscriber for Arc<S>
where
    S: Subscriber + ?Sized,
{
    fn on_completed(&self) {
        (**self).on_completed();
    }

    fn on_error(&self, fault: Fault) {
        (**self).on_error(fault);
    }
}

/// Closure-pair sink with its own one-shot gate.
///
/// The gate makes a reused sink safe: even when the same instance is handed
/// to several signals, only the first terminal runs a callback.
pub(crate) struct CallbackSubscriber<C, E>
where
    C: Fn() + Send + Sync + 'static,
    E: Fn(Fault) + Send + Sync + 'static,
{
    gate: OnceGate,
    complete: C,
    error: E,
}

impl<C, E> CallbackSubscriber<C, E>
where
    C: Fn() + Send + Sync + 'static,
    E: Fn(Fault) + Send + Sync + 'static,
{
    pub(crate) fn new(complete: C, error: E) -> Self {
        Self {
            gate: OnceGate::new(),
            complete,
            error,
        }
    }
}

impl<C, E> Subscriber for CallbackSubscriber<C, E>
where
    C: Fn() + Send + Sync + 'static,
    E: Fn(Fault) + Send + Sync + 'static,
{
    fn on_completed(&self) {
        if self.gate.claim() {
            (self.complete)();
        }
    }

    fn on_error(&self, fault: Fault) {
        if self.gate.claim() {
            (self.error)(fault);
        }
    }
}

/// State-carrying sink: owned state plus plain fn pointers, no captures.
pub(crate) struct StateSubscriber<S>
where
    S: Send + Sync + 'static,
{
    gate: OnceGate,
    state: S,
    complete: fn(&S),
    error: fn(&S, Fault),
}

impl<S> StateSubscriber<S>
where
    S: Send + Sync + 'static,
{
    pub(crate) fn new(state: S, complete: fn(&S), error: fn(&S, Fault)) -> Self {
        Self {
            gate: OnceGate::new(),
            state,
            complete,
            error,
        }
    }
}

impl<S> Subscriber for StateSubscriber<S>
where
    S: Send + Sync + 'static,
{
    fn on_completed(&self) {
        if self.gate.claim() {
            (self.complete)(&self.state);
        }
    }

    fn on_error(&self, fault: Fault) {
        if self.gate.claim() {
            (self.error)(&self.state, fault);
        }
    }
}
