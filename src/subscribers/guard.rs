//! Exactly-once delivery guards.
//!
//! Every "first call wins" decision in the crate goes through one type:
//! [`OnceGate`], an atomic compare-and-set flag. [`TerminalGuard`] combines
//! the gate with auto-release: it is the wrapper the subscribe scaffold
//! installs around every subscriber, at every operator layer.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Fault;
use crate::subscriptions::Subscription;

use super::subscriber::{Subscriber, SubscriberRef};

/// Atomic one-shot gate.
///
/// The single reusable building block for exactly-once decisions: racing
/// callers all invoke [`OnceGate::claim`] and precisely one of them wins.
///
/// # Example
/// ```
/// use onesig::OnceGate;
///
/// let gate = OnceGate::new();
/// assert!(gate.claim(), "first claim wins");
/// assert!(!gate.claim(), "every later claim loses");
/// assert!(gate.is_claimed());
/// ```
#[derive(Default)]
pub struct OnceGate {
    claimed: AtomicBool,
}

impl OnceGate {
    /// Creates an unclaimed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim the gate; `true` for exactly one caller.
    pub fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns `true` once the gate has been claimed.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

/// Auto-detaching subscriber wrapper.
///
/// Forwards the first terminal event downstream and then releases the
/// associated [`Subscription`]; anything after the first call is silently
/// dropped. The subscribe scaffold wraps every subscriber in one of these,
/// so each operator layer is independently one-shot and self-releasing.
///
/// Custom [`Source`](crate::Source) implementations receive an
/// already-guarded subscriber and may call it without further bookkeeping.
pub struct TerminalGuard {
    gate: OnceGate,
    downstream: SubscriberRef,
    handle: Subscription,
}

impl TerminalGuard {
    /// Wraps `downstream`; `handle` is released after the terminal is
    /// forwarded.
    pub fn new(downstream: SubscriberRef, handle: Subscription) -> Self {
        Self {
            gate: OnceGate::new(),
            downstream,
            handle,
        }
    }
}

impl Subscriber for TerminalGuard {
    fn on_completed(&self) {
        if self.gate.claim() {
            self.downstream.on_completed();
            self.handle.cancel();
        }
    }

    fn on_error(&self, fault: Fault) {
        if self.gate.claim() {
            self.downstream.on_error(fault);
            self.handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    struct Counting {
        done: AtomicUsize,
        failed: AtomicUsize,
    }

    impl Counting {
        fn arc() -> Arc<Self> {
            Arc::new(Self {
                done: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
            })
        }
    }

    impl Subscriber for Counting {
        fn on_completed(&self) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _fault: Fault) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn forwards_first_terminal_then_releases() {
        let sink = Counting::arc();
        let released = Arc::new(AtomicUsize::new(0));
        let r = released.clone();
        let guard = TerminalGuard::new(
            sink.clone(),
            Subscription::from_fn(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }),
        );

        guard.on_completed();
        guard.on_error(Fault::msg("late"));
        guard.on_completed();

        assert_eq!(sink.done.load(Ordering::SeqCst), 1);
        assert_eq!(sink.failed.load(Ordering::SeqCst), 0);
        assert_eq!(released.load(Ordering::SeqCst), 1, "handle released once");
    }

    #[test]
    fn racing_terminals_deliver_exactly_once() {
        for _ in 0..64 {
            let sink = Counting::arc();
            let guard = Arc::new(TerminalGuard::new(sink.clone(), Subscription::noop()));

            let g1 = guard.clone();
            let g2 = guard.clone();
            let t1 = thread::spawn(move || g1.on_completed());
            let t2 = thread::spawn(move || g2.on_error(Fault::msg("race")));
            t1.join().unwrap();
            t2.join().unwrap();

            let total =
                sink.done.load(Ordering::SeqCst) + sink.failed.load(Ordering::SeqCst);
            assert_eq!(total, 1, "exactly one terminal must win the race");
        }
    }

    #[test]
    fn gate_claims_once_across_threads() {
        let gate = Arc::new(OnceGate::new());
        let wins = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let wins = wins.clone();
                thread::spawn(move || {
                    if gate.claim() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }
}
