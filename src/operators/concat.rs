//! Sequencing: one element live at a time, advance on success, fail fast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Fault;
use crate::schedulers::trampoline;
use crate::signals::{Signal, Source};
use crate::subscribers::{Subscriber, SubscriberRef};
use crate::subscriptions::{Subscription, SwapSlot};

pub(crate) fn concat<I>(sources: I) -> Signal
where
    I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
{
    Signal::from_arc(Arc::new(ConcatSource { sources }))
}

struct ConcatSource<I> {
    sources: I,
}

impl<I> Source for ConcatSource<I>
where
    I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let run = Arc::new(ConcatRun {
            downstream: subscriber,
            rest: Mutex::new(self.sources.clone().into_iter()),
            stopped: AtomicBool::new(false),
            current: SwapSlot::new(),
        });
        run.step();

        let stop = run.clone();
        Subscription::from_fn(move || {
            stop.stopped.store(true, Ordering::Release);
            stop.current.cancel();
        })
    }

    // Advancing re-subscribes recursively; attach must queue on the
    // caller-thread trampoline.
    fn subscribes_on_caller(&self) -> bool {
        true
    }
}

/// One subscription's progress through the sequence.
///
/// The iterator is pulled one element per step, never ahead: after a failure
/// or a cancel the remainder stays untouched.
struct ConcatRun<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    downstream: SubscriberRef,
    rest: Mutex<It>,
    stopped: AtomicBool,
    current: SwapSlot,
}

impl<It> ConcatRun<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    fn step(self: &Arc<Self>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let next = self.rest.lock().next();
        match next {
            Some(element) => {
                let link: SubscriberRef = Arc::new(ElementLink { run: self.clone() });
                self.current.set(element.subscribe_ref(link));
            }
            None => {
                if !self.stopped.swap(true, Ordering::AcqRel) {
                    self.downstream.on_completed();
                }
            }
        }
    }
}

/// Per-element subscriber: success advances, failure short-circuits.
struct ElementLink<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    run: Arc<ConcatRun<It>>,
}

impl<It> Subscriber for ElementLink<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    fn on_completed(&self) {
        // Queue the advance so chains of inline-completing elements unwind
        // in the trampoline instead of on the call stack.
        let run = self.run.clone();
        trampoline::run_or_enqueue(Box::new(move || run.step()));
    }

    fn on_error(&self, fault: Fault) {
        if !self.run.stopped.swap(true, Ordering::AcqRel) {
            self.run.downstream.on_error(fault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Latch;
    use std::sync::atomic::AtomicUsize;

    fn record(order: &Arc<Mutex<Vec<u32>>>, id: u32) -> Signal {
        let order = order.clone();
        Signal::create(move |subscriber| {
            order.lock().push(id);
            subscriber.on_completed();
            Subscription::noop()
        })
    }

    #[test]
    fn runs_elements_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        Signal::concat(vec![
            record(&order, 1),
            record(&order, 2),
            record(&order, 3),
        ])
        .subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        assert_eq!(*order.lock(), vec![1, 2, 3]);
        assert_eq!(done.load(Ordering::SeqCst), 1, "one completion for the whole chain");
    }

    #[test]
    fn empty_sequence_completes_immediately() {
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        Signal::concat(Vec::<Signal>::new()).subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_short_circuits_and_stops_pulling() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));

        let p = pulls.clone();
        let elements = (0u32..5).map(move |i| {
            p.fetch_add(1, Ordering::SeqCst);
            if i == 1 {
                Signal::fail(Fault::msg("second step broke"))
            } else {
                Signal::empty()
            }
        });

        let f = failures.clone();
        Signal::concat(elements).subscribe_fn(
            || {},
            move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(
            pulls.load(Ordering::SeqCst),
            2,
            "the remainder is never pulled after a failure"
        );
    }

    #[test]
    fn long_chain_runs_in_constant_stack() {
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();

        let chain: Vec<Signal> = (0..100_000).map(|_| Signal::empty()).collect();
        Signal::concat(chain).subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_releases_in_flight_and_stops_advancing() {
        let released = Arc::new(AtomicBool::new(false));
        let pulls_after = Arc::new(AtomicUsize::new(0));

        let r = released.clone();
        let pending = Signal::create(move |_subscriber| {
            let r = r.clone();
            Subscription::from_fn(move || r.store(true, Ordering::SeqCst))
        });
        let p = pulls_after.clone();
        let counted = Signal::create(move |subscriber| {
            p.fetch_add(1, Ordering::SeqCst);
            subscriber.on_completed();
            Subscription::noop()
        });

        let sub = Signal::concat(vec![pending, counted]).subscribe_fn(|| {}, |_| {});
        sub.cancel();

        assert!(released.load(Ordering::SeqCst), "in-flight element released");
        assert_eq!(pulls_after.load(Ordering::SeqCst), 0, "no further elements");
    }

    #[test]
    fn then_hands_off_between_latches() {
        let first = Latch::new();
        let second = Latch::new();
        let done = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        first
            .signal()
            .then(second.signal())
            .subscribe_fn(
                move || {
                    d.fetch_add(1, Ordering::SeqCst);
                },
                |_| {},
            );

        assert_eq!(first.subscriber_count(), 1, "first step is live");
        assert!(!second.has_subscribers(), "second step not reached yet");

        first.complete();
        assert!(!first.has_subscribers(), "first step released after hand-off");
        assert_eq!(second.subscriber_count(), 1, "hand-off subscribed the second step");
        assert_eq!(done.load(Ordering::SeqCst), 0);

        second.complete();
        assert_eq!(done.load(Ordering::SeqCst), 1, "whole chain completed once");

        // Latches stay terminal; completing again changes nothing.
        first.complete();
        second.complete();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn then_with_builds_continuation_lazily() {
        let gate = Latch::new();
        let builds = Arc::new(AtomicUsize::new(0));

        let b = builds.clone();
        gate.signal()
            .then_with(move || {
                b.fetch_add(1, Ordering::SeqCst);
                Signal::empty()
            })
            .subscribe_fn(|| {}, |_| {});

        assert_eq!(builds.load(Ordering::SeqCst), 0, "not built before the first part ends");
        gate.complete();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
