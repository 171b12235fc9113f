//! Failure recovery: typed catch, fallback chains, and swallowing.

use std::error::Error as StdError;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Fault;
use crate::schedulers::trampoline;
use crate::signals::{Signal, Source};
use crate::subscribers::{Subscriber, SubscriberRef};
use crate::subscriptions::{Subscription, SwapSlot};

pub(crate) fn catch<E, F>(upstream: Signal, handler: F) -> Signal
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) -> Signal + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(CatchSource {
        upstream,
        handler: Arc::new(handler),
        _marker: PhantomData,
    }))
}

pub(crate) fn fallback_chain<I>(sources: I) -> Signal
where
    I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
{
    Signal::from_arc(Arc::new(ChainSource { sources }))
}

pub(crate) fn catch_ignore(upstream: Signal) -> Signal {
    Signal::from_arc(Arc::new(IgnoreSource { upstream }))
}

pub(crate) fn catch_ignore_with<E, F>(upstream: Signal, hook: F) -> Signal
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    Signal::from_arc(Arc::new(IgnoreWithSource {
        upstream,
        hook: Arc::new(hook),
        _marker: PhantomData,
    }))
}

struct CatchSource<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) -> Signal + Send + Sync + 'static,
{
    upstream: Signal,
    handler: Arc<F>,
    _marker: PhantomData<fn(&E)>,
}

impl<E, F> Source for CatchSource<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) -> Signal + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        // Serial slot: upstream first, the replacement takes its place.
        let slot = SwapSlot::new();
        let observer: SubscriberRef = Arc::new(CatchObserver {
            downstream: subscriber,
            handler: self.handler.clone(),
            slot: slot.clone(),
            _marker: PhantomData::<fn(&E)>,
        });
        slot.set(self.upstream.subscribe_ref(observer));
        slot.subscription()
    }
}

struct CatchObserver<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) -> Signal + Send + Sync + 'static,
{
    downstream: SubscriberRef,
    handler: Arc<F>,
    slot: SwapSlot,
    _marker: PhantomData<fn(&E)>,
}

impl<E, F> Subscriber for CatchObserver<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) -> Signal + Send + Sync + 'static,
{
    fn on_completed(&self) {
        self.downstream.on_completed();
    }

    fn on_error(&self, fault: Fault) {
        match fault.downcast_ref::<E>() {
            Some(typed) => {
                // The replacement reports straight to the downstream; its own
                // failure is not re-caught here.
                let replacement = (self.handler)(typed);
                self.slot.set(replacement.subscribe_ref(self.downstream.clone()));
            }
            None => self.downstream.on_error(fault),
        }
    }
}

struct ChainSource<I> {
    sources: I,
}

impl<I> Source for ChainSource<I>
where
    I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let run = Arc::new(ChainRun {
            downstream: subscriber,
            state: Mutex::new(ChainState {
                rest: self.sources.clone().into_iter(),
                last_fault: None,
            }),
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

    fn subscribes_on_caller(&self) -> bool {
        true
    }
}

struct ChainState<It> {
    rest: It,
    last_fault: Option<Fault>,
}

/// One subscription's walk along the fallbacks: failures advance, the first
/// success stops, exhaustion replays the most recent failure.
struct ChainRun<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    downstream: SubscriberRef,
    state: Mutex<ChainState<It>>,
    stopped: AtomicBool,
    current: SwapSlot,
}

impl<It> ChainRun<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    fn step(self: &Arc<Self>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let next = self.state.lock().rest.next();
        match next {
            Some(element) => {
                let link: SubscriberRef = Arc::new(ChainLink { run: self.clone() });
                self.current.set(element.subscribe_ref(link));
            }
            None => {
                if !self.stopped.swap(true, Ordering::AcqRel) {
                    let last = self.state.lock().last_fault.take();
                    match last {
                        Some(fault) => self.downstream.on_error(fault),
                        None => self.downstream.on_completed(),
                    }
                }
            }
        }
    }
}

struct ChainLink<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    run: Arc<ChainRun<It>>,
}

impl<It> Subscriber for ChainLink<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    fn on_completed(&self) {
        if !self.run.stopped.swap(true, Ordering::AcqRel) {
            self.run.downstream.on_completed();
        }
    }

    fn on_error(&self, fault: Fault) {
        self.run.state.lock().last_fault = Some(fault);
        let run = self.run.clone();
        trampoline::run_or_enqueue(Box::new(move || run.step()));
    }
}

struct IgnoreSource {
    upstream: Signal,
}

impl Source for IgnoreSource {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        self.upstream.subscribe_ref(Arc::new(IgnoreObserver {
            downstream: subscriber,
        }))
    }
}

struct IgnoreObserver {
    downstream: SubscriberRef,
}

impl Subscriber for IgnoreObserver {
    fn on_completed(&self) {
        self.downstream.on_completed();
    }

    fn on_error(&self, _fault: Fault) {
        self.downstream.on_completed();
    }
}

struct IgnoreWithSource<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    upstream: Signal,
    hook: Arc<F>,
    _marker: PhantomData<fn(&E)>,
}

impl<E, F> Source for IgnoreWithSource<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        self.upstream.subscribe_ref(Arc::new(IgnoreWithObserver {
            downstream: subscriber,
            hook: self.hook.clone(),
            _marker: PhantomData::<fn(&E)>,
        }))
    }
}

struct IgnoreWithObserver<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    downstream: SubscriberRef,
    hook: Arc<F>,
    _marker: PhantomData<fn(&E)>,
}

impl<E, F> Subscriber for IgnoreWithObserver<E, F>
where
    E: StdError + Send + Sync + 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    fn on_completed(&self) {
        self.downstream.on_completed();
    }

    fn on_error(&self, fault: Fault) {
        match fault.downcast_ref::<E>() {
            Some(typed) => {
                (self.hook)(typed);
                self.downstream.on_completed();
            }
            None => self.downstream.on_error(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SignalError;
    use std::sync::atomic::AtomicUsize;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("quota exhausted for {tenant}")]
    struct QuotaError {
        tenant: &'static str,
    }

    fn counting_terminals(signal: &Signal) -> (Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let done = Arc::new(AtomicUsize::new(0));
        let faults = Arc::new(Mutex::new(Vec::new()));
        let d = done.clone();
        let f = faults.clone();
        signal.subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            move |fault| {
                f.lock().push(fault.to_string());
            },
        );
        (done, faults)
    }

    #[test]
    fn matching_fault_switches_to_the_replacement() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let recovered = Signal::fail(Fault::new(QuotaError { tenant: "acme" }))
            .catch(move |e: &QuotaError| {
                assert_eq!(e.tenant, "acme", "handler sees the typed error");
                c.fetch_add(1, Ordering::SeqCst);
                Signal::empty()
            });

        let (done, faults) = counting_terminals(&recovered);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(faults.lock().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_matching_fault_passes_through() {
        let recovered = Signal::fail(Fault::msg("unrelated"))
            .catch(|_e: &QuotaError| Signal::empty());

        let (done, faults) = counting_terminals(&recovered);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(&*faults.lock(), &["unrelated"], "fault forwarded unchanged");
    }

    #[test]
    fn completion_never_consults_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let recovered = Signal::empty().catch(move |_e: &QuotaError| {
            c.fetch_add(1, Ordering::SeqCst);
            Signal::empty()
        });

        let (done, _) = counting_terminals(&recovered);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn replacement_failure_is_not_recaught() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let recovered = Signal::fail(Fault::new(QuotaError { tenant: "acme" }))
            .catch(move |_e: &QuotaError| {
                c.fetch_add(1, Ordering::SeqCst);
                Signal::fail(Fault::new(QuotaError { tenant: "acme-retry" }))
            });

        let (done, faults) = counting_terminals(&recovered);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(
            &*faults.lock(),
            &["quota exhausted for acme-retry"],
            "second failure reaches downstream"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1, "handler ran once, not twice");
    }

    #[test]
    fn fallback_chain_stops_at_the_first_success() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let p = pulls.clone();
        let chain = (0u32..5).map(move |i| {
            p.fetch_add(1, Ordering::SeqCst);
            if i < 2 {
                Signal::fail(Fault::msg("down"))
            } else {
                Signal::empty()
            }
        });

        let (done, faults) = counting_terminals(&Signal::fallback_chain(chain));
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(faults.lock().is_empty(), "intermediate failures are absorbed");
        assert_eq!(pulls.load(Ordering::SeqCst), 3, "nothing pulled past the success");
    }

    #[test]
    fn exhausted_chain_replays_the_last_failure() {
        let chain = vec![
            Signal::fail(Fault::msg("first down")),
            Signal::fail(Fault::msg("second down")),
        ];
        let (done, faults) = counting_terminals(&Signal::fallback_chain(chain));
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(&*faults.lock(), &["second down"], "last failure wins");
    }

    #[test]
    fn empty_chain_completes() {
        let (done, faults) = counting_terminals(&Signal::fallback_chain(Vec::<Signal>::new()));
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(faults.lock().is_empty());
    }

    #[test]
    fn long_failing_chain_is_stack_safe() {
        let chain: Vec<Signal> = (0..100_000)
            .map(|_| Signal::fail(Fault::msg("down")))
            .collect();
        let (done, faults) = counting_terminals(&Signal::fallback_chain(chain));
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(faults.lock().len(), 1, "one terminal for the whole chain");
    }

    #[test]
    fn catch_ignore_swallows_any_failure() {
        let (done, faults) = counting_terminals(&Signal::fail(Fault::msg("noise")).catch_ignore());
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(faults.lock().is_empty());
    }

    #[test]
    fn catch_ignore_with_runs_the_hook_for_matches_only() {
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        let matching = Signal::fail(SignalError::Failure {
            message: "transient".into(),
        })
        .catch_ignore_with(move |_e: &SignalError| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        let (done, faults) = counting_terminals(&matching);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(faults.lock().is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let s = seen.clone();
        let foreign = Signal::fail(Fault::new(QuotaError { tenant: "acme" }))
            .catch_ignore_with(move |_e: &SignalError| {
                s.fetch_add(1, Ordering::SeqCst);
            });
        let (done, faults) = counting_terminals(&foreign);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(faults.lock().len(), 1, "foreign fault propagates");
        assert_eq!(seen.load(Ordering::SeqCst), 1, "hook untouched by the mismatch");
    }
}
