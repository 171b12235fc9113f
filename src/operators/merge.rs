//! Fan-out: concurrent execution with an optional concurrency bound, plus
//! the eager `when_all` specialization.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Fault;
use crate::schedulers::trampoline;
use crate::signals::{Signal, Source};
use crate::subscribers::{Subscriber, SubscriberRef};
use crate::subscriptions::{OnceSlot, Subscription, SubscriptionSet};

pub(crate) fn merge_bounded<I>(sources: I, max_concurrent: usize) -> Signal
where
    I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
{
    Signal::from_arc(Arc::new(MergeSource {
        sources,
        max: max_concurrent.max(1),
    }))
}

pub(crate) fn when_all(sources: Vec<Signal>) -> Signal {
    Signal::from_arc(Arc::new(WhenAllSource { sources }))
}

struct MergeSource<I> {
    sources: I,
    max: usize,
}

impl<I> Source for MergeSource<I>
where
    I: IntoIterator<Item = Signal> + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
{
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let run = Arc::new(MergeRun {
            downstream: subscriber,
            max: self.max,
            state: Mutex::new(MergeState {
                rest: self.sources.clone().into_iter(),
                outstanding: 0,
                exhausted: false,
                stopped: false,
            }),
            children: SubscriptionSet::new(),
        });
        run.refill();

        let stop = run.clone();
        Subscription::from_fn(move || {
            stop.state.lock().stopped = true;
            stop.children.cancel();
        })
    }

    // Refills re-subscribe as slots free up; attach establishes the
    // trampoline so bound-1 chains of inline elements stay flat.
    fn subscribes_on_caller(&self) -> bool {
        true
    }
}

struct MergeState<It> {
    rest: It,
    outstanding: usize,
    exhausted: bool,
    stopped: bool,
}

struct MergeRun<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    downstream: SubscriberRef,
    max: usize,
    state: Mutex<MergeState<It>>,
    children: SubscriptionSet,
}

enum Step {
    Launch(Signal),
    Complete,
    Idle,
}

impl<It> MergeRun<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    /// Pulls elements until the bound is reached, the sequence ends, or the
    /// run stops. Decisions under the lock, subscriptions outside it.
    fn refill(self: &Arc<Self>) {
        loop {
            let step = {
                let mut st = self.state.lock();
                if st.stopped || st.outstanding >= self.max {
                    Step::Idle
                } else if st.exhausted {
                    if st.outstanding == 0 {
                        st.stopped = true;
                        Step::Complete
                    } else {
                        Step::Idle
                    }
                } else {
                    match st.rest.next() {
                        Some(element) => {
                            st.outstanding += 1;
                            Step::Launch(element)
                        }
                        None => {
                            st.exhausted = true;
                            if st.outstanding == 0 {
                                st.stopped = true;
                                Step::Complete
                            } else {
                                Step::Idle
                            }
                        }
                    }
                }
            };
            match step {
                Step::Launch(element) => self.launch(element),
                Step::Complete => {
                    self.downstream.on_completed();
                    return;
                }
                Step::Idle => return,
            }
        }
    }

    /// Registers the child before subscribing, so a synchronously-terminating
    /// child can already deregister itself by key.
    fn launch(self: &Arc<Self>, element: Signal) {
        let slot = OnceSlot::new();
        let key = match self.children.add(slot.subscription()) {
            Some(key) => key,
            None => return,
        };
        let link: SubscriberRef = Arc::new(MergeLink {
            run: self.clone(),
            key,
        });
        slot.set(element.subscribe_ref(link));
    }
}

struct MergeLink<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    run: Arc<MergeRun<It>>,
    key: u64,
}

impl<It> Subscriber for MergeLink<It>
where
    It: Iterator<Item = Signal> + Send + 'static,
{
    fn on_completed(&self) {
        enum AfterChild {
            Complete,
            Refill,
            Quiet,
        }

        self.run.children.remove(self.key);
        let outcome = {
            let mut st = self.run.state.lock();
            st.outstanding -= 1;
            if st.stopped {
                AfterChild::Quiet
            } else if st.exhausted && st.outstanding == 0 {
                st.stopped = true;
                AfterChild::Complete
            } else {
                AfterChild::Refill
            }
        };
        match outcome {
            AfterChild::Complete => self.run.downstream.on_completed(),
            AfterChild::Refill => {
                // A slot freed up; pull the next element off-stack.
                let run = self.run.clone();
                trampoline::run_or_enqueue(Box::new(move || run.refill()));
            }
            AfterChild::Quiet => {}
        }
    }

    fn on_error(&self, fault: Fault) {
        self.run.children.remove(self.key);
        let first = {
            let mut st = self.run.state.lock();
            st.outstanding = st.outstanding.saturating_sub(1);
            if st.stopped {
                false
            } else {
                st.stopped = true;
                true
            }
        };
        if first {
            self.run.downstream.on_error(fault);
            self.run.children.cancel();
        }
    }
}

struct WhenAllSource {
    sources: Vec<Signal>,
}

impl Source for WhenAllSource {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let total = self.sources.len();
        if total == 0 {
            subscriber.on_completed();
            return Subscription::noop();
        }

        let run = Arc::new(WhenAllRun {
            downstream: subscriber,
            remaining: AtomicUsize::new(total),
            stopped: AtomicBool::new(false),
            children: SubscriptionSet::new(),
        });

        for element in &self.sources {
            // An early failure already settled the outcome.
            if run.stopped.load(Ordering::Acquire) {
                break;
            }
            let slot = OnceSlot::new();
            let key = match run.children.add(slot.subscription()) {
                Some(key) => key,
                None => break,
            };
            let link: SubscriberRef = Arc::new(WhenAllLink {
                run: run.clone(),
                key,
            });
            slot.set(element.subscribe_ref(link));
        }

        let stop = run.clone();
        Subscription::from_fn(move || {
            stop.stopped.store(true, Ordering::Release);
            stop.children.cancel();
        })
    }
}

struct WhenAllRun {
    downstream: SubscriberRef,
    remaining: AtomicUsize,
    stopped: AtomicBool,
    children: SubscriptionSet,
}

struct WhenAllLink {
    run: Arc<WhenAllRun>,
    key: u64,
}

impl Subscriber for WhenAllLink {
    fn on_completed(&self) {
        self.run.children.remove(self.key);
        let last = self.run.remaining.fetch_sub(1, Ordering::AcqRel) == 1;
        if last && !self.run.stopped.swap(true, Ordering::AcqRel) {
            self.run.downstream.on_completed();
        }
    }

    fn on_error(&self, fault: Fault) {
        self.run.children.remove(self.key);
        self.run.remaining.fetch_sub(1, Ordering::AcqRel);
        if !self.run.stopped.swap(true, Ordering::AcqRel) {
            self.run.downstream.on_error(fault);
            self.run.children.cancel();
        }
    }
}
