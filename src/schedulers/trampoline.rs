//! Thread-local trampoline: bounded-stack execution for re-entrant work.
//!
//! The first submission on a thread becomes the drain loop; everything
//! submitted while that loop is live is queued FIFO and run iteratively
//! after the current item returns. Deeply nested pipelines (a sequence
//! advancing through thousands of immediately-completing elements, chains
//! of nested sequences subscribing into each other) therefore use constant
//! call-stack depth.
//!
//! ```text
//! submit(a)            thread has no loop ──► start loop, run a
//!   a submits b        loop is live       ──► queue b, return to a
//!   a returns                             ──► loop pops b, runs b
//!   b submits c        loop is live       ──► queue c, ...
//! ```
//!
//! The subscribe scaffold and the sequencing operators use the engine
//! directly; [`TrampolineScheduler`] exposes the same engine through the
//! [`Scheduler`] contract.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::subscriptions::Subscription;

use super::{Continuation, RecursiveWork, Scheduler, Work};

thread_local! {
    static QUEUE: RefCell<Option<VecDeque<Work>>> = const { RefCell::new(None) };
}

/// Returns `true` while this thread is inside a trampoline drain loop.
pub(crate) fn is_active() -> bool {
    QUEUE.with(|q| q.borrow().is_some())
}

/// Runs `work` through the trampoline: inline (becoming the drain loop) when
/// none is active on this thread, queued otherwise.
pub(crate) fn run_or_enqueue(work: Work) {
    let work = QUEUE.with(|q| {
        let mut slot = q.borrow_mut();
        match slot.as_mut() {
            Some(queue) => {
                queue.push_back(work);
                None
            }
            None => {
                *slot = Some(VecDeque::new());
                Some(work)
            }
        }
    });
    let Some(work) = work else {
        return;
    };

    // This call owns the drain loop now; the guard clears the slot even if
    // an item panics, so the thread is not left with a stuck trampoline.
    let _guard = ActiveGuard;
    let mut current = Some(work);
    while let Some(item) = current.take() {
        item();
        current = QUEUE.with(|q| q.borrow_mut().as_mut().and_then(VecDeque::pop_front));
    }
}

struct ActiveGuard;

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        QUEUE.with(|q| *q.borrow_mut() = None);
    }
}

/// Starts a self-rescheduling step on the trampoline. Resuming from another
/// thread drains on that thread instead.
pub(crate) fn recurse(work: RecursiveWork) -> Subscription {
    let stop = Arc::new(AtomicBool::new(false));
    submit_step(work, stop.clone());
    Subscription::from_fn(move || stop.store(true, Ordering::Release))
}

fn submit_step(work: RecursiveWork, stop: Arc<AtomicBool>) {
    run_or_enqueue(Box::new(move || {
        if stop.load(Ordering::Acquire) {
            return;
        }
        let (re_work, re_stop) = (work.clone(), stop.clone());
        let cont = Continuation::new(Arc::new(move || {
            submit_step(re_work.clone(), re_stop.clone())
        }));
        work(&cont);
    }));
}

/// Scheduler over the thread-local trampoline engine.
///
/// Work runs on the submitting thread, FIFO within one drain loop. Delays
/// sleep inline in queue order, so prefer [`TimerScheduler`](super::TimerScheduler)
/// when mixing timed entries of different lengths.
#[derive(Clone, Copy, Default)]
pub struct TrampolineScheduler;

impl TrampolineScheduler {
    /// Creates the scheduler (stateless; the queue lives per thread).
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TrampolineScheduler {
    fn schedule(&self, work: Work) -> Subscription {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        run_or_enqueue(Box::new(move || {
            if !flag.load(Ordering::Acquire) {
                work();
            }
        }));
        Subscription::from_fn(move || stop.store(true, Ordering::Release))
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        run_or_enqueue(Box::new(move || {
            if flag.load(Ordering::Acquire) {
                return;
            }
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            if !flag.load(Ordering::Acquire) {
                work();
            }
        }));
        Subscription::from_fn(move || stop.store(true, Ordering::Release))
    }

    fn schedule_recursive(&self, work: RecursiveWork) -> Subscription {
        recurse(work)
    }
}
