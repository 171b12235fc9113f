//! Dedicated-thread timer scheduler.
//!
//! One worker thread owns a min-heap of `(due, seq)` entries and parks on a
//! condvar until the earliest deadline. Entries submitted with equal due
//! times run in submission order. The worker shuts down when the last
//! scheduler handle is dropped.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::subscriptions::Subscription;

use super::{recurse_via, RecursiveWork, Scheduler, Work};

/// Real-time scheduler backed by a single worker thread.
///
/// The default choice for timed operators outside a runtime: delays do not
/// block the caller, cancellation drops not-yet-due entries, and all work
/// runs sequentially on the worker.
///
/// # Example
/// ```
/// use onesig::{Signal, TimerScheduler};
/// use std::time::Duration;
///
/// let timers = TimerScheduler::new();
/// let done = Signal::timer_on(Duration::from_millis(5), timers).wait();
/// assert!(done.is_ok());
/// ```
#[derive(Clone)]
pub struct TimerScheduler {
    inner: Arc<TimerInner>,
    // Dropped with the last handle; tells the worker to exit.
    _shutdown: Arc<ShutdownGuard>,
}

struct TimerInner {
    state: Mutex<TimerState>,
    cv: Condvar,
}

struct TimerState {
    queue: BinaryHeap<Entry>,
    seq: u64,
    shutdown: bool,
}

struct Entry {
    due: Instant,
    seq: u64,
    work: Work,
    cancelled: Arc<AtomicBool>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed: BinaryHeap is a max-heap, we want the earliest entry on top.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct ShutdownGuard {
    inner: Arc<TimerInner>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.inner.state.lock().shutdown = true;
        self.inner.cv.notify_one();
    }
}

impl TimerScheduler {
    /// Spawns the worker thread and returns a handle to it.
    pub fn new() -> Self {
        let inner = Arc::new(TimerInner {
            state: Mutex::new(TimerState {
                queue: BinaryHeap::new(),
                seq: 0,
                shutdown: false,
            }),
            cv: Condvar::new(),
        });

        let worker = inner.clone();
        thread::spawn(move || worker_loop(worker));

        Self {
            _shutdown: Arc::new(ShutdownGuard {
                inner: inner.clone(),
            }),
            inner,
        }
    }

    fn push(&self, due: Instant, work: Work) -> Subscription {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut st = self.inner.state.lock();
            let seq = st.seq;
            st.seq += 1;
            st.queue.push(Entry {
                due,
                seq,
                work,
                cancelled: cancelled.clone(),
            });
        }
        self.inner.cv.notify_one();
        Subscription::from_fn(move || cancelled.store(true, Ordering::Release))
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TimerScheduler {
    fn schedule(&self, work: Work) -> Subscription {
        self.push(Instant::now(), work)
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        self.push(Instant::now() + delay, work)
    }

    fn schedule_recursive(&self, work: RecursiveWork) -> Subscription {
        recurse_via(self, work)
    }
}

fn worker_loop(inner: Arc<TimerInner>) {
    enum Next {
        Run(Entry),
        Sleep(Instant),
        Park,
    }

    let mut guard = inner.state.lock();
    loop {
        if guard.shutdown {
            return;
        }
        let next = match guard.queue.peek() {
            Some(entry) if entry.due <= Instant::now() => match guard.queue.pop() {
                Some(entry) => Next::Run(entry),
                None => Next::Park,
            },
            Some(entry) => Next::Sleep(entry.due),
            None => Next::Park,
        };
        match next {
            Next::Run(entry) => {
                if entry.cancelled.load(Ordering::Acquire) {
                    continue;
                }
                // User work runs unlocked; it may schedule more entries.
                MutexGuard::unlocked(&mut guard, entry.work);
            }
            Next::Sleep(due) => {
                inner.cv.wait_until(&mut guard, due);
            }
            Next::Park => {
                inner.cv.wait(&mut guard);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    #[test]
    fn fires_after_the_delay() {
        let sched = TimerScheduler::new();
        let (tx, rx) = mpsc::channel();

        sched.schedule_after(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        assert!(
            rx.recv_timeout(Duration::from_secs(2)).is_ok(),
            "timer entry must fire"
        );
    }

    #[test]
    fn entries_run_in_due_order() {
        let sched = TimerScheduler::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        let o = order.clone();
        sched.schedule_after(
            Duration::from_millis(40),
            Box::new(move || {
                o.lock().push(2);
                let _ = tx.send(());
            }),
        );
        let o = order.clone();
        sched.schedule_after(
            Duration::from_millis(10),
            Box::new(move || {
                o.lock().push(1);
            }),
        );

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(*order.lock(), vec![1, 2], "earlier deadline runs first");
    }

    #[test]
    fn cancellation_drops_pending_entries() {
        let sched = TimerScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let r = ran.clone();
        let sub = sched.schedule_after(
            Duration::from_millis(30),
            Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }),
        );
        sub.cancel();

        thread::sleep(Duration::from_millis(80));
        assert_eq!(ran.load(Ordering::SeqCst), 0, "cancelled entry must not run");
    }

    #[test]
    fn immediate_work_runs_on_the_worker() {
        let sched = TimerScheduler::new();
        let (tx, rx) = mpsc::channel();

        let caller = thread::current().id();
        sched.schedule(Box::new(move || {
            let _ = tx.send(thread::current().id() != caller);
        }));

        assert!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            "work must run off the calling thread"
        );
    }
}
