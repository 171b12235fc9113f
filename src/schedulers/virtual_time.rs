//! Manually advanced clock for deterministic tests.
//!
//! Nothing runs when work is submitted; entries queue up against a virtual
//! timeline and fire in `(due, seq)` order while the caller advances it.
//! Timed operators become fully deterministic: a deadline of 10 ticks fires
//! after exactly 10 ticks, never "about 10ms later".

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::subscriptions::Subscription;

use super::{recurse_via, RecursiveWork, Scheduler, Work};

/// Virtual-time scheduler.
///
/// Cloneable; clones share the same timeline. `now()` reports a synthetic
/// `Instant` (a fixed base plus the virtual elapsed time), so absolute
/// deadlines and relative delays both work against the virtual clock.
///
/// # Example
/// ```
/// use onesig::{Scheduler, VirtualScheduler};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = VirtualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
///
/// let f = fired.clone();
/// clock.schedule_after(Duration::from_millis(10), Box::new(move || {
///     f.store(true, Ordering::SeqCst);
/// }));
///
/// clock.advance_by(Duration::from_millis(9));
/// assert!(!fired.load(Ordering::SeqCst), "one tick early");
///
/// clock.advance_by(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst), "fires exactly on the tick");
/// ```
#[derive(Clone)]
pub struct VirtualScheduler {
    inner: Arc<VirtualInner>,
}

struct VirtualInner {
    state: Mutex<VirtualState>,
}

struct VirtualState {
    queue: BinaryHeap<VEntry>,
    seq: u64,
    elapsed: Duration,
    base: Instant,
}

struct VEntry {
    due: Duration,
    seq: u64,
    work: Work,
    cancelled: Arc<AtomicBool>,
}

impl PartialEq for VEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for VEntry {}

impl PartialOrd for VEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for VEntry {
    // Reversed for min-heap behavior on BinaryHeap.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl VirtualScheduler {
    /// Creates a clock at virtual time zero.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(VirtualInner {
                state: Mutex::new(VirtualState {
                    queue: BinaryHeap::new(),
                    seq: 0,
                    elapsed: Duration::ZERO,
                    base: Instant::now(),
                }),
            }),
        }
    }

    /// Moves the clock forward by `d`, running every entry that falls due.
    ///
    /// Entries run outside the internal lock in `(due, seq)` order, with the
    /// clock set to each entry's due time while it runs. Work submitted
    /// during the advance joins the same pass when it falls within `d`.
    pub fn advance_by(&self, d: Duration) {
        let target = self.inner.state.lock().elapsed + d;
        loop {
            let job = {
                let mut st = self.inner.state.lock();
                let next_due = st.queue.peek().map(|e| e.due);
                match next_due {
                    Some(due) if due <= target => match st.queue.pop() {
                        Some(entry) => {
                            st.elapsed = st.elapsed.max(entry.due);
                            if entry.cancelled.load(Ordering::Acquire) {
                                None
                            } else {
                                Some(entry.work)
                            }
                        }
                        None => None,
                    },
                    _ => {
                        st.elapsed = st.elapsed.max(target);
                        break;
                    }
                }
            };
            if let Some(work) = job {
                work();
            }
        }
    }

    /// Moves the clock forward to the absolute virtual time `elapsed`.
    pub fn advance_to(&self, elapsed: Duration) {
        let step = {
            let st = self.inner.state.lock();
            elapsed.saturating_sub(st.elapsed)
        };
        self.advance_by(step);
    }

    /// Virtual time since creation.
    pub fn elapsed(&self) -> Duration {
        self.inner.state.lock().elapsed
    }

    /// Number of live (not cancelled) queued entries.
    pub fn pending(&self) -> usize {
        self.inner
            .state
            .lock()
            .queue
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::Acquire))
            .count()
    }

    fn push(&self, due_in: Duration, work: Work) -> Subscription {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut st = self.inner.state.lock();
            let due = st.elapsed + due_in;
            let seq = st.seq;
            st.seq += 1;
            st.queue.push(VEntry {
                due,
                seq,
                work,
                cancelled: cancelled.clone(),
            });
        }
        Subscription::from_fn(move || cancelled.store(true, Ordering::Release))
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule(&self, work: Work) -> Subscription {
        self.push(Duration::ZERO, work)
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        self.push(delay, work)
    }

    fn schedule_recursive(&self, work: RecursiveWork) -> Subscription {
        recurse_via(self, work)
    }

    fn now(&self) -> Instant {
        let st = self.inner.state.lock();
        st.base + st.elapsed
    }
}
