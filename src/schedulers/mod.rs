//! Execution contexts for signal work.
//!
//! Sources never spawn or sleep on their own; anything that must run later,
//! elsewhere, or repeatedly goes through the [`Scheduler`] contract. That
//! keeps operators deterministic under test (swap in [`VirtualScheduler`])
//! and portable across runtimes (feature `tokio` adds a runtime-backed one).
//!
//! ## Contents
//! - [`Scheduler`], [`SchedulerRef`] the contract + shared reference
//! - [`InlineScheduler`] run on the caller, delays block
//! - [`TrampolineScheduler`] thread-local FIFO queue, bounded call stack
//! - [`TimerScheduler`] dedicated worker thread with a due-time heap
//! - [`VirtualScheduler`] manually advanced test clock
//! - [`defaults`] process-wide default for scheduler-less timed operators
//!
//! ## Quick reference
//! - `schedule` — run as soon as the context allows.
//! - `schedule_after` — run once the delay elapses; the returned handle
//!   cancels a not-yet-started entry.
//! - `schedule_recursive` — run a self-rescheduling step; resuming via the
//!   provided [`Continuation`] never grows the call stack, no matter how
//!   many times the step re-arms itself.
//! - `now` — the scheduler's clock, used for absolute-deadline math.

mod inline;
mod timer;
mod virtual_time;

pub(crate) mod trampoline;

pub mod defaults;

pub use inline::InlineScheduler;
pub use timer::TimerScheduler;
pub use trampoline::TrampolineScheduler;
pub use virtual_time::VirtualScheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::subscriptions::Subscription;

/// One-shot unit of scheduled work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Step function for [`Scheduler::schedule_recursive`]: call
/// [`Continuation::resume`] to run the step again.
pub type RecursiveWork = Arc<dyn Fn(&Continuation) + Send + Sync + 'static>;

/// Re-arms the step it was handed to.
///
/// Cloneable and thread-safe: a step may stash the continuation and resume
/// from a callback on another thread; the next run happens wherever the
/// owning scheduler places it.
#[derive(Clone)]
pub struct Continuation {
    resume: Arc<dyn Fn() + Send + Sync + 'static>,
}

impl Continuation {
    /// Builds a continuation from the scheduler's re-arm action.
    pub fn new(resume: Arc<dyn Fn() + Send + Sync + 'static>) -> Self {
        Self { resume }
    }

    /// Schedules the associated step to run again.
    pub fn resume(&self) {
        (self.resume)();
    }
}

/// Where and when signal work executes.
///
/// Implementations decide the thread and the clock; operators only rely on
/// the contract above. All methods return a handle that cancels work which
/// has not started yet (cancelling started work is a no-op).
pub trait Scheduler: Send + Sync + 'static {
    /// Runs `work` as soon as this scheduler allows.
    fn schedule(&self, work: Work) -> Subscription;

    /// Runs `work` once `delay` has elapsed on this scheduler's clock.
    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription;

    /// Runs a self-rescheduling step with bounded stack growth.
    fn schedule_recursive(&self, work: RecursiveWork) -> Subscription;

    /// This scheduler's notion of the current time.
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Shared reference to a scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;

impl<S> Scheduler for Arc<S>
where
    S: Scheduler + ?Sized,
{
    fn schedule(&self, work: Work) -> Subscription {
        (**self).schedule(work)
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        (**self).schedule_after(delay, work)
    }

    fn schedule_recursive(&self, work: RecursiveWork) -> Subscription {
        (**self).schedule_recursive(work)
    }

    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Drives `schedule_recursive` for queue-backed schedulers: every step and
/// every resume goes through `schedule`, so the stack never grows with the
/// number of iterations.
pub(crate) fn recurse_via<S>(scheduler: &S, work: RecursiveWork) -> Subscription
where
    S: Scheduler + Clone,
{
    let driver = Arc::new(RecursiveDriver {
        scheduler: scheduler.clone(),
        work,
        stop: AtomicBool::new(false),
    });
    driver.spin();
    Subscription::from_fn(move || driver.stop.store(true, Ordering::Release))
}

struct RecursiveDriver<S>
where
    S: Scheduler + Clone,
{
    scheduler: S,
    work: RecursiveWork,
    stop: AtomicBool,
}

impl<S> RecursiveDriver<S>
where
    S: Scheduler + Clone,
{
    fn spin(self: &Arc<Self>) {
        if self.stop.load(Ordering::Acquire) {
            return;
        }
        let me = self.clone();
        self.scheduler.schedule(Box::new(move || {
            if me.stop.load(Ordering::Acquire) {
                return;
            }
            let re_arm = me.clone();
            let cont = Continuation::new(Arc::new(move || re_arm.spin()));
            (me.work)(&cont);
        }));
    }
}
