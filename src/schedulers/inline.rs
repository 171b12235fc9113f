//! Caller-thread scheduler: no queue, no worker, no deferral.

use std::time::Duration;

use crate::subscriptions::Subscription;

use super::{trampoline, RecursiveWork, Scheduler, Work};

/// Runs everything on the calling thread, immediately.
///
/// `schedule_after` **blocks the caller** for the whole delay; use it only
/// where that is the point (simple scripts, tests of short delays). Recursive
/// work still goes through the trampoline, because bounded stack growth is
/// part of the contract regardless of execution context.
#[derive(Clone, Copy, Default)]
pub struct InlineScheduler;

impl InlineScheduler {
    /// Creates the scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for InlineScheduler {
    fn schedule(&self, work: Work) -> Subscription {
        work();
        Subscription::noop()
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        work();
        Subscription::noop()
    }

    fn schedule_recursive(&self, work: RecursiveWork) -> Subscription {
        trampoline::recurse(work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn schedule_runs_before_returning() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        InlineScheduler::new().schedule(Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn schedule_after_blocks_for_the_delay() {
        let started = Instant::now();
        InlineScheduler::new().schedule_after(Duration::from_millis(20), Box::new(|| {}));
        assert!(
            started.elapsed() >= Duration::from_millis(20),
            "inline delays block the caller"
        );
    }
}
