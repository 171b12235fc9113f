//! Process-wide default scheduler for timed operators.
//!
//! `timer`, `timeout` and friends need a clock when the caller does not hand
//! one in. The default is a lazily started [`TimerScheduler`]; tests and
//! embedders may install their own before first use.
//!
//! ## Rules
//! - Installation is first-write-wins and only works before the default has
//!   been touched; later calls return `false` and change nothing.
//! - The installed scheduler lives for the rest of the process.

use std::sync::Arc;
use std::sync::OnceLock;

use super::{Scheduler, SchedulerRef, TimerScheduler};

static TIMER: OnceLock<SchedulerRef> = OnceLock::new();

/// Replaces the process-wide timer scheduler.
///
/// Returns `true` if the scheduler was installed, `false` if a default was
/// already in place (installed earlier, or materialized by a timed operator).
///
/// # Example
/// ```
/// use onesig::{schedulers, VirtualScheduler};
///
/// let clock = VirtualScheduler::new();
/// // First caller in the process wins; later calls are rejected.
/// let _ = schedulers::defaults::install_timer_scheduler(clock);
/// ```
pub fn install_timer_scheduler(scheduler: impl Scheduler) -> bool {
    TIMER.set(Arc::new(scheduler)).is_ok()
}

/// The process-wide timer scheduler, starting the built-in one on first use.
pub fn timer_scheduler() -> SchedulerRef {
    TIMER
        .get_or_init(|| Arc::new(TimerScheduler::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_stable_across_calls() {
        let a = timer_scheduler();
        let b = timer_scheduler();
        assert!(Arc::ptr_eq(&a, &b), "same instance on every call");
    }

    #[test]
    fn install_after_first_use_is_rejected() {
        let _ = timer_scheduler();
        let installed = install_timer_scheduler(crate::VirtualScheduler::new());
        assert!(!installed, "default was already materialized");
    }
}
