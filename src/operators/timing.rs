//! Delay-based completion and deadline racing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Fault, SignalError};
use crate::schedulers::{defaults, SchedulerRef};
use crate::signals::{Signal, Source};
use crate::subscribers::{Subscriber, SubscriberRef};
use crate::subscriptions::{OnceSlot, Subscription};

/// When a timed operator fires, relative to the scheduler's clock.
#[derive(Clone, Copy)]
pub(crate) enum Due {
    After(Duration),
    At(Instant),
}

impl Due {
    /// Remaining delay at subscribe time; past deadlines clamp to zero.
    fn delay(self, scheduler: &SchedulerRef) -> Duration {
        match self {
            Due::After(delay) => delay,
            Due::At(deadline) => deadline.saturating_duration_since(scheduler.now()),
        }
    }
}

pub(crate) fn timer(due: Due, scheduler: Option<SchedulerRef>) -> Signal {
    Signal::from_arc(Arc::new(TimerSource { due, scheduler }))
}

pub(crate) fn timeout(upstream: Signal, due: Due, scheduler: Option<SchedulerRef>) -> Signal {
    Signal::from_arc(Arc::new(TimeoutSource {
        upstream,
        due,
        scheduler,
    }))
}

struct TimerSource {
    due: Due,
    scheduler: Option<SchedulerRef>,
}

impl TimerSource {
    fn scheduler(&self) -> SchedulerRef {
        self.scheduler.clone().unwrap_or_else(defaults::timer_scheduler)
    }
}

impl Source for TimerSource {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let scheduler = self.scheduler();
        let delay = self.due.delay(&scheduler);
        scheduler.schedule_after(delay, Box::new(move || subscriber.on_completed()))
    }
}

struct TimeoutSource {
    upstream: Signal,
    due: Due,
    scheduler: Option<SchedulerRef>,
}

impl Source for TimeoutSource {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let scheduler = self
            .scheduler
            .clone()
            .unwrap_or_else(defaults::timer_scheduler);
        let delay = self.due.delay(&scheduler);

        // Deadline side first, then the upstream; the shared guard upstream
        // of this attach makes the race first-one-wins either way.
        let upstream_slot = OnceSlot::new();
        let deadline_sub = {
            let subscriber = subscriber.clone();
            let upstream_handle = upstream_slot.subscription();
            scheduler.schedule_after(
                delay,
                Box::new(move || {
                    subscriber.on_error(SignalError::Deadline { after: delay }.into());
                    upstream_handle.cancel();
                }),
            )
        };

        let race: SubscriberRef = Arc::new(RaceForward {
            downstream: subscriber,
            loser: deadline_sub.clone(),
        });
        upstream_slot.set(self.upstream.subscribe_ref(race));

        Subscription::all([upstream_slot.subscription(), deadline_sub])
    }
}

/// Forwards the upstream terminal and cancels the pending deadline.
struct RaceForward {
    downstream: SubscriberRef,
    loser: Subscription,
}

impl Subscriber for RaceForward {
    fn on_completed(&self) {
        self.downstream.on_completed();
        self.loser.cancel();
    }

    fn on_error(&self, fault: Fault) {
        self.downstream.on_error(fault);
        self.loser.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Latch, Scheduler, VirtualScheduler};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn timer_completes_exactly_on_its_tick() {
        let clock = VirtualScheduler::new();
        let done = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        Signal::timer_on(ms(5), clock.clone()).subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        clock.advance_by(ms(4));
        assert_eq!(done.load(Ordering::SeqCst), 0);
        clock.advance_by(ms(1));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timer_at_computes_the_remaining_delay() {
        let clock = VirtualScheduler::new();
        let done = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        let deadline = clock.now() + ms(10);
        Signal::timer_at_on(deadline, clock.clone()).subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        clock.advance_by(ms(9));
        assert_eq!(done.load(Ordering::SeqCst), 0);
        clock.advance_by(ms(1));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timer_at_in_the_past_fires_without_waiting() {
        let clock = VirtualScheduler::new();
        clock.advance_by(ms(50));
        let done = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        let stale = clock.now() - ms(20);
        Signal::timer_at_on(stale, clock.clone()).subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        clock.advance_by(Duration::ZERO);
        assert_eq!(done.load(Ordering::SeqCst), 1, "clamped to an immediate tick");
    }

    #[test]
    fn deadline_fires_after_exactly_the_full_delay() {
        let clock = VirtualScheduler::new();
        let gate = Latch::new();
        let done = Arc::new(AtomicUsize::new(0));
        let deadlines = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        let dl = deadlines.clone();
        gate.signal().timeout_on(ms(10), clock.clone()).subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            move |fault| {
                let is_deadline = matches!(
                    fault.downcast_ref::<SignalError>(),
                    Some(SignalError::Deadline { .. })
                );
                assert!(is_deadline, "expected a deadline fault, got {fault}");
                dl.fetch_add(1, Ordering::SeqCst);
            },
        );

        clock.advance_by(ms(9));
        assert_eq!(deadlines.load(Ordering::SeqCst), 0, "one tick early is nothing");

        clock.advance_by(ms(1));
        assert_eq!(deadlines.load(Ordering::SeqCst), 1, "exactly one deadline failure");
        assert!(!gate.has_subscribers(), "upstream released by the deadline");

        // Neither more time nor a late source terminal produces anything.
        clock.advance_by(ms(100));
        gate.complete();
        assert_eq!(deadlines.load(Ordering::SeqCst), 1);
        assert_eq!(done.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn upstream_win_cancels_the_deadline() {
        let clock = VirtualScheduler::new();
        let done = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        Signal::empty().timeout_on(ms(10), clock.clone()).subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(clock.pending(), 0, "deadline entry cancelled");
        clock.advance_by(ms(20));
        assert_eq!(done.load(Ordering::SeqCst), 1, "nothing extra after the win");
    }

    #[test]
    fn upstream_failure_beats_the_deadline_unchanged() {
        let clock = VirtualScheduler::new();
        let labels = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let l = labels.clone();
        Signal::fail(Fault::msg("origin"))
            .timeout_on(ms(10), clock.clone())
            .subscribe_fn(
                || {},
                move |fault| {
                    l.lock().push(fault.label().to_string());
                },
            );

        assert_eq!(&*labels.lock(), &["signal_failure"], "original fault, not a deadline");
        clock.advance_by(ms(10));
        assert_eq!(labels.lock().len(), 1);
    }

    #[test]
    fn cancelling_the_timeout_releases_both_sides() {
        let clock = VirtualScheduler::new();
        let gate = Latch::new();

        let sub = gate
            .signal()
            .timeout_on(ms(10), clock.clone())
            .subscribe_fn(|| {}, |_| {});
        sub.cancel();

        assert!(!gate.has_subscribers(), "upstream released");
        assert_eq!(clock.pending(), 0, "deadline entry cancelled");
    }

    #[test]
    fn deadline_fault_reports_the_delay() {
        let clock = VirtualScheduler::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let s = seen.clone();
        Signal::never().timeout_on(ms(25), clock.clone()).subscribe_fn(
            || {},
            move |fault| {
                *s.lock() = Some(fault);
            },
        );
        clock.advance_by(ms(25));

        let fault = seen.lock().take().expect("deadline fault delivered");
        match fault.downcast_ref::<SignalError>() {
            Some(SignalError::Deadline { after }) => assert_eq!(*after, ms(25)),
            other => panic!("expected a deadline fault, got {other:?}"),
        }
    }
}
