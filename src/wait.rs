//! # Blocking adapters
//!
//! Bridges a signal into synchronous code: the caller parks on a condvar
//! until the terminal arrives (or a deadline passes). Meant for main
//! functions, tests, and shutdown paths, not for hot loops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Fault, SignalError};
use crate::signals::Signal;

#[derive(Default)]
struct WaitCell {
    outcome: Mutex<Option<Result<(), Fault>>>,
    arrived: Condvar,
}

impl WaitCell {
    fn settle(&self, result: Result<(), Fault>) {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(result);
        }
        drop(outcome);
        self.arrived.notify_all();
    }
}

impl Signal {
    /// Subscribes and parks the caller until the terminal event.
    ///
    /// Success returns `Ok(())`; failure returns the original fault.
    ///
    /// ## Example
    /// ```
    /// use onesig::{Fault, Signal};
    ///
    /// assert!(Signal::empty().wait().is_ok());
    /// assert!(Signal::fail(Fault::msg("down")).wait().is_err());
    /// ```
    pub fn wait(&self) -> Result<(), Fault> {
        let cell = Arc::new(WaitCell::default());
        let on_done = cell.clone();
        let on_fail = cell.clone();
        let _sub = self.subscribe_fn(
            move || on_done.settle(Ok(())),
            move |fault| on_fail.settle(Err(fault)),
        );

        let mut outcome = cell.outcome.lock();
        loop {
            if let Some(result) = outcome.take() {
                return result;
            }
            cell.arrived.wait(&mut outcome);
        }
    }

    /// [`wait`](Self::wait) bounded by `timeout`.
    ///
    /// On expiry the subscription is cancelled and
    /// [`SignalError::WaitTimeout`] is returned; a terminal that lands
    /// together with the deadline still wins.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), Fault> {
        let cell = Arc::new(WaitCell::default());
        let on_done = cell.clone();
        let on_fail = cell.clone();
        let sub = self.subscribe_fn(
            move || on_done.settle(Ok(())),
            move |fault| on_fail.settle(Err(fault)),
        );

        let deadline = Instant::now() + timeout;
        let mut outcome = cell.outcome.lock();
        loop {
            if let Some(result) = outcome.take() {
                return result;
            }
            if cell.arrived.wait_until(&mut outcome, deadline).timed_out() {
                break;
            }
        }
        if let Some(result) = outcome.take() {
            return result;
        }
        drop(outcome);

        sub.cancel();
        Err(SignalError::WaitTimeout { after: timeout }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::Subscription;
    use crate::Latch;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn wait_returns_ok_on_completion() {
        assert!(Signal::empty().wait().is_ok());
    }

    #[test]
    fn wait_returns_the_original_fault() {
        let fault = Signal::fail(Fault::msg("backend down")).wait().unwrap_err();
        assert_eq!(fault.label(), "signal_failure");
        assert_eq!(fault.to_string(), "backend down");
    }

    #[test]
    fn wait_parks_until_a_cross_thread_settle() {
        let gate = Latch::new();
        let settler = gate.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            settler.complete();
        });

        assert!(gate.signal().wait().is_ok());
        worker.join().unwrap();
    }

    #[test]
    fn wait_timeout_returns_early_terminals_immediately() {
        assert!(Signal::empty().wait_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn wait_timeout_expires_and_cancels_the_subscription() {
        let released = Arc::new(AtomicBool::new(false));
        let r = released.clone();
        let pending = Signal::create(move |_subscriber| {
            let r = r.clone();
            Subscription::from_fn(move || r.store(true, Ordering::SeqCst))
        });

        let fault = pending
            .wait_timeout(Duration::from_millis(30))
            .unwrap_err();
        match fault.downcast_ref::<SignalError>() {
            Some(SignalError::WaitTimeout { after }) => {
                assert_eq!(*after, Duration::from_millis(30));
            }
            other => panic!("expected a wait timeout, got {other:?}"),
        }
        assert!(released.load(Ordering::SeqCst), "expiry releases the upstream");
    }

    #[test]
    fn default_timer_completes_a_wait() {
        // End to end through the process-default timer scheduler.
        assert!(Signal::timer(Duration::from_millis(20)).wait().is_ok());
    }
}
