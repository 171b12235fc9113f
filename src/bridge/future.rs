//! Future interop: signals as futures and futures as signals.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::future::BoxFuture;
use futures::task::{waker, ArcWake};
use futures::FutureExt;
use parking_lot::Mutex;

use crate::error::Fault;
use crate::signals::{Signal, Source};
use crate::subscribers::SubscriberRef;
use crate::subscriptions::Subscription;

impl Signal {
    /// Adapts this signal into a future resolving to its terminal.
    ///
    /// Lazy on both ends: the subscription starts on the first poll, and
    /// dropping the future before the terminal cancels it.
    ///
    /// `Signal` also implements [`IntoFuture`], so `signal.await` works
    /// directly in async code.
    pub fn into_future(self) -> SignalFuture {
        SignalFuture {
            signal: Some(self),
            shared: Arc::new(FutureShared::default()),
            sub: None,
        }
    }

    /// Runs `future` as a signal, one execution for the first subscriber.
    ///
    /// The future is polled with a self-contained waker; no runtime is
    /// required. Cancelling the subscription stops polling and drops the
    /// future. The future is consumed by the first subscription; later
    /// subscriptions fail.
    ///
    /// ## Example
    /// ```
    /// use onesig::{Fault, Signal};
    ///
    /// let checked = Signal::from_future(async {
    ///     if 2 + 2 == 4 {
    ///         Ok(())
    ///     } else {
    ///         Err(Fault::msg("arithmetic is broken"))
    ///     }
    /// });
    /// assert!(checked.wait().is_ok());
    /// ```
    pub fn from_future(
        future: impl Future<Output = Result<(), Fault>> + Send + 'static,
    ) -> Signal {
        Signal::from_arc(Arc::new(FromFutureSource {
            future: Mutex::new(Some(future.boxed())),
        }))
    }
}

impl IntoFuture for Signal {
    type Output = Result<(), Fault>;
    type IntoFuture = SignalFuture;

    fn into_future(self) -> SignalFuture {
        Signal::into_future(self)
    }
}

/// Future side of [`Signal::into_future`].
pub struct SignalFuture {
    signal: Option<Signal>,
    shared: Arc<FutureShared>,
    sub: Option<Subscription>,
}

#[derive(Default)]
struct FutureShared {
    state: Mutex<FutureState>,
}

#[derive(Default)]
struct FutureState {
    outcome: Option<Result<(), Fault>>,
    waker: Option<Waker>,
}

impl FutureShared {
    fn settle(&self, result: Result<(), Fault>) {
        let woken = {
            let mut st = self.state.lock();
            if st.outcome.is_none() {
                st.outcome = Some(result);
            }
            st.waker.take()
        };
        if let Some(waker) = woken {
            waker.wake();
        }
    }
}

impl Future for SignalFuture {
    type Output = Result<(), Fault>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(signal) = this.signal.take() {
            // Park the waker before subscribing; the terminal may arrive
            // synchronously during attach.
            this.shared.state.lock().waker = Some(cx.waker().clone());
            let on_done = this.shared.clone();
            let on_fail = this.shared.clone();
            this.sub = Some(signal.subscribe_fn(
                move || on_done.settle(Ok(())),
                move |fault| on_fail.settle(Err(fault)),
            ));
        }

        let mut st = this.shared.state.lock();
        match st.outcome.take() {
            Some(result) => {
                drop(st);
                this.sub = None;
                Poll::Ready(result)
            }
            None => {
                st.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Drop for SignalFuture {
    fn drop(&mut self) {
        // Spent handles ignore this; an in-flight subscription is released.
        if let Some(sub) = self.sub.take() {
            sub.cancel();
        }
    }
}

struct FromFutureSource {
    future: Mutex<Option<BoxFuture<'static, Result<(), Fault>>>>,
}

impl Source for FromFutureSource {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let taken = self.future.lock().take();
        match taken {
            Some(future) => {
                let pump = Arc::new(Pump {
                    future: Mutex::new(Some(future)),
                    subscriber,
                    cancelled: AtomicBool::new(false),
                    polling: AtomicBool::new(false),
                    repoll: AtomicBool::new(false),
                });
                pump.drive();

                let stopper = pump.clone();
                Subscription::from_fn(move || {
                    stopper.cancelled.store(true, Ordering::Release);
                    stopper.drive();
                })
            }
            None => {
                subscriber.on_error(Fault::msg("future already consumed"));
                Subscription::noop()
            }
        }
    }
}

/// Single-owner poll loop. `polling` is the token: whoever swaps it on gets
/// to poll; wakers that lose the race leave a `repoll` marker instead of
/// polling concurrently.
struct Pump {
    future: Mutex<Option<BoxFuture<'static, Result<(), Fault>>>>,
    subscriber: SubscriberRef,
    cancelled: AtomicBool,
    polling: AtomicBool,
    repoll: AtomicBool,
}

impl Pump {
    fn drive(self: &Arc<Self>) {
        if self.polling.swap(true, Ordering::AcqRel) {
            self.repoll.store(true, Ordering::Release);
            if self.polling.swap(true, Ordering::AcqRel) {
                // Active poller will pick the marker up on its way out.
                return;
            }
        }

        loop {
            self.repoll.store(false, Ordering::Release);

            if self.cancelled.load(Ordering::Acquire) {
                *self.future.lock() = None;
                self.polling.store(false, Ordering::Release);
                return;
            }

            let outcome = {
                let mut slot = self.future.lock();
                match slot.as_mut() {
                    Some(future) => {
                        let waker = waker(self.clone());
                        let mut cx = Context::from_waker(&waker);
                        match future.as_mut().poll(&mut cx) {
                            Poll::Ready(result) => {
                                *slot = None;
                                Some(result)
                            }
                            Poll::Pending => None,
                        }
                    }
                    None => {
                        self.polling.store(false, Ordering::Release);
                        return;
                    }
                }
            };

            if let Some(result) = outcome {
                match result {
                    Ok(()) => self.subscriber.on_completed(),
                    Err(fault) => self.subscriber.on_error(fault),
                }
                self.polling.store(false, Ordering::Release);
                return;
            }

            self.polling.store(false, Ordering::Release);
            if !self.repoll.swap(false, Ordering::AcqRel) {
                return;
            }
            if self.polling.swap(true, Ordering::AcqRel) {
                return;
            }
        }
    }
}

impl ArcWake for Pump {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.drive();
    }
}
