//! # Latch: a hot, externally completable signal
//!
//! Everything else in the crate is cold; the latch is the one hot source.
//! Producers settle it exactly once from anywhere, subscribers attach before
//! or after the fact:
//!
//! ```text
//!                 complete() / fail(fault)
//!                          │ first call wins
//!                          ▼
//!  subscribe ──► [ Open: keyed registry ] ──► [ Done: stored outcome ]
//!                  notified on settle          replayed to late arrivals
//! ```
//!
//! ## Rules
//! - The first `complete`/`fail` wins; later settles are silently ignored.
//! - Settling snapshots the registry and notifies outside the lock.
//! - A subscription taken before the terminal deregisters only its own entry.
//! - Subscribing after the terminal replays the stored outcome immediately.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Fault;
use crate::signals::{Signal, Source};
use crate::subscribers::SubscriberRef;
use crate::subscriptions::Subscription;

/// Hot completion signal, settled by whoever holds a clone of the handle.
///
/// ## Example
/// ```
/// use onesig::Latch;
///
/// let ready = Latch::new();
///
/// let observed = ready.signal();
/// let sub = observed.subscribe_fn(|| println!("ready"), |f| eprintln!("broken: {f}"));
///
/// assert_eq!(ready.subscriber_count(), 1);
/// ready.complete();
/// assert!(ready.is_terminated());
/// assert!(!ready.has_subscribers(), "delivery releases registrations");
/// # drop(sub);
/// ```
#[derive(Clone, Default)]
pub struct Latch {
    inner: Arc<LatchInner>,
}

#[derive(Default)]
struct LatchInner {
    state: Mutex<LatchState>,
}

enum LatchState {
    Open {
        subscribers: HashMap<u64, SubscriberRef>,
        next_key: u64,
    },
    Done(Option<Fault>),
}

impl Default for LatchState {
    fn default() -> Self {
        LatchState::Open {
            subscribers: HashMap::new(),
            next_key: 0,
        }
    }
}

enum AttachOutcome {
    Registered(u64),
    Replay(Option<Fault>),
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settles with success. First settle wins; the rest are ignored.
    pub fn complete(&self) {
        self.settle(None);
    }

    /// Settles with `fault`. First settle wins; the rest are ignored.
    pub fn fail(&self, fault: impl Into<Fault>) {
        self.settle(Some(fault.into()));
    }

    /// A cold view over this latch; every subscribe lands back here.
    pub fn signal(&self) -> Signal {
        Signal::from_arc(Arc::new(self.clone()))
    }

    /// Whether any subscriber is currently registered. Always `false` once
    /// the latch has terminated.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        match &*self.inner.state.lock() {
            LatchState::Open { subscribers, .. } => subscribers.len(),
            LatchState::Done(_) => 0,
        }
    }

    /// Whether a terminal outcome has been stored.
    pub fn is_terminated(&self) -> bool {
        matches!(&*self.inner.state.lock(), LatchState::Done(_))
    }

    fn settle(&self, outcome: Option<Fault>) {
        let listeners = {
            let mut st = self.inner.state.lock();
            match &mut *st {
                LatchState::Open { subscribers, .. } => {
                    let snapshot: Vec<SubscriberRef> =
                        subscribers.drain().map(|(_, s)| s).collect();
                    *st = LatchState::Done(outcome.clone());
                    snapshot
                }
                LatchState::Done(_) => return,
            }
        };
        // Registry lock released; notify on the settling caller's thread.
        for subscriber in listeners {
            match &outcome {
                None => subscriber.on_completed(),
                Some(fault) => subscriber.on_error(fault.clone()),
            }
        }
    }
}

impl Source for Latch {
    fn attach(&self, subscriber: SubscriberRef) -> Subscription {
        let decision = {
            let mut st = self.inner.state.lock();
            match &mut *st {
                LatchState::Open {
                    subscribers,
                    next_key,
                } => {
                    let key = *next_key;
                    *next_key += 1;
                    subscribers.insert(key, subscriber.clone());
                    AttachOutcome::Registered(key)
                }
                LatchState::Done(outcome) => AttachOutcome::Replay(outcome.clone()),
            }
        };
        match decision {
            AttachOutcome::Registered(key) => {
                let inner = self.inner.clone();
                Subscription::from_fn(move || {
                    if let LatchState::Open { subscribers, .. } = &mut *inner.state.lock() {
                        subscribers.remove(&key);
                    }
                })
            }
            AttachOutcome::Replay(None) => {
                subscriber.on_completed();
                Subscription::noop()
            }
            AttachOutcome::Replay(Some(fault)) => {
                subscriber.on_error(fault);
                Subscription::noop()
            }
        }
    }
}
