//! # Terminal-event subscribers.
//!
//! This module provides the [`Subscriber`] trait (the two-callback consumer
//! every [`Signal`](crate::Signal) delivers its terminal event to) and the
//! guard machinery that makes delivery exactly-once.
//!
//! ## Architecture
//! ```text
//! Signal::subscribe_ref(subscriber)
//!        │
//!        ▼
//!  TerminalGuard ── OnceGate (atomic claim) ──► first terminal wins
//!        │                                          │
//!        │ late / racing terminals                  ▼
//!        └──────────► dropped            subscriber.on_completed()
//!                                        subscriber.on_error(fault)
//!                                                   │
//!                                                   ▼
//!                                        outer Subscription released
//! ```
//!
//! ## Rules
//! - A subscriber observes **at most one** terminal call, under every
//!   interleaving, even against misbehaving sources.
//! - Delivery happens before the subscription handle is released.
//! - Cancellation is silent: a cancelled subscription calls neither method.
//!
//! ## Implementing custom subscribers
//! ```
//! use onesig::{Fault, Signal, Subscriber};
//!
//! struct Checkpoint;
//!
//! impl Subscriber for Checkpoint {
//!     fn on_completed(&self) {
//!         // flush state, notify the next stage, etc.
//!     }
//!     fn on_error(&self, fault: Fault) {
//!         eprintln!("checkpoint failed: {fault}");
//!     }
//! }
//!
//! Signal::empty().subscribe(Checkpoint);
//! ```

mod guard;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use guard::{OnceGate, TerminalGuard};
pub use subscriber::{Subscriber, SubscriberRef};

pub(crate) use subscriber::{CallbackSubscriber, StateSubscriber};

#[cfg(feature = "logging")]
pub use log::LogSubscriber;
