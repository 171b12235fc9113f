//! Cancellation handles for in-flight subscriptions.
//!
//! This module groups the handle type returned by every subscribe call and
//! the slot containers operators use to track upstream work.
//!
//! ## Contents
//! - [`Subscription`], [`Cancelable`] idempotent cancellation handle + trait
//! - [`SwapSlot`] holds one inner handle, swapping cancels the previous
//! - [`OnceSlot`] single-assignment slot (late assignment after cancel is
//!   cancelled on entry)
//! - [`SubscriptionSet`] keyed group with add/remove and cancel-all
//!
//! ## Quick wiring
//! ```text
//! Signal::subscribe ──► OnceSlot (outer handle, filled by attach)
//! Concat / Catch    ──► SwapSlot (element N+1 replaces element N)
//! Merge / WhenAll   ──► SubscriptionSet (children join/leave; first error
//!                                        cancels the whole set)
//! ```
//!
//! ## Rules
//! - `cancel()` is idempotent; exactly one caller runs the teardown.
//! - Dropping a handle never cancels: fire-and-forget subscribes are legal.
//! - Slots never invoke an inner handle's teardown while holding their own
//!   lock, so teardown may re-enter the slot freely.

mod slots;
mod subscription;

pub use slots::{OnceSlot, SubscriptionSet, SwapSlot};
pub use subscription::{Cancelable, Subscription};
