//! # Async bridges
//!
//! Conversions between signals and the `futures` abstractions, runtime-free
//! in both directions:
//! - [`SignalFuture`] — `signal.into_future()` / `signal.await`; subscribes
//!   on first poll, cancels on drop.
//! - [`Signal::from_future`] — drives a future with a self-pumping waker.
//! - [`SignalStream`] — `signal.into_stream()`; exactly one item, then end.
//! - [`Signal::from_stream`] — drains a fallible stream to a terminal.

mod future;
mod stream;

pub use future::SignalFuture;
pub use stream::SignalStream;
