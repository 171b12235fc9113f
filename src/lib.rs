//! # onesig
//!
//! **Onesig** is a completion-signal library for Rust.
//!
//! It provides push-based signals that finish exactly once, either with
//! success or with a shared [`Fault`], plus the operators to sequence,
//! fan out, race, and recover them. The crate is designed as a building
//! block for pipelines where "did this finish, and how" is the only value
//! that matters.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Signal    │   │    Signal    │   │    Latch     │
//!     │ (cold: runs  │   │ (cold: runs  │   │ (hot: settle │
//!     │ on subscribe)│   │ on subscribe)│   │ and replay)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Operators (each wraps a Source, returns a new Signal)            │
//! │  - concat / then / then_with        (strict sequencing)           │
//! │  - merge / merge_bounded / when_all (fan-out, first error wins)   │
//! │  - timer / timeout                  (scheduler-driven deadlines)  │
//! │  - catch / catch_ignore / fallback_chain (typed recovery)         │
//! │  - do_* hooks / finally             (side effects at the edges)   │
//! └────────────────────────────────┬──────────────────────────────────┘
//!                                  │ subscribe / wait / .await
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Subscribe scaffold (built once per subscription)                 │
//! │  - OnceSlot       (outer cancellation handle, set exactly once)   │
//! │  - TerminalGuard  (claims the single allowed terminal)            │
//! │  - trampoline     (queues nested attaches, flat stack)            │
//! └────────────────────────────────┬──────────────────────────────────┘
//!                                  │ Source::attach
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler (where and when the work runs)                         │
//! │  - InlineScheduler / TrampolineScheduler  (caller's thread)       │
//! │  - TimerScheduler                         (worker thread clock)   │
//! │  - VirtualScheduler                       (manual test clock)     │
//! │  - TokioScheduler                         (feature `tokio`)       │
//! └────────────────────────────────┬──────────────────────────────────┘
//!                                  ▼
//!                     Subscriber (user terminal sink)
//!                     on_completed() | on_error(Fault)
//! ```
//!
//! ### Lifecycle
//! ```text
//! signal.subscribe(sink)
//!   │
//!   ├─► OnceSlot created            (the handle returned to the caller)
//!   ├─► sink wrapped in TerminalGuard
//!   └─► Source::attach(guarded)     (directly, or queued on the
//!       │                            trampoline for operator chains)
//!       │
//!       ├─ success ──► on_completed()      exactly one of these,
//!       ├─ failure ──► on_error(Fault)     under every interleaving
//!       │
//!       └─ after the terminal: the guard cancels the OnceSlot, which
//!          releases timers, child subscriptions, and registrations
//!
//! handle.cancel()
//!   ├─► idempotent, races safely with delivery
//!   ├─► tears down upstream work (pending timers, children)
//!   └─► never invents a terminal; dropping the handle does nothing
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                                      |
//! |-------------------|-------------------------------------------------------------|---------------------------------------------------------|
//! | **Signals**       | Cold completion factories and the operator set.             | [`Signal`], [`Source`]                                  |
//! | **Subscribers**   | Terminal sinks plus the exactly-once machinery.             | [`Subscriber`], [`TerminalGuard`], [`OnceGate`]         |
//! | **Subscriptions** | Cancellation handles, swap/once slots, keyed sets.          | [`Subscription`], [`SwapSlot`], [`OnceSlot`]            |
//! | **Schedulers**    | Inline, trampolined, timer-thread, and virtual execution.   | [`Scheduler`], [`TimerScheduler`], [`VirtualScheduler`] |
//! | **Hot latch**     | Settle from outside, broadcast, replay to late subscribers. | [`Latch`]                                               |
//! | **Errors**        | Cheap shared fault values with typed downcasts.             | [`Fault`], [`SignalError`]                              |
//! | **Bridges**       | futures interop in both directions.                         | [`SignalFuture`], [`SignalStream`]                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogSubscriber`] _(demo/reference only)_
//!   and the `Signal::traced` helper.
//! - `tokio`: exposes [`TokioScheduler`] and [`bind_cancellation`] for
//!   runtime integration.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//!
//! use onesig::{Fault, Signal, SignalError};
//!
//! fn main() -> Result<(), Fault> {
//!     // Two setup steps in strict order.
//!     let schema = Signal::timer(Duration::from_millis(5));
//!     let seed = Signal::defer(|| Signal::empty());
//!     let setup = schema.then(seed);
//!
//!     // A replica that breaks, patched with a typed recovery.
//!     let flaky = Signal::fail(Fault::msg("replica 2 is down"))
//!         .catch(|_cause: &SignalError| Signal::empty());
//!
//!     // Fan out, then bound the whole rollout with a deadline.
//!     let rollout = setup
//!         .then(Signal::when_all([Signal::empty(), flaky]))
//!         .timeout(Duration::from_secs(1));
//!
//!     // Block until the single terminal arrives.
//!     rollout.wait()
//! }
//! ```
mod bridge;
mod error;
mod latch;
mod operators;
pub mod schedulers;
mod signals;
mod subscribers;
mod subscriptions;
mod wait;

// ---- Public re-exports ----

pub use bridge::{SignalFuture, SignalStream};
pub use error::{Fault, SignalError};
pub use latch::Latch;
pub use schedulers::{
    Continuation, InlineScheduler, RecursiveWork, Scheduler, SchedulerRef, TimerScheduler,
    TrampolineScheduler, VirtualScheduler, Work,
};
pub use signals::{Signal, Source};
pub use subscribers::{OnceGate, Subscriber, SubscriberRef, TerminalGuard};
pub use subscriptions::{Cancelable, OnceSlot, Subscription, SubscriptionSet, SwapSlot};

// Optional: schedule onto a Tokio runtime, drive cancellation from tokens.
// Enable with: `--features tokio`
#[cfg(feature = "tokio")]
mod rt;
#[cfg(feature = "tokio")]
pub use rt::{bind_cancellation, TokioScheduler};

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogSubscriber;
