//! # Signal core: cold factories and the subscribe scaffold
//!
//! A [`Signal`] is a cheap-to-clone description of an operation that finishes
//! exactly once. Nothing runs until someone subscribes; each subscription is
//! an independent execution.
//!
//! ## Contents
//! - [`Signal`] — cloneable handle over an `Arc<dyn Source>` factory, carrying
//!   the whole operator surface as inherent methods.
//! - [`Source`] — per-subscription behavior; every operator and factory in the
//!   crate is a `Source` under the hood.
//!
//! ## Subscribe flow
//! ```text
//! signal.subscribe_ref(subscriber)
//!     │
//!     ├─ OnceSlot ─────────────────────────── handle returned to the caller
//!     ├─ TerminalGuard(subscriber, handle) ── first terminal wins, then the
//!     │                                       handle is released
//!     └─ source.attach(guarded) ───────────── direct, or queued on the
//!                                             caller-thread trampoline
//! ```
//!
//! ## Rules
//! - Cold semantics: each subscribe starts one fresh execution.
//! - Every operator layer subscribes its upstream through the same scaffold,
//!   so every layer is independently guarded and releasable.
//! - Cancelling the returned handle releases in-flight work upstream; it
//!   never produces a terminal event.

mod signal;
mod sources;

pub use signal::{Signal, Source};
