//! # Operator implementations behind [`Signal`](crate::Signal)'s methods
//!
//! Every operator is a [`Source`](crate::Source) that layers behavior over an
//! upstream signal (or a sequence of them). The public surface lives on
//! `Signal`; this module holds the sources and their per-subscription runs.
//!
//! ## Contents
//! - `concat` — run in order, fail fast, trampolined advancing.
//! - `merge` — run concurrently with an optional bound; `when_all` for an
//!   eager, known set.
//! - `timing` — delay-based completion and deadline racing.
//! - `recover` — typed catch, fallback chains, failure swallowing.
//! - `hooks` — do-family side effects and `finally`.

pub(crate) mod concat;
pub(crate) mod hooks;
pub(crate) mod merge;
pub(crate) mod recover;
pub(crate) mod timing;
