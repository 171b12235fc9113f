//! # Example: race_and_recover
//!
//! Deadline racing and typed recovery over unreliable sources.
//!
//! Demonstrates how to:
//! - Bound a slow signal with [`Signal::timeout`].
//! - Catch the crate's own deadline fault with [`Signal::catch`].
//! - Walk a mirror list in order with [`Signal::fallback_chain`].
//!
//! ## Flow
//! ```text
//! primary(400ms) ──► timeout(100ms) ──► Deadline fault
//!     └─► catch(SignalError) ──► replica(40ms) ──► done
//!
//! fallback_chain([mirror-a, mirror-b, mirror-c])
//!     ├─► mirror-a fails ──► next
//!     ├─► mirror-b fails ──► next
//!     └─► mirror-c completes ──► done
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example race_and_recover
//! ```

use std::time::Duration;

use onesig::{Fault, Signal, SignalError};

fn main() -> anyhow::Result<()> {
    // 1. Primary is too slow for its deadline
    let primary = Signal::timer(Duration::from_millis(400))
        .do_on_subscribe(|| {
            println!("[primary] querying");
            Ok(())
        })
        .timeout(Duration::from_millis(100));

    // 2. A deadline fault swaps in the replica; anything else stays fatal
    let patched = primary.catch(|cause: &SignalError| {
        println!("[recover] primary gave up: {cause}");
        Signal::timer(Duration::from_millis(40)).do_on_completed(|| {
            println!("[replica] answered");
            Ok(())
        })
    });
    patched.wait()?;

    // 3. Mirrors tried in order until one completes
    let mirrors = Signal::fallback_chain([
        Signal::fail(Fault::msg("mirror-a refused")),
        Signal::fail(Fault::msg("mirror-b refused")),
        Signal::empty().do_on_completed(|| {
            println!("[mirror-c] served the request");
            Ok(())
        }),
    ]);
    mirrors.wait()?;

    println!("[race_and_recover] all routes settled");
    Ok(())
}
