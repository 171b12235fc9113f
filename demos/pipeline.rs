//! # Example: pipeline
//!
//! Staged rollout built from plain signals: ordered setup steps, a bounded
//! fan-out over replicas, and side-effect hooks at the edges.
//!
//! Demonstrates how to:
//! - Sequence steps with [`Signal::then`].
//! - Fan out with [`Signal::merge_bounded`] while capping concurrency.
//! - Observe a run with `do_on_*` hooks and `finally`.
//! - Block on the single outcome with [`Signal::wait`].
//!
//! ## Flow
//! ```text
//! setup ──► replicas ──► finally ──► wait()
//!   ├─► schema: timer(80ms), logged
//!   ├─► seed:   timer(40ms), logged (starts only after schema)
//!   ├─► replicas: three timers, at most two in flight
//!   └─► terminal ──► "[pipeline] rollout complete"
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example pipeline
//! ```

use std::time::Duration;

use onesig::Signal;

/// A named unit of work: a timer standing in for real I/O, logged at both
/// edges.
fn step(name: &'static str, took: Duration) -> Signal {
    Signal::timer(took)
        .do_on_subscribe(move || {
            println!("[{name}] started");
            Ok(())
        })
        .do_on_completed(move || {
            println!("[{name}] done");
            Ok(())
        })
}

fn main() -> anyhow::Result<()> {
    // 1. Ordered setup: schema first, seed data strictly after
    let setup = step("schema", Duration::from_millis(80))
        .then(step("seed", Duration::from_millis(40)));

    // 2. Replica refresh: three independent steps, at most two in flight
    let replicas = Signal::merge_bounded(
        [
            step("replica-1", Duration::from_millis(60)),
            step("replica-2", Duration::from_millis(30)),
            step("replica-3", Duration::from_millis(90)),
        ],
        2,
    );

    // 3. Stitch the stages together and hang cleanup on the end
    let rollout = setup
        .then(replicas)
        .finally(|| println!("[pipeline] teardown hook ran"));

    // 4. Block the main thread until the one terminal arrives
    rollout.wait()?;
    println!("[pipeline] rollout complete");
    Ok(())
}
