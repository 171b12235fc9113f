//! # Simple logging sink for debugging and demos.
//!
//! [`LogSubscriber`] prints terminal events to stdout in a human-readable
//! format; [`Signal::traced`] composes the side-effect hooks into a full
//! lifecycle tracer. Both are primarily useful for development, debugging,
//! and examples.
//!
//! ## Output format
//! ```text
//! [completed] tag=upload
//! [failed] tag=upload label=signal_deadline err="deadline of 5s exceeded"
//! [fetch] subscribed
//! [fetch] completed
//! [fetch] failed label=fault err="connection refused"
//! [fetch] cancelled
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::Fault;
use crate::signals::Signal;

use super::subscriber::Subscriber;

/// Simple stdout logging sink.
///
/// Enabled via the `logging` feature. Prints human-readable terminal
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscriber`] for
/// structured logging.
pub struct LogSubscriber {
    tag: Cow<'static, str>,
}

impl LogSubscriber {
    /// Sink printing under the given tag.
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Default for LogSubscriber {
    fn default() -> Self {
        Self::new("signal")
    }
}

impl Subscriber for LogSubscriber {
    fn on_completed(&self) {
        println!("[completed] tag={}", self.tag);
    }

    fn on_error(&self, fault: Fault) {
        println!(
            "[failed] tag={} label={} err={:?}",
            self.tag,
            fault.label(),
            fault.to_string()
        );
    }
}

impl Signal {
    /// Prints the lifecycle of every subscription under `name`.
    ///
    /// Composes the side-effect hooks: subscribe, terminal (either kind) and
    /// cancellation each produce one stdout line. The signal's behavior is
    /// unchanged.
    pub fn traced(self, name: impl Into<Cow<'static, str>>) -> Signal {
        let name: Arc<str> = Arc::from(name.into().as_ref());
        let on_sub = name.clone();
        let on_done = name.clone();
        let on_err = name.clone();
        let on_drop = name;

        self.do_on_subscribe(move || {
            println!("[{on_sub}] subscribed");
            Ok(())
        })
        .do_on_completed(move || {
            println!("[{on_done}] completed");
            Ok(())
        })
        .do_on_error(move |fault| {
            println!(
                "[{on_err}] failed label={} err={:?}",
                fault.label(),
                fault.to_string()
            );
            Ok(())
        })
        .do_on_cancel(move || {
            println!("[{on_drop}] cancelled");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn traced_is_transparent() {
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();

        Signal::empty().traced("t").subscribe_fn(
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        assert_eq!(done.load(Ordering::SeqCst), 1, "tracing must not eat the terminal");
    }

    #[test]
    fn log_subscriber_accepts_both_terminals() {
        // Smoke only: output goes to stdout.
        let sink = LogSubscriber::default();
        sink.on_completed();
        LogSubscriber::new("other").on_error(Fault::msg("boom"));
    }
}
