//! Failure values carried by signal pipelines.
//!
//! This module defines the two error types of the crate:
//!
//! - [`Fault`] — the failure currency delivered to `on_error`: a cheap,
//!   cloneable handle around any `std::error::Error`, so one failure can be
//!   observed by many sinks (subjects, racing operators) without copying.
//! - [`SignalError`] — failures raised by the crate itself (operator
//!   deadlines, blocking-wait expiry, ad-hoc message failures).
//!
//! [`SignalError`] provides helper methods (`as_label`, `as_message`) for
//! logging, plus [`SignalError::is_deadline`] to tell an operator deadline
//! apart from a source-raised failure.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Shared failure value delivered through `Subscriber::on_error`.
///
/// A `Fault` wraps an arbitrary error behind an `Arc`, so cloning is cheap
/// and every observer of the same failure sees the same underlying value.
/// Typed recovery ([`Signal::catch`](crate::Signal::catch)) filters faults
/// with [`Fault::downcast_ref`].
///
/// # Example
/// ```
/// use onesig::{Fault, SignalError};
/// use std::time::Duration;
///
/// let fault = Fault::from(SignalError::Deadline { after: Duration::from_secs(1) });
/// assert!(fault.is::<SignalError>());
/// assert_eq!(fault.label(), "signal_deadline");
/// ```
#[derive(Clone)]
pub struct Fault {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl Fault {
    /// Wraps a concrete error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Builds a fault from a plain message ([`SignalError::Failure`] inside).
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(SignalError::Failure {
            message: message.into(),
        })
    }

    /// Returns `true` when the wrapped error is an `E`.
    pub fn is<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.downcast_ref::<E>().is_some()
    }

    /// Borrows the wrapped error as a concrete `E`, if it is one.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// Crate-raised faults report their [`SignalError::as_label`];
    /// everything else reports `"fault"`.
    pub fn label(&self) -> &'static str {
        match self.downcast_ref::<SignalError>() {
            Some(err) => err.as_label(),
            None => "fault",
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault({:?})", self.inner)
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<SignalError> for Fault {
    fn from(err: SignalError) -> Self {
        Self::new(err)
    }
}

/// # Failures raised by the crate itself.
///
/// Anything a source or consumer raises on its own travels as an opaque
/// [`Fault`]; these variants cover the cases where *this* crate manufactures
/// the failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SignalError {
    /// A deadline race ([`Signal::timeout`](crate::Signal::timeout)) fired
    /// before the source produced its terminal event.
    #[error("deadline of {after:?} exceeded")]
    Deadline {
        /// The deadline duration that was exceeded.
        after: Duration,
    },

    /// A blocking wait ([`Signal::wait_timeout`](crate::Signal::wait_timeout))
    /// expired before the terminal event arrived.
    #[error("wait expired after {after:?}")]
    WaitTimeout {
        /// How long the caller was willing to wait.
        after: Duration,
    },

    /// Ad-hoc failure carrying only a message (built by [`Fault::msg`]).
    #[error("{message}")]
    Failure {
        /// The failure text.
        message: String,
    },
}

impl SignalError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use onesig::SignalError;
    /// use std::time::Duration;
    ///
    /// let err = SignalError::Deadline { after: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "signal_deadline");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalError::Deadline { .. } => "signal_deadline",
            SignalError::WaitTimeout { .. } => "signal_wait_timeout",
            SignalError::Failure { .. } => "signal_failure",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SignalError::Deadline { after } => format!("deadline exceeded: {after:?}"),
            SignalError::WaitTimeout { after } => format!("wait expired: {after:?}"),
            SignalError::Failure { message } => format!("failure: {message}"),
        }
    }

    /// Indicates whether this failure came from a deadline race, as opposed
    /// to the source itself.
    ///
    /// # Example
    /// ```
    /// use onesig::SignalError;
    /// use std::time::Duration;
    ///
    /// let dead = SignalError::Deadline { after: Duration::from_millis(10) };
    /// assert!(dead.is_deadline());
    ///
    /// let other = SignalError::Failure { message: "boom".into() };
    /// assert!(!other.is_deadline());
    /// ```
    pub fn is_deadline(&self) -> bool {
        matches!(self, SignalError::Deadline { .. })
    }
}
