//! The cancellation handle returned by every subscribe call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Anything that can be cancelled exactly once.
///
/// Implementations must make `cancel` idempotent and race-safe: when several
/// threads call it concurrently, exactly one runs the teardown and the rest
/// return after it is underway.
pub trait Cancelable: Send + Sync + 'static {
    /// Releases the underlying work. Idempotent.
    fn cancel(&self);

    /// Returns `true` once `cancel` has been called.
    fn is_cancelled(&self) -> bool;
}

/// Handle to one in-flight subscription.
///
/// Cloning shares the same underlying handle; cancelling any clone cancels
/// all of them. Dropping a `Subscription` does **not** cancel it, so the
/// result of a subscribe call may be discarded for fire-and-forget use.
///
/// # Example
/// ```
/// use onesig::Subscription;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counted = hits.clone();
/// let sub = Subscription::from_fn(move || {
///     counted.fetch_add(1, Ordering::SeqCst);
/// });
///
/// sub.cancel();
/// sub.cancel(); // idempotent
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// assert!(sub.is_cancelled());
/// ```
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<dyn Cancelable>,
}

impl Subscription {
    /// Handle with no teardown; `cancel` only flips the flag.
    pub fn noop() -> Self {
        Self {
            inner: Arc::new(Flag::default()),
        }
    }

    /// Handle that runs `f` on the first `cancel`.
    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(FnCancel {
                f: Mutex::new(Some(Box::new(f))),
            }),
        }
    }

    /// Handle over a shared [`Cancelable`].
    pub fn from_shared(inner: Arc<dyn Cancelable>) -> Self {
        Self { inner }
    }

    /// Composite handle: cancelling it cancels every member once.
    pub fn all(subs: impl IntoIterator<Item = Subscription>) -> Self {
        let subs: Vec<Subscription> = subs.into_iter().collect();
        Self {
            inner: Arc::new(Composite {
                subs: Mutex::new(Some(subs)),
            }),
        }
    }

    /// Releases the subscription. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` once the subscription has been released.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::noop()
    }
}

#[derive(Default)]
struct Flag {
    cancelled: AtomicBool,
}

impl Cancelable for Flag {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct FnCancel {
    f: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Cancelable for FnCancel {
    fn cancel(&self) {
        // Take under the lock, run outside it: teardown may re-enter.
        let f = self.f.lock().take();
        if let Some(f) = f {
            f();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.f.lock().is_none()
    }
}

struct Composite {
    subs: Mutex<Option<Vec<Subscription>>>,
}

impl Cancelable for Composite {
    fn cancel(&self) {
        let subs = self.subs.lock().take();
        if let Some(subs) = subs {
            for sub in subs {
                sub.cancel();
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.subs.lock().is_none()
    }
}
