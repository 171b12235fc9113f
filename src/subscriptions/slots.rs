//! Slot containers that track upstream subscriptions for operators.
//!
//! All three containers share the same discipline: state mutations happen
//! under a short lock, the displaced handles are cancelled **after** the
//! lock is dropped, and once a container is cancelled every handle assigned
//! to it later is cancelled on entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::subscription::{Cancelable, Subscription};

/// Serial slot: holds at most one inner subscription at a time.
///
/// Assigning a new handle cancels the previous one; sequencing operators use
/// this so that advancing to the next element releases the finished one.
///
/// # Example
/// ```
/// use onesig::{Subscription, SwapSlot};
///
/// let slot = SwapSlot::new();
/// let first = Subscription::noop();
/// slot.set(first.clone());
///
/// slot.set(Subscription::noop()); // displaces `first`
/// assert!(first.is_cancelled());
///
/// slot.cancel();
/// let late = Subscription::noop();
/// slot.set(late.clone()); // slot already cancelled
/// assert!(late.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct SwapSlot {
    inner: Arc<SwapInner>,
}

#[derive(Default)]
struct SwapInner {
    state: Mutex<SwapState>,
}

#[derive(Default)]
struct SwapState {
    current: Option<Subscription>,
    cancelled: bool,
}

impl SwapSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `sub`, cancelling whatever occupied the slot before.
    ///
    /// If the slot itself was already cancelled, `sub` is cancelled instead
    /// of being stored.
    pub fn set(&self, sub: Subscription) {
        let displaced = {
            let mut st = self.inner.state.lock();
            if st.cancelled {
                Some(sub)
            } else {
                st.current.replace(sub)
            }
        };
        if let Some(sub) = displaced {
            sub.cancel();
        }
    }

    /// Cancels the current occupant and poisons the slot.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` once the slot has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// A [`Subscription`] view over this slot.
    pub fn subscription(&self) -> Subscription {
        Subscription::from_shared(self.inner.clone())
    }
}

impl Cancelable for SwapInner {
    fn cancel(&self) {
        let current = {
            let mut st = self.state.lock();
            st.cancelled = true;
            st.current.take()
        };
        if let Some(sub) = current {
            sub.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

/// Single-assignment slot: the outer handle of the subscribe scaffold.
///
/// The scaffold hands this out *before* the source attach runs, then fills
/// it with the real upstream handle. Cancelling the slot before assignment
/// makes the eventual assignment cancel on entry.
///
/// # Panics
/// [`OnceSlot::set`] panics if called twice; the slot exists to be assigned
/// exactly once.
#[derive(Clone, Default)]
pub struct OnceSlot {
    inner: Arc<OnceInner>,
}

#[derive(Default)]
struct OnceInner {
    state: Mutex<OnceState>,
}

#[derive(Default)]
struct OnceState {
    slot: Option<Subscription>,
    assigned: bool,
    cancelled: bool,
}

impl OnceSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the inner handle.
    pub fn set(&self, sub: Subscription) {
        let reject = {
            let mut st = self.inner.state.lock();
            assert!(!st.assigned, "OnceSlot assigned twice");
            st.assigned = true;
            if st.cancelled {
                Some(sub)
            } else {
                st.slot = Some(sub);
                None
            }
        };
        if let Some(sub) = reject {
            sub.cancel();
        }
    }

    /// Cancels the occupant (now or on assignment).
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` once the slot has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// A [`Subscription`] view over this slot.
    pub fn subscription(&self) -> Subscription {
        Subscription::from_shared(self.inner.clone())
    }
}

impl Cancelable for OnceInner {
    fn cancel(&self) {
        let slot = {
            let mut st = self.state.lock();
            st.cancelled = true;
            st.slot.take()
        };
        if let Some(sub) = slot {
            sub.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

/// Keyed group of subscriptions with dynamic membership.
///
/// Fan-out operators register each child here and deregister it when the
/// child reaches its own terminal, so the group only ever holds live work.
/// Cancelling the group releases every remaining member.
#[derive(Clone, Default)]
pub struct SubscriptionSet {
    inner: Arc<SetInner>,
}

#[derive(Default)]
struct SetInner {
    state: Mutex<SetState>,
}

struct SetState {
    // `None` once the set has been cancelled.
    entries: Option<HashMap<u64, Subscription>>,
    next_key: u64,
}

impl Default for SetState {
    fn default() -> Self {
        Self {
            entries: Some(HashMap::new()),
            next_key: 0,
        }
    }
}

impl SubscriptionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `sub`, returning its removal key.
    ///
    /// Returns `None` (after cancelling `sub`) when the set was already
    /// cancelled.
    pub fn add(&self, sub: Subscription) -> Option<u64> {
        let (key, reject) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            match st.entries.as_mut() {
                Some(entries) => {
                    let key = st.next_key;
                    st.next_key += 1;
                    entries.insert(key, sub);
                    (Some(key), None)
                }
                None => (None, Some(sub)),
            }
        };
        if let Some(sub) = reject {
            sub.cancel();
        }
        key
    }

    /// Removes the entry behind `key` and cancels it.
    ///
    /// Removing a key that already left the set is a no-op.
    pub fn remove(&self, key: u64) {
        let removed = {
            let mut st = self.inner.state.lock();
            st.entries.as_mut().and_then(|e| e.remove(&key))
        };
        if let Some(sub) = removed {
            sub.cancel();
        }
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.inner
            .state
            .lock()
            .entries
            .as_ref()
            .map_or(0, HashMap::len)
    }

    /// Returns `true` when no members are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every member and poisons the set.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` once the set has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// A [`Subscription`] view over this set.
    pub fn subscription(&self) -> Subscription {
        Subscription::from_shared(self.inner.clone())
    }
}

impl Cancelable for SetInner {
    fn cancel(&self) {
        let entries = self.state.lock().entries.take();
        if let Some(entries) = entries {
            for (_, sub) in entries {
                sub.cancel();
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().entries.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(hits: &Arc<AtomicUsize>) -> Subscription {
        let hits = hits.clone();
        Subscription::from_fn(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn swap_cancels_displaced_handle() {
        let hits = Arc::new(AtomicUsize::new(0));
        let slot = SwapSlot::new();

        slot.set(counted(&hits));
        assert_eq!(hits.load(Ordering::SeqCst), 0, "occupant stays live");

        slot.set(counted(&hits));
        assert_eq!(hits.load(Ordering::SeqCst), 1, "previous occupant released");

        slot.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 2, "current occupant released");
    }

    #[test]
    fn swap_rejects_after_cancel() {
        let slot = SwapSlot::new();
        slot.cancel();

        let late = Subscription::noop();
        slot.set(late.clone());
        assert!(late.is_cancelled(), "late assignment cancelled on entry");
    }

    #[test]
    fn once_slot_assigns_and_cascades() {
        let hits = Arc::new(AtomicUsize::new(0));
        let slot = OnceSlot::new();

        slot.set(counted(&hits));
        slot.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_slot_cancel_before_assignment_wins() {
        let hits = Arc::new(AtomicUsize::new(0));
        let slot = OnceSlot::new();

        slot.cancel();
        slot.set(counted(&hits));
        assert_eq!(hits.load(Ordering::SeqCst), 1, "assignment cancelled on entry");
    }

    #[test]
    #[should_panic(expected = "OnceSlot assigned twice")]
    fn once_slot_rejects_second_assignment() {
        let slot = OnceSlot::new();
        slot.set(Subscription::noop());
        slot.set(Subscription::noop());
    }

    #[test]
    fn set_membership_and_cancel_all() {
        let hits = Arc::new(AtomicUsize::new(0));
        let set = SubscriptionSet::new();

        let a = set.add(counted(&hits)).unwrap();
        let _b = set.add(counted(&hits)).unwrap();
        assert_eq!(set.len(), 2);

        set.remove(a);
        assert_eq!(set.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1, "removed entry is cancelled");

        set.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 2, "remaining entries cancelled");
        assert!(set.is_cancelled());

        assert!(set.add(counted(&hits)).is_none(), "set is poisoned");
        assert_eq!(hits.load(Ordering::SeqCst), 3, "post-cancel entry rejected");
    }

    #[test]
    fn set_remove_unknown_key_is_noop() {
        let set = SubscriptionSet::new();
        set.remove(42);
        assert!(set.is_empty());
    }
}
