//! Dependency Sets
//!
//! A [`Dep`] is the set of effects subscribed to one (target, key) pair.
//! Membership is kept in insertion order so triggers re-run subscribers in
//! the order they first read the field.
//!
//! A Dep only holds weak references to its subscribers. An effect is kept
//! alive by its handles and by the effect that owns it; when the last of
//! those goes away the effect leaves every Dep it was in.
//!
//! Each Dep also carries two marker words used by the incremental cleanup
//! in [`ReactiveEffect::run`](crate::reactive::ReactiveEffect::run):
//!
//! - `was_tracked`: bit `n` set means the effect running at depth `n` was a
//!   member before its current run started.
//! - `new_tracked`: bit `n` set means that effect read this Dep during its
//!   current run.
//!
//! Markers are `u32`. Bit 0 is never used, so at most 31 nesting levels can
//! use markers; deeper runs fall back to full cleanup.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::reactive::{EffectId, Subscriber};

pub struct Dep {
    subscribers: RefCell<IndexMap<EffectId, Weak<dyn Subscriber>>>,
    was_tracked: Cell<u32>,
    new_tracked: Cell<u32>,
}

impl Dep {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RefCell::new(IndexMap::new()),
            was_tracked: Cell::new(0),
            new_tracked: Cell::new(0),
        }
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Check whether the given effect is subscribed.
    pub fn contains(&self, id: EffectId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    /// IDs of the subscribed effects, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<EffectId> {
        self.subscribers.borrow().keys().copied().collect()
    }

    /// Snapshot of the live subscribers, so callers can run them without
    /// holding a borrow on this Dep.
    pub(crate) fn subscribers(&self) -> Vec<Rc<dyn Subscriber>> {
        self.subscribers
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn insert(&self, subscriber: &Rc<dyn Subscriber>) {
        self.subscribers
            .borrow_mut()
            .entry(subscriber.id())
            .or_insert_with(|| Rc::downgrade(subscriber));
    }

    pub(crate) fn remove(&self, id: EffectId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    pub(crate) fn was_tracked(&self, bit: u32) -> bool {
        self.was_tracked.get() & bit != 0
    }

    pub(crate) fn new_tracked(&self, bit: u32) -> bool {
        self.new_tracked.get() & bit != 0
    }

    pub(crate) fn mark_was_tracked(&self, bit: u32) {
        self.was_tracked.set(self.was_tracked.get() | bit);
    }

    pub(crate) fn mark_new_tracked(&self, bit: u32) {
        self.new_tracked.set(self.new_tracked.get() | bit);
    }

    /// Clear both markers for one generation so the bit can be reused.
    pub(crate) fn clear_markers(&self, bit: u32) {
        self.was_tracked.set(self.was_tracked.get() & !bit);
        self.new_tracked.set(self.new_tracked.get() & !bit);
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.subscriber_ids())
            .field("was_tracked", &format_args!("{:#b}", self.was_tracked.get()))
            .field("new_tracked", &format_args!("{:#b}", self.new_tracked.get()))
            .finish()
    }
}
