//! Reactive Record
//!
//! A keyed record with per-key tracking. Reading one key subscribes only to
//! that key; enumerating the record (`keys`, `len`) subscribes to the
//! synthetic iteration key, which is notified when keys are added or
//! removed but not when an existing value changes.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use indexmap::IndexMap;

use super::runtime::Runtime;
use crate::store::{ChangeKind, Key, OwnedTarget, Target, TargetKind};

struct RecordInner<V> {
    target: OwnedTarget,
    entries: RefCell<IndexMap<String, V>>,
}

/// An insertion-ordered, string-keyed record whose fields are tracked
/// individually.
pub struct ReactiveRecord<V> {
    inner: Rc<RecordInner<V>>,
}

impl<V: 'static> ReactiveRecord<V> {
    pub fn new() -> Self {
        Self::from_entries(IndexMap::new())
    }

    fn from_entries(entries: IndexMap<String, V>) -> Self {
        Self {
            inner: Rc::new(RecordInner {
                target: OwnedTarget::new(TargetKind::Object),
                entries: RefCell::new(entries),
            }),
        }
    }

    pub fn target(&self) -> &Target {
        self.inner.target.target()
    }

    /// Get the value of `key`, subscribing to that key only.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        Runtime::track(self.target(), Key::field(key));
        self.inner.entries.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        Runtime::track(self.target(), Key::field(key));
        self.inner.entries.borrow().contains_key(key)
    }

    /// All keys in insertion order, subscribing to the key set.
    pub fn keys(&self) -> Vec<String> {
        Runtime::track(self.target(), Key::Iterate);
        self.inner.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        Runtime::track(self.target(), Key::Iterate);
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or overwrite `key`. Returns the previous value.
    ///
    /// A new key notifies enumerators as well as readers of the key; an
    /// overwrite notifies readers of the key only.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let previous = self.inner.entries.borrow_mut().insert(key.clone(), value);
        let change = if previous.is_some() {
            ChangeKind::Set
        } else {
            ChangeKind::Add
        };
        Runtime::trigger(self.target(), change, Some(Key::Field(key)));
        previous
    }

    /// Remove `key`. Notifies only if the key was present.
    pub fn remove(&self, key: &str) -> Option<V> {
        let removed = self.inner.entries.borrow_mut().shift_remove(key);
        if removed.is_some() {
            Runtime::trigger(self.target(), ChangeKind::Delete, Some(Key::field(key)));
        }
        removed
    }

    /// Remove every key. Notifies every subscriber of the record if it was
    /// not already empty.
    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.inner.entries.borrow_mut());
        if !previous.is_empty() {
            Runtime::trigger(self.target(), ChangeKind::Clear, None);
        }
    }
}

impl<V: 'static> Default for ReactiveRecord<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: 'static> FromIterator<(K, V)> for ReactiveRecord<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<V> Clone for ReactiveRecord<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: Debug> Debug for ReactiveRecord<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveRecord")
            .field("target", &self.inner.target.target().id())
            .field("entries", &*self.inner.entries.borrow())
            .finish()
    }
}
