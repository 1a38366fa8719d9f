//! Reactive List
//!
//! An index-addressed sequence. Each index and the length are tracked
//! separately. Shrinking the list notifies readers of `length` and of every
//! index at or past the new length; growing it notifies readers of the new
//! index and of `length`.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::Runtime;
use crate::store::{ChangeKind, Key, OwnedTarget, Target, TargetKind};

struct ListInner<T> {
    target: OwnedTarget,
    items: RefCell<Vec<T>>,
}

/// A tracked `Vec`.
pub struct ReactiveList<T> {
    inner: Rc<ListInner<T>>,
}

impl<T: 'static> ReactiveList<T> {
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    pub fn target(&self) -> &Target {
        self.inner.target.target()
    }

    /// Get the item at `index`, subscribing to that index.
    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        Runtime::track(self.target(), Key::Index(index));
        self.inner.items.borrow().get(index).cloned()
    }

    /// Current length, subscribing to `length`.
    pub fn len(&self) -> usize {
        Runtime::track(self.target(), Key::Length);
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out every item, subscribing to `length` and to each index.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let len = self.len();
        for index in 0..len {
            Runtime::track(self.target(), Key::Index(index));
        }
        self.inner.items.borrow().clone()
    }

    /// Overwrite the item at `index`, or append when `index` equals the
    /// length. Returns `false` and stores nothing past the end.
    pub fn set(&self, index: usize, value: T) -> bool {
        let len = self.inner.items.borrow().len();
        if index == len {
            self.push(value);
            return true;
        }
        if index > len {
            return false;
        }

        let previous = std::mem::replace(&mut self.inner.items.borrow_mut()[index], value);
        drop(previous);
        Runtime::trigger(self.target(), ChangeKind::Set, Some(Key::Index(index)));
        true
    }

    pub fn push(&self, value: T) {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            items.push(value);
            items.len() - 1
        };
        Runtime::trigger(self.target(), ChangeKind::Add, Some(Key::Index(index)));
    }

    pub fn pop(&self) -> Option<T> {
        let (popped, new_len) = {
            let mut items = self.inner.items.borrow_mut();
            let popped = items.pop();
            (popped, items.len())
        };
        if popped.is_some() {
            Runtime::trigger(self.target(), ChangeKind::Length(new_len), Some(Key::Length));
        }
        popped
    }

    /// Shorten the list to `new_len`. No-op if it is not longer than that.
    pub fn truncate(&self, new_len: usize) {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            if new_len >= items.len() {
                return;
            }
            items.split_off(new_len)
        };
        Runtime::trigger(self.target(), ChangeKind::Length(new_len), Some(Key::Length));
        drop(removed);
    }
}

impl<T: 'static> Default for ReactiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> From<Vec<T>> for ReactiveList<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(ListInner {
                target: OwnedTarget::new(TargetKind::Array),
                items: RefCell::new(items),
            }),
        }
    }
}

impl<T> Clone for ReactiveList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for ReactiveList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveList")
            .field("target", &self.inner.target.target().id())
            .field("items", &*self.inner.items.borrow())
            .finish()
    }
}
