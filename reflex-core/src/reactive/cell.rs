//! Tracked Cell
//!
//! A [`TrackedCell`] is the smallest observable target: a single value
//! behind one key. Reading it inside an effect subscribes the effect;
//! writing it re-runs every subscriber.
//!
//! # How Cells Work
//!
//! 1. `get`/`with` call [`Runtime::track`] for the cell's `value` key.
//!
//! 2. `set`/`update` store the new value first, then call
//!    [`Runtime::trigger`]. No borrow of the value is held while effects
//!    run, so subscribers can read the cell again.
//!
//! Every write notifies, even if the new value equals the old one.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::Runtime;
use crate::store::{ChangeKind, Key, OwnedTarget, Target, TargetKind};

/// The key a cell's value is tracked under.
pub const VALUE_KEY: &str = "value";

struct CellInner<T> {
    target: OwnedTarget,
    value: RefCell<T>,
}

/// A single tracked value.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::TrackedCell;
///
/// let count = TrackedCell::new(0);
/// count.set(5);
/// assert_eq!(count.get_untracked(), 5);
/// ```
pub struct TrackedCell<T> {
    inner: Rc<CellInner<T>>,
}

impl<T: 'static> TrackedCell<T> {
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                target: OwnedTarget::new(TargetKind::Object),
                value: RefCell::new(value),
            }),
        }
    }

    pub fn target(&self) -> &Target {
        self.inner.target.target()
    }

    fn track(&self) {
        Runtime::track(self.target(), Key::field(VALUE_KEY));
    }

    fn trigger(&self) {
        Runtime::trigger(self.target(), ChangeKind::Set, Some(Key::field(VALUE_KEY)));
    }

    /// Get the current value, subscribing the running effect.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, subscribing the running effect.
    ///
    /// `f` must not write to this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and re-run subscribers.
    pub fn set(&self, value: T) {
        let previous = self.inner.value.replace(value);
        drop(previous);
        self.trigger();
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.borrow();
            f(&guard)
        };
        self.set(new_value);
    }
}

impl<T> Clone for TrackedCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for TrackedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedCell")
            .field("target", &self.inner.target.target().id())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
