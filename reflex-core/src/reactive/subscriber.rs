//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that can sit in a [`Dep`]: today that is
//! [`ReactiveEffect`](super::ReactiveEffect), behind a type-erased handle so
//! Deps do not care about an effect's return type.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::Dep;

/// Unique identifier for an effect.
///
/// Dep membership, the re-entry guard and self-trigger suppression all
/// compare effects by this ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// The type-erased view of an effect used by Deps and the tracking context.
pub(crate) trait Subscriber {
    fn id(&self) -> EffectId;

    /// Whether the effect still reacts to writes.
    fn is_active(&self) -> bool;

    /// Called when one of the effect's Deps is triggered.
    fn notify(self: Rc<Self>);

    /// Record that the effect joined `dep`.
    fn attach(&self, dep: Rc<Dep>);

    /// Take ownership of an effect created during this one's run.
    fn adopt(&self, child: Rc<dyn Subscriber>);

    fn stop(&self);
}
