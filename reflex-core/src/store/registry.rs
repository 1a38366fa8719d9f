//! Dependency Store
//!
//! The store maps each target to its keys, and each key to the [`Dep`]
//! holding the effects that read it. It is a plain lookup structure: the
//! only side effect of any operation is lazily creating an entry.
//!
//! # Trigger Selection
//!
//! [`DepStore::select_deps`] decides which Deps a write notifies:
//!
//! 1. `Clear` notifies every Dep of the target.
//! 2. `Length(n)` on an array notifies `length` and every index `>= n`.
//! 3. Anything else notifies the written key, plus:
//!    - `Add`: the iteration key for records and maps (and the key-only
//!      iteration key for maps); `length` for arrays getting a new index.
//!    - `Delete`: the iteration key for records and maps (and the key-only
//!      iteration key for maps).
//!    - `Set`: the iteration key for maps, whose value iteration sees updates.
//!
//! Enumeration-sensitive readers sit behind the synthetic iteration keys, so
//! readers of a single field are never re-run by unrelated inserts.
//!
//! Deps are never removed while a target is alive, only their membership
//! changes. A Dep can therefore be iterated while effects it triggers write
//! to the same target.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use super::dep::Dep;
use super::target::{ChangeKind, Key, Target, TargetId, TargetKind};

thread_local! {
    static STORE: RefCell<DepStore> = RefCell::new(DepStore::new());
}

/// Run `f` against this thread's store.
///
/// The borrow must not outlive `f`: callers collect the Deps they need and
/// only then run effects.
pub(crate) fn with_store<R>(f: impl FnOnce(&mut DepStore) -> R) -> R {
    STORE.with(|store| f(&mut store.borrow_mut()))
}

/// Drop the Dep map of a target that no longer exists.
pub(crate) fn forget_target(id: TargetId) {
    // The store may already be gone during thread teardown.
    let removed = STORE
        .try_with(|store| store.borrow_mut().forget(id))
        .ok()
        .flatten();
    drop(removed);
}

type KeyToDep = IndexMap<Key, Rc<Dep>>;

/// Two-level mapping: target -> key -> Dep.
#[derive(Debug, Default)]
pub struct DepStore {
    targets: HashMap<TargetId, KeyToDep>,
}

impl DepStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    /// Fetch the Dep for `(target, key)`, creating it on first use.
    pub fn get_or_create_dep(&mut self, target: TargetId, key: Key) -> Rc<Dep> {
        self.targets
            .entry(target)
            .or_default()
            .entry(key)
            .or_insert_with(|| Rc::new(Dep::new()))
            .clone()
    }

    /// Fetch the Dep for `(target, key)` if anything ever read it.
    pub fn get_dep(&self, target: TargetId, key: &Key) -> Option<Rc<Dep>> {
        self.targets.get(&target)?.get(key).cloned()
    }

    /// Select the Deps notified by a write. Unknown targets and keys
    /// contribute nothing.
    pub fn select_deps(
        &self,
        target: &Target,
        change: ChangeKind,
        key: Option<&Key>,
    ) -> Vec<Rc<Dep>> {
        let Some(deps) = self.targets.get(&target.id()) else {
            return Vec::new();
        };

        match change {
            ChangeKind::Clear => deps.values().cloned().collect(),
            ChangeKind::Length(new_len) if target.is_array() => deps
                .iter()
                .filter(|(key, _)| match key {
                    Key::Length => true,
                    Key::Index(index) => *index >= new_len,
                    _ => false,
                })
                .map(|(_, dep)| dep.clone())
                .collect(),
            ChangeKind::Length(_) => deps.get(&Key::Length).cloned().into_iter().collect(),
            change => {
                let mut selected: Vec<Rc<Dep>> = Vec::with_capacity(3);
                let mut push = |key: &Key| {
                    if let Some(dep) = deps.get(key) {
                        selected.push(dep.clone());
                    }
                };

                if let Some(key) = key {
                    push(key);
                }

                match (change, target.kind()) {
                    (ChangeKind::Add | ChangeKind::Delete, TargetKind::Object) => {
                        push(&Key::Iterate);
                    }
                    (ChangeKind::Add | ChangeKind::Delete, TargetKind::Map) => {
                        push(&Key::Iterate);
                        push(&Key::MapKeyIterate);
                    }
                    (ChangeKind::Add, TargetKind::Array) => {
                        if matches!(key, Some(Key::Index(_))) {
                            push(&Key::Length);
                        }
                    }
                    (ChangeKind::Set, TargetKind::Map) => {
                        push(&Key::Iterate);
                    }
                    _ => {}
                }

                selected
            }
        }
    }

    /// Remove a target's whole Dep map, returning it to the caller.
    pub fn forget(&mut self, target: TargetId) -> Option<IndexMap<Key, Rc<Dep>>> {
        self.targets.remove(&target)
    }

    /// Number of targets that have at least one Dep.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Number of Deps registered for a target.
    pub fn dep_count(&self, target: TargetId) -> usize {
        self.targets.get(&target).map_or(0, |deps| deps.len())
    }

    /// Read-only view of every target, key and subscriber.
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut targets: Vec<TargetSnapshot> = self
            .targets
            .iter()
            .map(|(id, deps)| TargetSnapshot {
                target: id.raw(),
                deps: deps
                    .iter()
                    .map(|(key, dep)| DepSnapshot {
                        key: key.to_string(),
                        subscribers: dep.subscriber_ids().iter().map(|id| id.raw()).collect(),
                    })
                    .collect(),
            })
            .collect();
        targets.sort_by_key(|t| t.target);
        StoreSnapshot { targets }
    }
}

/// Serializable view of the store, for debugging and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub targets: Vec<TargetSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSnapshot {
    pub target: u64,
    pub deps: Vec<DepSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepSnapshot {
    pub key: String,
    pub subscribers: Vec<u64>,
}

impl StoreSnapshot {
    /// Subscribers of `(target, key)`, if the snapshot has that Dep.
    pub fn subscribers(&self, target: TargetId, key: &Key) -> Option<&[u64]> {
        let key = key.to_string();
        self.targets
            .iter()
            .find(|t| t.target == target.raw())?
            .deps
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.subscribers.as_slice())
    }
}
