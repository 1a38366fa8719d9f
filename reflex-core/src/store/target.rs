//! Targets and Keys
//!
//! A target is any mutable record-like value made observable. Targets are
//! identified by instance, never by value: two targets with identical
//! contents still get distinct [`TargetId`]s.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::registry;

/// Unique identifier for a tracked target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// The shape of a target. Decides which extra Deps a write notifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    /// A plain keyed record.
    Object,
    /// An index-addressed sequence with a length.
    Array,
    /// A keyed collection whose values can be iterated on their own.
    Map,
}

/// A target as seen by the tracking core: its identity plus its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    id: TargetId,
    kind: TargetKind,
}

impl Target {
    /// Create a target with a fresh identity.
    pub fn new(kind: TargetKind) -> Self {
        Self {
            id: TargetId::new(),
            kind,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn is_array(&self) -> bool {
        self.kind == TargetKind::Array
    }
}

/// A tracked field of a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field.
    Field(String),
    /// An integer index into an array target.
    Index(usize),
    /// The length of an array target.
    Length,
    /// Synthetic key: the target's key set was enumerated.
    Iterate,
    /// Synthetic key: a map target's keys (not values) were enumerated.
    MapKeyIterate,
}

impl Key {
    pub fn field(name: impl Into<String>) -> Self {
        Key::Field(name.into())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => write!(f, "{name}"),
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("@@iterate"),
            Key::MapKeyIterate => f.write_str("@@map_key_iterate"),
        }
    }
}

/// What kind of write happened to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An existing key got a new value.
    Set,
    /// A key that did not exist before was added.
    Add,
    /// An existing key was removed.
    Delete,
    /// Every key was removed at once.
    Clear,
    /// The length of an array target was written; carries the new length.
    Length(usize),
}

/// A target whose Dep map is forgotten when it is dropped.
///
/// Tracked wrappers hold one of these behind their shared state, so the
/// store entry goes away together with the last clone of the wrapper.
#[derive(Debug)]
pub struct OwnedTarget(Target);

impl OwnedTarget {
    pub fn new(kind: TargetKind) -> Self {
        Self(Target::new(kind))
    }

    pub fn target(&self) -> &Target {
        &self.0
    }
}

impl Drop for OwnedTarget {
    fn drop(&mut self) {
        registry::forget_target(self.0.id());
    }
}
