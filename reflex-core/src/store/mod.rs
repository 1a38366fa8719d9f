//! Dependency Store
//!
//! This module holds the data side of dependency tracking: which effects
//! read which field of which target.
//!
//! # Overview
//!
//! The store is a two-level mapping:
//!
//! - target ([`TargetId`]) -> key ([`Key`]) -> [`Dep`]
//! - a [`Dep`] is the insertion-ordered set of effects that read that key
//!
//! Entries are created lazily on the first tracked read and stay until the
//! target itself is dropped. Membership inside a Dep is the only thing that
//! changes while effects run.
//!
//! The store is thread-confined. Each thread that tracks reads gets its
//! own, matching the thread-local tracking context in
//! [`reactive`](crate::reactive).

mod dep;
mod registry;
mod target;

pub use dep::Dep;
pub use registry::{DepSnapshot, DepStore, StoreSnapshot, TargetSnapshot};
pub use target::{ChangeKind, Key, OwnedTarget, Target, TargetId, TargetKind};

pub(crate) use registry::with_store;
