//! Reactive Primitives
//!
//! This module implements effects and the tracking coordinator that keeps
//! them subscribed to exactly the fields they read.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An effect is a re-runnable computation. Every run rediscovers its
//! dependencies: fields read during the run are subscribed, fields no
//! longer read are dropped. A write to a subscribed field re-runs the
//! effect synchronously.
//!
//! ## Tracked Wrappers
//!
//! [`TrackedCell`], [`ReactiveRecord`] and [`ReactiveList`] are explicit
//! wrappers whose accessors call [`Runtime::track`] and [`Runtime::trigger`].
//! Any other observable type can do the same with its own [`Target`].
//!
//! ## Tracking Generations
//!
//! Each nesting level of running effects owns one bit of the Dep marker
//! words. Reconciling old and new dependencies then costs O(1) per read and
//! O(deps) per run instead of rebuilding subscriptions from scratch.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to
//! automatically detect dependencies. When a field is read, we check if
//! there is an active effect and, if so, register the dependency.
//!
//! [`Target`]: crate::store::Target

mod cell;
mod context;
mod effect;
mod list;
mod record;
mod runtime;
mod subscriber;

pub use cell::{TrackedCell, VALUE_KEY};
pub use context::{
    enable_tracking, pause_tracking, reset_tracking, untracked, Generation, ReactiveContext,
};
pub use effect::{EffectOptions, ReactiveEffect};
pub use list::ReactiveList;
pub use record::ReactiveRecord;
pub use runtime::{effect, effect_from, effect_with_options, stop, EffectRunner, Runtime};
pub use subscriber::EffectId;

pub(crate) use subscriber::Subscriber;
