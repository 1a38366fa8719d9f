//! Reactive Runtime
//!
//! The runtime is the tracking coordinator. It connects reads and writes on
//! targets with the effects that depend on them.
//!
//! # How It Works
//!
//! 1. A tracked wrapper reads a field and calls [`Runtime::track`]. If an
//!    effect is running and tracking is not paused, the effect joins the Dep
//!    for that field.
//!
//! 2. A tracked wrapper writes a field and calls [`Runtime::trigger`]. The
//!    store selects the Deps the write affects; their effects are merged
//!    into one ordered set, so each runs exactly once per write.
//!
//! 3. Effects re-run synchronously and depth-first, in the order they first
//!    subscribed. The effect performing the write is skipped.
//!
//! Deps hold effects weakly, so an effect whose handles are all dropped
//! stops reacting and no longer keeps its targets' Deps alive.
//!
//! # Threading
//!
//! All tracking state is thread-local. Effects and tracked wrappers are
//! `!Send`, so a dependency graph never spans threads.

use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::context::{Generation, ReactiveContext};
use super::effect::{EffectOptions, ReactiveEffect};
use super::subscriber::{EffectId, Subscriber};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackError};
use crate::store::{with_store, ChangeKind, Dep, Key, StoreSnapshot, Target};

/// The tracking coordinator for the current thread.
pub struct Runtime;

impl Runtime {
    /// Record that the running effect read `key` of `target`.
    ///
    /// No-op when no effect is running or tracking is paused.
    pub fn track(target: &Target, key: Key) {
        let Some((active, generation)) = ReactiveContext::tracking_subscriber() else {
            return;
        };
        let dep = with_store(|store| store.get_or_create_dep(target.id(), key));
        track_effect(&dep, active, generation);
    }

    /// Re-run every effect affected by a write to `target`.
    ///
    /// `key` is the written key; it is ignored for [`ChangeKind::Clear`] and
    /// for [`ChangeKind::Length`] on arrays.
    pub fn trigger(target: &Target, change: ChangeKind, key: Option<Key>) {
        let deps = with_store(|store| store.select_deps(target, change, key.as_ref()));
        if deps.is_empty() {
            return;
        }

        let mut effects: IndexMap<EffectId, Weak<dyn Subscriber>> = IndexMap::new();
        for dep in &deps {
            for subscriber in dep.subscribers() {
                effects
                    .entry(subscriber.id())
                    .or_insert_with(|| Rc::downgrade(&subscriber));
            }
        }
        drop(deps);

        let writer = ReactiveContext::current_effect();
        debug!(
            target_id = target.id().raw(),
            ?change,
            ?key,
            effects = effects.len(),
            "trigger"
        );

        for (id, subscriber) in effects {
            // An earlier effect may have stopped or dropped this one.
            let Some(subscriber) = subscriber.upgrade() else {
                continue;
            };
            if Some(id) == writer || !subscriber.is_active() {
                continue;
            }
            subscriber.notify();
        }
    }

    /// Apply `config` to this thread's tracker.
    ///
    /// Refused while any effect is running, since the running generations
    /// were allocated under the old limit.
    pub fn configure(config: TrackerConfig) -> Result<()> {
        if let Err(err) = config.validate() {
            warn!(%err, "rejected tracker config");
            return Err(err);
        }
        let depth = ReactiveContext::depth();
        if depth > 0 {
            let err = TrackError::ConfigureWhileRunning { depth };
            warn!(%err, "rejected tracker config");
            return Err(err);
        }
        ReactiveContext::set_max_marker_bits(config.max_marker_bits);
        debug!(max_marker_bits = config.max_marker_bits, "tracker configured");
        Ok(())
    }

    /// The configuration currently in effect on this thread.
    pub fn config() -> TrackerConfig {
        TrackerConfig::default().with_max_marker_bits(ReactiveContext::max_marker_bits())
    }

    /// The effect currently collecting dependencies, if any.
    pub fn current_effect() -> Option<EffectId> {
        ReactiveContext::current_effect()
    }

    /// Check whether reads are currently being recorded.
    pub fn is_tracking() -> bool {
        ReactiveContext::should_track() && ReactiveContext::is_active()
    }

    /// Serializable view of this thread's Dep store.
    pub fn snapshot() -> StoreSnapshot {
        with_store(|store| store.snapshot())
    }
}

/// Subscribe `active` to `dep` using the generation markers when available.
fn track_effect(dep: &Rc<Dep>, active: Rc<dyn Subscriber>, generation: Generation) {
    let should_track = match generation {
        Generation::Marked(bit) => {
            if dep.new_tracked(bit) {
                false
            } else {
                dep.mark_new_tracked(bit);
                !dep.was_tracked(bit)
            }
        }
        Generation::Overflow => !dep.contains(active.id()),
    };

    if should_track {
        trace!(effect = ?active.id(), "subscribed");
        dep.insert(&active);
        active.attach(dep.clone());
    }
}

/// Handle returned by [`effect`]: re-runs or stops the underlying effect.
pub struct EffectRunner<T> {
    effect: ReactiveEffect<T>,
}

impl<T: 'static> EffectRunner<T> {
    /// Run the effect now. See [`ReactiveEffect::run`].
    pub fn run(&self) -> Option<T> {
        self.effect.run()
    }

    pub fn effect(&self) -> &ReactiveEffect<T> {
        &self.effect
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    /// Turn the handle into a plain closure.
    pub fn into_fn(self) -> impl Fn() -> Option<T> {
        move || self.effect.run()
    }
}

impl<T> Clone for EffectRunner<T> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
        }
    }
}

impl<T> std::fmt::Debug for EffectRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EffectRunner").field(&self.effect).finish()
    }
}

/// Create an effect and run it once.
///
/// ```rust
/// use reflex_core::reactive::{effect, TrackedCell};
///
/// let count = TrackedCell::new(1);
/// let reader = count.clone();
/// let runner = effect(move || reader.get());
///
/// count.set(2);
/// assert_eq!(runner.effect().run_count(), 2);
/// ```
pub fn effect<T, F>(body: F) -> EffectRunner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    effect_with_options(body, EffectOptions::default())
}

/// Create an effect with explicit [`EffectOptions`].
pub fn effect_with_options<T, F>(body: F, options: EffectOptions) -> EffectRunner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    start(Rc::new(body), options)
}

/// Create a new effect around the body of an existing one.
///
/// The new effect has its own dependencies and lifecycle.
pub fn effect_from<T: 'static>(runner: &EffectRunner<T>) -> EffectRunner<T> {
    start(runner.effect.body(), EffectOptions::default())
}

fn start<T: 'static>(body: Rc<dyn Fn() -> T>, options: EffectOptions) -> EffectRunner<T> {
    let lazy = options.lazy;
    let detached = options.detached;
    let effect = ReactiveEffect::from_body(body, options);

    if !detached {
        if let Some(owner) = ReactiveContext::current_subscriber() {
            owner.adopt(effect.subscriber());
        }
    }
    if !lazy {
        effect.run();
    }
    EffectRunner { effect }
}

/// Stop the effect behind `runner`.
pub fn stop<T: 'static>(runner: &EffectRunner<T>) {
    runner.stop();
}
