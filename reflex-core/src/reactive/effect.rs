//! Effect Implementation
//!
//! An Effect is a re-runnable computation whose dependencies are
//! rediscovered on every run.
//!
//! # How Effects Work
//!
//! 1. A run pushes the effect onto the reactive context and takes the next
//!    tracking generation bit.
//!
//! 2. Every Dep the effect already belongs to is marked *was-tracked* for
//!    that bit. Reads during the body mark Deps *new-tracked* and subscribe
//!    the effect to Deps it was not in yet.
//!
//! 3. When the body returns (or panics), Deps that were tracked before but
//!    not read this time drop the effect. Both markers are cleared so the
//!    bit can be reused by the next run at that depth.
//!
//! Runs nested deeper than the marker width skip steps 2 and 3: the effect
//! leaves all of its Deps up front and re-subscribes during the body.
//!
//! # Re-entry
//!
//! An effect that is already somewhere in the chain of running effects does
//! not run again: [`ReactiveEffect::run`] returns `None` instead.
//!
//! # Ownership
//!
//! Effects created while another effect runs are owned by it, unless created
//! with [`EffectOptions::detached`]. An owner stops the effects it owns
//! before each re-run and when it stops, so inner effects re-created on
//! every outer run do not pile up subscriptions.
//!
//! Deps only hold effects weakly. An effect lives as long as one of its
//! handles or its owner does; dropping the last of them stops it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::{Generation, ReactiveContext};
use super::subscriber::{EffectId, Subscriber};
use crate::store::Dep;

type DepList = SmallVec<[Rc<Dep>; 4]>;

/// Type-independent state of an effect.
pub(crate) struct EffectState {
    id: EffectId,
    active: Cell<bool>,
    /// Deps this effect is a member of, in the order it joined them.
    deps: RefCell<DepList>,
    defer_stop: Cell<bool>,
    run_count: Cell<usize>,
    /// Effects created during the last run.
    children: RefCell<Vec<Rc<dyn Subscriber>>>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl EffectState {
    fn new(on_stop: Option<Box<dyn FnOnce()>>) -> Self {
        Self {
            id: EffectId::new(),
            active: Cell::new(true),
            deps: RefCell::new(SmallVec::new()),
            defer_stop: Cell::new(false),
            run_count: Cell::new(0),
            children: RefCell::new(Vec::new()),
            on_stop: RefCell::new(on_stop),
        }
    }

    fn init_dep_markers(&self, bit: u32) {
        for dep in self.deps.borrow().iter() {
            dep.mark_was_tracked(bit);
        }
    }

    /// Drop Deps that were tracked before this run but not read during it.
    fn finalize_dep_markers(&self, bit: u32) {
        let id = self.id;
        self.deps.borrow_mut().retain(|dep| {
            let stale = dep.was_tracked(bit) && !dep.new_tracked(bit);
            if stale {
                dep.remove(id);
            }
            dep.clear_markers(bit);
            !stale
        });
    }

    /// Leave every Dep.
    fn cleanup_deps(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in &deps {
            dep.remove(self.id);
        }
    }

    fn release_children(&self) {
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.stop();
        }
    }

    fn stop(&self) {
        if ReactiveContext::is_running(self.id) {
            trace!(effect = ?self.id, "deferring stop until the run completes");
            self.defer_stop.set(true);
            return;
        }
        self.release();
    }

    /// Deactivate, leave every Dep and stop owned effects.
    fn release(&self) {
        if !self.active.replace(false) {
            return;
        }

        self.cleanup_deps();
        self.release_children();

        let on_stop = self.on_stop.borrow_mut().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
        debug!(effect = ?self.id, "effect stopped");
    }
}

// The last handle is gone, so the effect cannot be on the running stack.
impl Drop for EffectState {
    fn drop(&mut self) {
        self.release();
    }
}

struct EffectCore<T> {
    state: EffectState,
    body: Rc<dyn Fn() -> T>,
    scheduler: Option<Rc<dyn Fn(EffectId)>>,
}

impl<T: 'static> Subscriber for EffectCore<T> {
    fn id(&self) -> EffectId {
        self.state.id
    }

    fn is_active(&self) -> bool {
        self.state.active.get()
    }

    fn notify(self: Rc<Self>) {
        if let Some(scheduler) = self.scheduler.clone() {
            scheduler(self.state.id);
            return;
        }
        ReactiveEffect { core: self }.run();
    }

    fn attach(&self, dep: Rc<Dep>) {
        self.state.deps.borrow_mut().push(dep);
    }

    fn adopt(&self, child: Rc<dyn Subscriber>) {
        self.state.children.borrow_mut().push(child);
    }

    fn stop(&self) {
        self.state.stop();
    }
}

/// Finishes a run: reconciles markers, leaves the reactive context, then
/// applies a stop requested during the run.
struct RunGuard<'a> {
    state: &'a EffectState,
    scope: Option<ReactiveContext>,
}

impl RunGuard<'_> {
    fn generation(&self) -> Generation {
        self.scope
            .as_ref()
            .map_or(Generation::Overflow, ReactiveContext::generation)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            if let Generation::Marked(bit) = scope.generation() {
                self.state.finalize_dep_markers(bit);
            }
            drop(scope);
        }
        if self.state.defer_stop.replace(false) {
            self.state.stop();
        }
    }
}

/// Options for creating an effect.
#[derive(Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    /// Do not become owned by the effect that is running at creation.
    pub detached: bool,
    scheduler: Option<Rc<dyn Fn(EffectId)>>,
    on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    /// Call `scheduler` on trigger instead of re-running the effect.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(EffectId) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Call `on_stop` once, when the effect stops.
    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_stop = Some(Box::new(on_stop));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("detached", &self.detached)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// A re-runnable computation that tracks what it reads.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{ReactiveEffect, TrackedCell};
///
/// let count = TrackedCell::new(1);
/// let reader = count.clone();
/// let effect = ReactiveEffect::new(move || reader.get() * 2);
///
/// assert_eq!(effect.run(), Some(2));
/// assert_eq!(effect.dependency_count(), 1);
/// ```
pub struct ReactiveEffect<T> {
    core: Rc<EffectCore<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect without running it.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::from_body(Rc::new(body), EffectOptions::default())
    }

    pub(crate) fn from_body(body: Rc<dyn Fn() -> T>, options: EffectOptions) -> Self {
        Self {
            core: Rc::new(EffectCore {
                state: EffectState::new(options.on_stop),
                body,
                scheduler: options.scheduler,
            }),
        }
    }

    pub(crate) fn body(&self) -> Rc<dyn Fn() -> T> {
        Rc::clone(&self.core.body)
    }

    pub(crate) fn subscriber(&self) -> Rc<dyn Subscriber> {
        self.core.clone()
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.core.state.id
    }

    /// Run the body, re-collecting dependencies.
    ///
    /// A stopped effect just runs its body, without tracking. Returns `None`
    /// if the effect is already running further up the call chain.
    pub fn run(&self) -> Option<T> {
        let state = &self.core.state;
        if !state.active.get() {
            return Some((self.core.body)());
        }
        if ReactiveContext::is_running(state.id) {
            trace!(effect = ?state.id, "skipping re-entrant run");
            return None;
        }

        // Owned effects from the previous run are replaced by this one.
        state.release_children();

        let guard = RunGuard {
            state,
            scope: Some(ReactiveContext::enter(self.subscriber())),
        };

        match guard.generation() {
            Generation::Marked(bit) => state.init_dep_markers(bit),
            Generation::Overflow => {
                debug!(
                    effect = ?state.id,
                    depth = ReactiveContext::depth(),
                    "nesting exceeds marker bits, re-subscribing from scratch"
                );
                state.cleanup_deps();
            }
        }

        state.run_count.set(state.run_count.get() + 1);
        trace!(effect = ?state.id, run = state.run_count.get(), "running effect");

        let result = (self.core.body)();
        drop(guard);
        Some(result)
    }

    /// Unsubscribe from every Dep and stop reacting to writes.
    ///
    /// Called from inside the effect's own run, the stop takes effect when
    /// the run completes. Stopping twice is a no-op.
    pub fn stop(&self) {
        self.core.state.stop();
    }

    /// Check whether the effect still reacts to writes.
    pub fn is_active(&self) -> bool {
        self.core.state.active.get()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.core.state.run_count.get()
    }

    /// Number of Deps the effect belongs to.
    pub fn dependency_count(&self) -> usize {
        self.core.state.deps.borrow().len()
    }
}

impl<T> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = &self.core.state;
        f.debug_struct("ReactiveEffect")
            .field("id", &state.id)
            .field("active", &state.active.get())
            .field("run_count", &state.run_count.get())
            .field("dependency_count", &state.deps.borrow().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
