//! Reactive Context
//!
//! The reactive context tracks which effect is currently running, whether
//! reads should be tracked, and which tracking generation the running effect
//! owns.
//!
//! # Implementation
//!
//! We use a thread-local stack of running effects. Entering a run pushes the
//! effect and allocates the next generation bit (`1 << depth`); leaving pops
//! it and restores the previous should-track flag. The stack doubles as the
//! parent chain of nested runs, which is what the re-entry guard walks.
//!
//! Generations use `u32` marker words, so at most 31 nesting levels (bit 0
//! unused) can use markers. The configured limit defaults to 30. Deeper runs
//! get [`Generation::Overflow`] and fall back to full cleanup.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::subscriber::{EffectId, Subscriber};
use crate::config::TrackerConfig;

thread_local! {
    static CONTEXT: TrackingContext = TrackingContext::new(TrackerConfig::default());
}

struct TrackingContext {
    /// Running effects, innermost last.
    stack: RefCell<Vec<Rc<dyn Subscriber>>>,
    should_track: Cell<bool>,
    /// Values saved by `pause_tracking` / `enable_tracking`.
    track_stack: RefCell<Vec<bool>>,
    depth: Cell<u32>,
    max_marker_bits: Cell<u32>,
}

impl TrackingContext {
    fn new(config: TrackerConfig) -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            should_track: Cell::new(true),
            track_stack: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            max_marker_bits: Cell::new(config.max_marker_bits),
        }
    }

    fn generation(&self) -> Generation {
        Generation::at_depth(self.depth.get(), self.max_marker_bits.get())
    }
}

/// The tracking generation of a running effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Markers are available: the effect owns this bit in every Dep.
    Marked(u32),
    /// Nesting is deeper than the marker width.
    Overflow,
}

impl Generation {
    fn at_depth(depth: u32, max_marker_bits: u32) -> Self {
        if depth <= max_marker_bits && depth < u32::BITS {
            Generation::Marked(1 << depth)
        } else {
            Generation::Overflow
        }
    }
}

/// Guard for one effect run.
///
/// Dropping it pops the effect and restores the should-track flag, even if
/// the effect body panics.
pub struct ReactiveContext {
    id: EffectId,
    last_should_track: bool,
    generation: Generation,
}

impl ReactiveContext {
    /// Enter a run of `subscriber`.
    ///
    /// Tracking is switched on for the duration of the run.
    pub(crate) fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        CONTEXT.with(|ctx| {
            let id = subscriber.id();
            ctx.stack.borrow_mut().push(subscriber);
            let last_should_track = ctx.should_track.replace(true);
            ctx.depth.set(ctx.depth.get() + 1);

            Self {
                id,
                last_should_track,
                generation: ctx.generation(),
            }
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Check if any effect is running.
    pub fn is_active() -> bool {
        CONTEXT.with(|ctx| !ctx.stack.borrow().is_empty())
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<EffectId> {
        CONTEXT.with(|ctx| ctx.stack.borrow().last().map(|s| s.id()))
    }

    pub(crate) fn current_subscriber() -> Option<Rc<dyn Subscriber>> {
        CONTEXT.with(|ctx| ctx.stack.borrow().last().cloned())
    }

    /// The effect reads should be attributed to, with its generation.
    ///
    /// `None` when nothing is running or tracking is paused.
    pub(crate) fn tracking_subscriber() -> Option<(Rc<dyn Subscriber>, Generation)> {
        CONTEXT.with(|ctx| {
            if !ctx.should_track.get() {
                return None;
            }
            let active = ctx.stack.borrow().last().cloned()?;
            Some((active, ctx.generation()))
        })
    }

    /// Check whether `id` is anywhere in the chain of running effects.
    pub fn is_running(id: EffectId) -> bool {
        CONTEXT
            .try_with(|ctx| ctx.stack.borrow().iter().any(|s| s.id() == id))
            .unwrap_or(false)
    }

    /// Current nesting depth of effect runs.
    pub fn depth() -> u32 {
        CONTEXT.with(|ctx| ctx.depth.get())
    }

    pub fn should_track() -> bool {
        CONTEXT.with(|ctx| ctx.should_track.get())
    }

    pub(crate) fn max_marker_bits() -> u32 {
        CONTEXT.with(|ctx| ctx.max_marker_bits.get())
    }

    pub(crate) fn set_max_marker_bits(bits: u32) {
        CONTEXT.with(|ctx| ctx.max_marker_bits.set(bits));
    }

    fn set_should_track(value: bool) -> bool {
        CONTEXT.with(|ctx| ctx.should_track.replace(value))
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT.with(|ctx| {
            ctx.depth.set(ctx.depth.get().saturating_sub(1));
            ctx.should_track.set(self.last_should_track);
            ctx.stack.borrow_mut().pop()
        });

        // Verify we're popping the right context.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.id(),
                self.id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.id,
                entry.id()
            );
        }
    }
}

/// Suspend tracking until the matching [`reset_tracking`].
pub fn pause_tracking() {
    let previous = ReactiveContext::set_should_track(false);
    CONTEXT.with(|ctx| ctx.track_stack.borrow_mut().push(previous));
}

/// Force tracking on until the matching [`reset_tracking`].
pub fn enable_tracking() {
    let previous = ReactiveContext::set_should_track(true);
    CONTEXT.with(|ctx| ctx.track_stack.borrow_mut().push(previous));
}

/// Undo the last [`pause_tracking`] or [`enable_tracking`].
pub fn reset_tracking() {
    let previous = CONTEXT.with(|ctx| ctx.track_stack.borrow_mut().pop());
    ReactiveContext::set_should_track(previous.unwrap_or(true));
}

struct UntrackedScope {
    previous: bool,
}

impl Drop for UntrackedScope {
    fn drop(&mut self) {
        ReactiveContext::set_should_track(self.previous);
    }
}

/// Run `f` without recording any reads as dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _scope = UntrackedScope {
        previous: ReactiveContext::set_should_track(false),
    };
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Dep;

    struct StubSubscriber(EffectId);

    impl Subscriber for StubSubscriber {
        fn id(&self) -> EffectId {
            self.0
        }

        fn is_active(&self) -> bool {
            true
        }

        fn notify(self: Rc<Self>) {}

        fn attach(&self, _dep: Rc<Dep>) {}

        fn adopt(&self, _child: Rc<dyn Subscriber>) {}

        fn stop(&self) {}
    }

    fn stub() -> Rc<dyn Subscriber> {
        Rc::new(StubSubscriber(EffectId::new()))
    }

    #[test]
    fn context_tracks_effect() {
        let sub = stub();
        let id = sub.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect().is_none());

        {
            let ctx = ReactiveContext::enter(sub);
            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_effect(), Some(id));
            assert_eq!(ctx.generation(), Generation::Marked(1 << 1));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts_form_a_chain() {
        let outer = stub();
        let inner = stub();
        let (outer_id, inner_id) = (outer.id(), inner.id());

        {
            let ctx1 = ReactiveContext::enter(outer);
            {
                let ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ctx2.generation(), Generation::Marked(1 << 2));
                assert!(ReactiveContext::is_running(outer_id));
                assert!(ReactiveContext::is_running(inner_id));
                assert_eq!(ReactiveContext::current_effect(), Some(inner_id));
            }

            // After inner context drops, outer should be current
            assert_eq!(ctx1.generation(), Generation::Marked(1 << 1));
            assert_eq!(ReactiveContext::current_effect(), Some(outer_id));
            assert!(!ReactiveContext::is_running(inner_id));
        }

        assert!(ReactiveContext::current_effect().is_none());
    }

    #[test]
    fn generation_overflows_past_the_limit() {
        assert_eq!(Generation::at_depth(30, 30), Generation::Marked(1 << 30));
        assert_eq!(Generation::at_depth(31, 30), Generation::Overflow);
        assert_eq!(Generation::at_depth(31, 31), Generation::Marked(1 << 31));
        assert_eq!(Generation::at_depth(32, 31), Generation::Overflow);
    }

    #[test]
    fn entering_restores_should_track() {
        pause_tracking();
        assert!(!ReactiveContext::should_track());
        {
            let _ctx = ReactiveContext::enter(stub());
            assert!(ReactiveContext::should_track());
        }
        assert!(!ReactiveContext::should_track());
        reset_tracking();
        assert!(ReactiveContext::should_track());
    }

    #[test]
    fn pause_and_enable_nest() {
        pause_tracking();
        enable_tracking();
        assert!(ReactiveContext::should_track());
        reset_tracking();
        assert!(!ReactiveContext::should_track());
        reset_tracking();
        assert!(ReactiveContext::should_track());

        // An unmatched reset falls back to tracking.
        reset_tracking();
        assert!(ReactiveContext::should_track());
    }

    #[test]
    fn untracked_restores_after_panic() {
        let result = std::panic::catch_unwind(|| {
            untracked(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert!(ReactiveContext::should_track());
    }

    #[test]
    fn untracked_pauses_tracking() {
        let _ctx = ReactiveContext::enter(stub());
        let inside = untracked(ReactiveContext::tracking_subscriber);
        assert!(inside.is_none());
        assert!(ReactiveContext::tracking_subscriber().is_some());
    }
}
