//! Integration Tests for Dependency Tracking
//!
//! These tests verify that effects, the coordinator and the tracked
//! wrappers work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reflex_core::reactive::{
    effect, pause_tracking, reset_tracking, EffectRunner, ReactiveEffect, ReactiveList,
    ReactiveRecord, Runtime, TrackedCell,
};
use reflex_core::store::Key;

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

fn bump(count: &Cell<usize>) {
    count.set(count.get() + 1);
}

fn record(entries: &[(&str, i32)]) -> ReactiveRecord<i32> {
    entries.iter().map(|(k, v)| (*k, *v)).collect()
}

/// `x = reactive({a: 1}); effect(() => log(x.a))`
#[test]
fn logs_once_per_relevant_write() {
    let x = record(&[("a", 1)]);
    let log = Rc::new(RefCell::new(Vec::new()));

    let (reader, sink) = (x.clone(), log.clone());
    let _runner = effect(move || sink.borrow_mut().push(reader.get("a").unwrap_or_default()));
    assert_eq!(*log.borrow(), vec![1]);

    x.insert("a", 2);
    assert_eq!(*log.borrow(), vec![1, 2]);

    // The effect never read `b`.
    x.insert("b", 3);
    assert_eq!(*log.borrow(), vec![1, 2]);
}

#[test]
fn subscribe_on_read() {
    let x = record(&[("a", 1), ("b", 2)]);
    let reader = x.clone();
    let runner = effect(move || {
        reader.get("a");
        reader.get("b");
    });

    let snapshot = Runtime::snapshot();
    let id = runner.effect().id().raw();
    for key in ["a", "b"] {
        let subscribers = snapshot.subscribers(x.target().id(), &Key::field(key)).unwrap();
        assert_eq!(subscribers, &[id]);
    }
}

#[test]
fn unsubscribe_on_stop() {
    let x = record(&[("a", 1)]);
    let runs = counter();
    let (reader, runs_clone) = (x.clone(), runs.clone());
    let runner = effect(move || {
        reader.get("a");
        bump(&runs_clone);
    });

    runner.stop();
    let snapshot = Runtime::snapshot();
    assert_eq!(snapshot.subscribers(x.target().id(), &Key::field("a")), Some(&[][..]));

    x.insert("a", 2);
    x.insert("a", 3);
    assert_eq!(runs.get(), 1);
}

#[test]
fn stale_dependencies_stop_notifying() {
    let x = record(&[("a", 1), ("b", 2)]);
    let use_a = TrackedCell::new(true);
    let runs = counter();

    let (reader, switch, runs_clone) = (x.clone(), use_a.clone(), runs.clone());
    let _runner = effect(move || {
        bump(&runs_clone);
        if switch.get() {
            reader.get("a");
        } else {
            reader.get("b");
        }
    });

    use_a.set(false);
    assert_eq!(runs.get(), 2);

    x.insert("a", 10);
    assert_eq!(runs.get(), 2);

    x.insert("b", 20);
    assert_eq!(runs.get(), 3);
}

#[test]
fn effect_writing_what_it_reads_does_not_loop() {
    let count = TrackedCell::new(0);
    let runs = counter();
    let (cell, runs_clone) = (count.clone(), runs.clone());

    let _runner = effect(move || {
        bump(&runs_clone);
        let value = cell.get();
        cell.set(value + 1);
    });

    assert_eq!(runs.get(), 1);
    assert_eq!(count.get_untracked(), 1);

    count.set(10);
    assert_eq!(runs.get(), 2);
    assert_eq!(count.get_untracked(), 11);
}

#[test]
fn reentry_through_the_parent_chain_returns_early() {
    let outer_slot: Rc<RefCell<Option<ReactiveEffect<()>>>> = Rc::new(RefCell::new(None));
    let inner_result = Rc::new(Cell::new(Some(())));

    let (slot, result) = (outer_slot.clone(), inner_result.clone());
    let outer = ReactiveEffect::new(move || {
        let (slot, result) = (slot.clone(), result.clone());
        // The inner effect tries to re-run its parent.
        let _inner = effect(move || {
            if let Some(outer) = slot.borrow().as_ref() {
                result.set(outer.run());
            }
        });
    });
    *outer_slot.borrow_mut() = Some(outer.clone());

    assert_eq!(outer.run(), Some(()));
    assert_eq!(inner_result.get(), None);
    assert_eq!(outer.run_count(), 1);
    outer.stop();
}

#[test]
fn mutually_triggering_effects_terminate() {
    let a = TrackedCell::new(0);
    let b = TrackedCell::new(0);
    let (a_runs, b_runs) = (counter(), counter());

    let (a1, b1, runs) = (a.clone(), b.clone(), a_runs.clone());
    let _first = effect(move || {
        bump(&runs);
        let value = a1.get();
        b1.set(value + 1);
    });

    let (a2, b2, runs) = (a.clone(), b.clone(), b_runs.clone());
    let _second = effect(move || {
        bump(&runs);
        let value = b2.get();
        a2.set(value + 1);
    });

    assert_eq!(a_runs.get(), 2);
    assert_eq!(b_runs.get(), 1);
}

#[test]
fn adding_a_key_reruns_enumerators_only() {
    let x: ReactiveRecord<i32> = ReactiveRecord::new();
    let (enumerations, lookups) = (counter(), counter());

    let (reader, runs) = (x.clone(), enumerations.clone());
    let _enumerator = effect(move || {
        reader.keys();
        bump(&runs);
    });
    let (reader, runs) = (x.clone(), lookups.clone());
    let _lookup = effect(move || {
        reader.get("a");
        bump(&runs);
    });

    x.insert("z", 1);
    assert_eq!(enumerations.get(), 2);
    assert_eq!(lookups.get(), 1);

    // A plain update of an existing key leaves enumerators alone.
    x.insert("z", 2);
    assert_eq!(enumerations.get(), 2);

    x.remove("z");
    assert_eq!(enumerations.get(), 3);
}

#[test]
fn each_affected_effect_runs_once_per_write() {
    let x: ReactiveRecord<i32> = ReactiveRecord::new();
    let runs = counter();
    let (reader, runs_clone) = (x.clone(), runs.clone());
    let _runner = effect(move || {
        reader.get("a");
        reader.keys();
        bump(&runs_clone);
    });

    // Notifies both the `a` Dep and the iteration Dep.
    x.insert("a", 1);
    assert_eq!(runs.get(), 2);
}

/// `effect(() => { x.a; effect(() => { x.b }) })`
#[test]
fn nested_effects_rerun_independently() {
    let x = record(&[("a", 1), ("b", 2)]);
    let (outer_runs, inner_runs) = (counter(), counter());

    let (reader, outer_count, inner_count) = (x.clone(), outer_runs.clone(), inner_runs.clone());
    let _outer = effect(move || {
        reader.get("a");
        bump(&outer_count);

        let (reader, inner_count) = (reader.clone(), inner_count.clone());
        let _inner = effect(move || {
            reader.get("b");
            bump(&inner_count);
        });
    });
    assert_eq!((outer_runs.get(), inner_runs.get()), (1, 1));

    x.insert("b", 3);
    assert_eq!((outer_runs.get(), inner_runs.get()), (1, 2));

    x.insert("a", 4);
    assert_eq!((outer_runs.get(), inner_runs.get()), (2, 3));

    // The inner effect from the first outer run was stopped: only the
    // current one is still subscribed to `b`.
    let snapshot = Runtime::snapshot();
    assert_eq!(snapshot.subscribers(x.target().id(), &Key::field("b")).map(<[u64]>::len), Some(1));

    x.insert("b", 5);
    assert_eq!((outer_runs.get(), inner_runs.get()), (2, 4));
}

#[test]
fn detached_inner_effects_survive_outer_reruns() {
    use reflex_core::reactive::{effect_with_options, EffectOptions};

    let x = record(&[("a", 1), ("b", 2)]);
    let inner_runs = counter();
    // Detached effects are only kept alive by their handles.
    let inner_handles = Rc::new(RefCell::new(Vec::new()));

    let (reader, inner_count, handles) = (x.clone(), inner_runs.clone(), inner_handles.clone());
    let _outer = effect(move || {
        reader.get("a");
        let (reader, inner_count) = (reader.clone(), inner_count.clone());
        let inner = effect_with_options(
            move || {
                reader.get("b");
                bump(&inner_count);
            },
            EffectOptions::new().detached(),
        );
        handles.borrow_mut().push(inner);
    });

    x.insert("a", 10);
    assert_eq!(inner_runs.get(), 2);

    // Both detached inner effects still react.
    x.insert("b", 20);
    assert_eq!(inner_runs.get(), 4);

    // Dropping the handles lets them go.
    inner_handles.borrow_mut().clear();
    x.insert("b", 30);
    assert_eq!(inner_runs.get(), 4);
}

#[test]
fn dropped_runner_and_wrapper_release_the_target() {
    let x = record(&[("a", 1)]);
    let target = x.target().id();
    let body_alive = Rc::new(());

    let (reader, captured) = (x.clone(), body_alive.clone());
    let runner = effect(move || {
        let _alive = &captured;
        reader.get("a");
    });
    assert!(Runtime::snapshot().targets.iter().any(|t| t.target == target.raw()));

    drop(runner);
    drop(x);
    assert_eq!(Rc::strong_count(&body_alive), 1);
    assert!(Runtime::snapshot().targets.iter().all(|t| t.target != target.raw()));
}

#[test]
fn dropped_runner_stops_reacting() {
    let x = record(&[("a", 1)]);
    let runs = counter();
    let (reader, runs_clone) = (x.clone(), runs.clone());
    let runner = effect(move || {
        reader.get("a");
        bump(&runs_clone);
    });

    drop(runner);
    x.insert("a", 2);
    assert_eq!(runs.get(), 1);
    assert_eq!(Runtime::snapshot().subscribers(x.target().id(), &Key::field("a")), Some(&[][..]));
}

#[test]
fn deep_nesting_past_the_marker_width_stays_correct() {
    const DEPTH: usize = 40;

    fn nest(level: usize, x: ReactiveRecord<i32>, runs: Rc<Vec<Cell<usize>>>) -> EffectRunner<()> {
        effect(move || {
            x.get(&format!("k{level}"));
            runs[level].set(runs[level].get() + 1);
            if level + 1 < DEPTH {
                nest(level + 1, x.clone(), runs.clone());
            }
        })
    }

    let x: ReactiveRecord<i32> = (0..DEPTH).map(|i| (format!("k{i}"), 0)).collect();
    let runs: Rc<Vec<Cell<usize>>> = Rc::new((0..DEPTH).map(|_| Cell::new(0)).collect());
    let _root = nest(0, x.clone(), runs.clone());

    assert!(runs.iter().all(|r| r.get() == 1));

    let snapshot = Runtime::snapshot();
    for level in 0..DEPTH {
        let subscribers = snapshot
            .subscribers(x.target().id(), &Key::field(format!("k{level}")))
            .unwrap();
        assert_eq!(subscribers.len(), 1, "level {level}");
    }

    // The deepest effect re-runs alone.
    x.insert(format!("k{}", DEPTH - 1), 1);
    assert_eq!(runs[DEPTH - 1].get(), 2);
    assert_eq!(runs[DEPTH - 2].get(), 1);
}

#[test]
fn panicking_effect_does_not_poison_tracking() {
    let x = record(&[("a", 1)]);
    let reader = x.clone();
    let fail = true;
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        effect(move || {
            reader.get("a");
            if fail {
                panic!("effect body failed");
            }
        })
    }));
    assert!(result.is_err());
    assert!(!Runtime::is_tracking());

    // Reads outside any effect are not attributed to the failed one.
    let other = TrackedCell::new(0);
    other.get();
    let snapshot = Runtime::snapshot();
    assert!(snapshot.targets.iter().all(|t| t.target != other.target().id().raw()));
}

#[test]
fn paused_tracking_hides_reads() {
    let x = record(&[("a", 1)]);
    let runs = counter();
    let (reader, runs_clone) = (x.clone(), runs.clone());
    let _runner = effect(move || {
        pause_tracking();
        reader.get("a");
        reset_tracking();
        bump(&runs_clone);
    });

    x.insert("a", 2);
    assert_eq!(runs.get(), 1);
}

#[test]
fn list_length_writes_notify_truncated_readers() {
    let list = ReactiveList::from(vec!["a", "b", "c"]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (reader, sink) = (list.clone(), seen.clone());
    let _runner = effect(move || sink.borrow_mut().push(reader.get(2)));

    list.truncate(1);
    list.push("x");
    assert_eq!(*seen.borrow(), vec![Some("c"), None]);

    list.push("y");
    assert_eq!(*seen.borrow(), vec![Some("c"), None, Some("y")]);
}
