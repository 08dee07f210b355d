//! Integration Tests for Reactive System
//!
//! These tests verify that signals, memos, effects and owners work together
//! correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use signal_core::{
    batch, create_effect, create_memo, create_projection, create_render_effect, create_root,
    create_signal, flush_sync, flush_sync_with, is_alive, node_observers, node_sources,
    on_cleanup, on_error, provide_context, untrack, use_context, Effect, Memo, ReactiveError,
    Signal,
};

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

fn bump(count: &Cell<usize>) {
    count.set(count.get() + 1);
}

/// Test that a diamond never shows an observer a half-updated graph.
#[test]
fn diamond_is_glitch_free() {
    let (a, set_a) = create_signal(1);
    let a2 = a.clone();
    let b = create_memo(move |_| Ok(a.get() * 2));
    let c = create_memo(move |_| Ok(a2.get() * 3));

    let (d_runs, d_runs_clone) = counter();
    let d = create_memo(move |_| {
        bump(&d_runs_clone);
        Ok(b.try_get()? + c.try_get()?)
    });

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    let _effect = create_effect(move |_| {
        seen_clone.borrow_mut().push(d.try_get()?);
        Ok(())
    });

    set_a.set(2);
    set_a.set(3);

    // Every value is 5 * a; no mix of old and new inputs.
    assert_eq!(*seen.borrow(), vec![5, 10, 15]);
    assert_eq!(d_runs.get(), 3);
}

/// Test that an unchanged memo value stops propagation.
#[test]
fn unchanged_memo_does_not_rerun_observers() {
    let (n, set_n) = create_signal(2);
    let parity = create_memo(move |_| Ok(n.get() % 2));

    let (runs, runs_clone) = counter();
    let label = create_memo(move |_| {
        bump(&runs_clone);
        Ok(if parity.try_get()? == 0 { "even" } else { "odd" })
    });

    assert_eq!(label.get(), "even");
    set_n.set(4);
    assert_eq!(label.get(), "even");
    assert_eq!(runs.get(), 1);

    set_n.set(5);
    assert_eq!(label.get(), "odd");
    assert_eq!(runs.get(), 2);
}

/// Test that untracked reads do not create dependencies.
#[test]
fn untracked_reads_are_not_dependencies() {
    let (tracked, set_tracked) = create_signal(0);
    let (ignored, set_ignored) = create_signal(0);
    let tracked_id = tracked.id();
    let effect = create_effect(move |_| {
        tracked.get();
        untrack(|| ignored.get());
        Ok(())
    });

    set_ignored.set(1);
    assert_eq!(effect.run_count(), 1);

    set_tracked.set(1);
    assert_eq!(effect.run_count(), 2);
    assert_eq!(node_sources(effect.id()), vec![tracked_id]);
}

/// Test that a rerun sees the latest value of a signal it reads untracked.
#[test]
fn untracked_writes_are_seen_on_the_next_run() {
    let (tracked, set_tracked) = create_signal(0);
    let (ignored, set_ignored) = create_signal(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();

    let effect = create_effect(move |_| {
        tracked.get();
        seen_clone.borrow_mut().push(untrack(|| ignored.get()));
        Ok(())
    });

    for value in 1..=3 {
        set_ignored.set(value);
    }
    assert_eq!(effect.run_count(), 1);

    set_tracked.set(1);
    assert_eq!(*seen.borrow(), vec![0, 3]);
}

/// Test that edges follow the branch taken on the latest run.
#[test]
fn dynamic_dependencies_are_pruned() {
    let (use_left, set_use_left) = create_signal(true);
    let (left, set_left) = create_signal("left");
    let (right, set_right) = create_signal("right");
    let left_id = left.id();
    let right_id = right.id();

    let picked = create_memo(move |_| {
        Ok(if use_left.get() { left.get() } else { right.get() })
    });
    let effect = create_effect(move |_| {
        picked.try_get()?;
        Ok(())
    });
    assert!(node_observers(right_id).is_empty());

    set_use_left.set(false);
    assert!(node_observers(left_id).is_empty());
    assert_eq!(node_observers(right_id).len(), 1);

    // The old branch no longer reaches the effect.
    let runs = effect.run_count();
    set_left.set("ignored");
    assert_eq!(effect.run_count(), runs);
    set_right.set("changed");
    assert_eq!(effect.run_count(), runs + 1);
}

/// Test that every source of a node lists it as an observer and vice versa.
#[test]
fn edges_are_mutual() {
    let (a, set_a) = create_signal(1);
    let (b, _set_b) = create_signal(2);
    let a_id = a.id();
    let b_id = b.id();

    let sum = create_memo(move |_| {
        let a = a.get();
        Ok(if a > 0 { a + b.get() } else { a })
    });
    assert_eq!(sum.get(), 3);

    let check = |id| {
        for source in node_sources(id) {
            assert!(node_observers(source).contains(&id));
        }
    };
    check(sum.id());
    assert_eq!(node_sources(sum.id()), vec![a_id, b_id]);

    set_a.set(-1);
    assert_eq!(sum.get(), -1);
    check(sum.id());
    assert_eq!(node_sources(sum.id()), vec![a_id]);
    assert!(node_observers(b_id).is_empty());
}

/// Test that cleanups run in reverse registration order.
#[test]
fn cleanups_run_in_reverse_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = log.clone();

    let root = create_root(move |root| {
        for i in 1..=3 {
            let log = log_clone.clone();
            on_cleanup(move || log.borrow_mut().push(i));
        }
        root
    });

    root.dispose();
    assert_eq!(*log.borrow(), vec![3, 2, 1]);
}

/// Test that nested effects clean up innermost first.
#[test]
fn nested_effects_clean_up_inside_out() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = log.clone();

    let root = create_root(move |root| {
        create_effect(move |_| {
            let log_a = log_clone.clone();
            on_cleanup(move || log_a.borrow_mut().push("A"));

            let log_clone = log_clone.clone();
            create_effect(move |_| {
                let log_b = log_clone.clone();
                on_cleanup(move || log_b.borrow_mut().push("B"));

                let log_c = log_clone.clone();
                create_effect(move |_| {
                    let log_c = log_c.clone();
                    on_cleanup(move || log_c.borrow_mut().push("C"));
                    Ok(())
                });
                Ok(())
            });
            Ok(())
        });
        root
    });
    assert!(log.borrow().is_empty());

    root.dispose();
    assert_eq!(*log.borrow(), vec!["C", "B", "A"]);
}

/// Test that children are disposed, most recent first, before the parent's
/// own cleanups run.
#[test]
fn subtree_disposal_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = log.clone();

    let root = create_root(move |root| {
        let log_parent = log_clone.clone();
        on_cleanup(move || log_parent.borrow_mut().push("parent"));

        for name in ["first", "second"] {
            let log = log_clone.clone();
            create_root(move |_| on_cleanup(move || log.borrow_mut().push(name)));
        }
        root
    });

    root.dispose();
    assert_eq!(*log.borrow(), vec!["second", "first", "parent"]);

    // A second dispose is a no-op.
    root.dispose();
    assert_eq!(log.borrow().len(), 3);
}

/// Test that disposing a tree tears down each subtree's effects, newest
/// first, before that subtree's own cleanups.
#[test]
fn sibling_subtrees_dispose_effects_before_their_owner() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = log.clone();

    let root = create_root(move |root| {
        for subtree in ["s1", "s2"] {
            let log = log_clone.clone();
            create_root(move |_| {
                let log_root = log.clone();
                on_cleanup(move || log_root.borrow_mut().push(format!("{subtree}root")));

                for effect in ["e1", "e2", "e3"] {
                    let log = log.clone();
                    create_effect(move |_| {
                        let log = log.clone();
                        on_cleanup(move || log.borrow_mut().push(format!("{subtree}{effect}")));
                        Ok(())
                    });
                }
            });
        }
        root
    });

    root.dispose();
    assert_eq!(
        *log.borrow(),
        vec!["s2e3", "s2e2", "s2e1", "s2root", "s1e3", "s1e2", "s1e1", "s1root"]
    );
}

/// Test what reads of disposed nodes return.
#[test]
fn disposed_nodes() {
    let (root, count, doubled, effect) = create_root(|root| {
        let count = Signal::new(3);
        let count_clone = count.clone();
        let doubled = create_memo(move |_| Ok(count_clone.get() * 2));
        let doubled_clone = doubled.clone();
        let effect = create_effect(move |_| {
            doubled_clone.try_get()?;
            Ok(())
        });
        (root, count, doubled, effect)
    });
    assert_eq!(doubled.get(), 6);

    root.dispose();
    assert!(root.is_disposed());
    assert!(!is_alive(count.id()));
    assert!(effect.is_disposed());

    // Signals keep their last value; writes are dropped.
    count.set(10);
    assert_eq!(count.get(), 3);
    assert!(matches!(doubled.try_get(), Err(ReactiveError::Disposed(_))));
    assert_eq!(effect.run_count(), 1);
}

/// Test that nodes created under a disposed owner never run.
#[test]
fn creating_under_disposed_owner() {
    let root = create_root(|root| root);
    root.dispose();

    let (runs, runs_clone) = counter();
    let effect = root.run_with(|| {
        create_effect(move |_| {
            bump(&runs_clone);
            Ok(())
        })
    });

    assert!(effect.is_disposed());
    assert_eq!(runs.get(), 0);
}

/// Test that a rerun disposes what the previous run created.
#[test]
fn rerun_disposes_nested_effects() {
    let (outer, set_outer) = create_signal(0);
    let (inner, set_inner) = create_signal(0);
    let (inner_runs, inner_runs_clone) = counter();

    let _outer = create_effect(move |_| {
        outer.get();
        let inner = inner.clone();
        let inner_runs = inner_runs_clone.clone();
        create_effect(move |_| {
            inner.get();
            bump(&inner_runs);
            Ok(())
        });
        Ok(())
    });
    assert_eq!(inner_runs.get(), 1);

    set_outer.set(1);
    assert_eq!(inner_runs.get(), 2);

    // Only the inner effect from the latest outer run is still alive.
    set_inner.set(1);
    assert_eq!(inner_runs.get(), 3);
}

/// Test that effect errors go to the nearest handler.
#[test]
fn errors_reach_the_nearest_handler() {
    let caught = Rc::new(RefCell::new(Vec::new()));
    let caught_clone = caught.clone();
    let (fail, set_fail) = create_signal(false);

    create_root(move |_| {
        on_error(move |error| caught_clone.borrow_mut().push(error.to_string()));
        create_root(move |_| {
            create_effect(move |_| {
                if fail.get() {
                    return Err(ReactiveError::evaluation("boom"));
                }
                Ok(())
            });
        });
    });
    assert!(caught.borrow().is_empty());

    set_fail.set(true);
    assert_eq!(*caught.borrow(), vec!["computation failed: boom"]);
    assert!(flush_sync().is_ok());
}

/// Test that an error nobody handles comes back from `flush_sync`.
#[test]
fn uncaught_errors_surface_from_flush_sync() {
    let (input, set_input) = create_signal(1);
    let checked = create_memo(move |_| match input.get() {
        n if n > 0 => Ok(n),
        _ => Err(ReactiveError::evaluation("must be positive")),
    });

    let _effect = create_effect(move |_| {
        checked.try_get()?;
        Ok(())
    });
    assert!(flush_sync().is_ok());

    let result = flush_sync_with(|| set_input.set(-1));
    assert!(matches!(result, Err(ReactiveError::Evaluation(_))));

    // Reported once.
    assert!(flush_sync().is_ok());
}

/// Test that context is visible to everything below the provider.
#[test]
fn context_lookup_walks_up_the_owner_tree() {
    #[derive(Clone, Debug, PartialEq)]
    struct Theme(&'static str);

    let seen = Rc::new(RefCell::new(None));
    let seen_clone = seen.clone();

    create_root(move |_| {
        provide_context(Theme("dark")).unwrap();
        create_root(move |_| {
            create_effect(move |_| {
                *seen_clone.borrow_mut() = use_context::<Theme>();
                Ok(())
            });
        });
    });

    assert_eq!(*seen.borrow(), Some(Theme("dark")));
    assert_eq!(use_context::<Theme>(), None);
}

/// Test that a batch runs each effect once.
#[test]
fn batched_writes_flush_once() {
    let (first, set_first) = create_signal("Ada");
    let (last, set_last) = create_signal("Lovelace");
    let names = Rc::new(RefCell::new(Vec::new()));
    let names_clone = names.clone();

    let _effect = create_effect(move |_| {
        names_clone
            .borrow_mut()
            .push(format!("{} {}", first.get(), last.get()));
        Ok(())
    });

    batch(|| {
        set_first.set("Grace");
        set_last.set("Hopper");
        assert_eq!(names.borrow().len(), 1);
    });
    assert_eq!(*names.borrow(), vec!["Ada Lovelace", "Grace Hopper"]);
}

/// Test that render effects see a write before user effects do.
#[test]
fn render_effects_run_first() {
    let (count, set_count) = create_signal(0);
    let order = Rc::new(RefCell::new(Vec::new()));

    let count_user = count.clone();
    let order_user = order.clone();
    let _user = Effect::new(move |_| {
        order_user.borrow_mut().push(("user", count_user.get()));
        Ok(())
    });
    let order_render = order.clone();
    let _render = create_render_effect(move |_| {
        order_render.borrow_mut().push(("render", count.get()));
        Ok(())
    });

    order.borrow_mut().clear();
    set_count.set(1);
    assert_eq!(*order.borrow(), vec![("render", 1), ("user", 1)]);
}

/// Test that a projection updates in place and notifies readers.
#[test]
fn projection_feeds_effects() {
    let (selected, set_selected) = create_signal(0usize);
    let rows = create_projection(
        move |rows: &mut Vec<bool>| {
            let selected = selected.get();
            for (i, row) in rows.iter_mut().enumerate() {
                *row = i == selected;
            }
            Ok(())
        },
        vec![false; 3],
    );

    let snapshots = Rc::new(RefCell::new(Vec::new()));
    let snapshots_clone = snapshots.clone();
    let _effect = create_effect(move |_| {
        snapshots_clone.borrow_mut().push(rows.try_get()?);
        Ok(())
    });

    set_selected.set(2);
    assert_eq!(
        *snapshots.borrow(),
        vec![vec![true, false, false], vec![false, false, true]]
    );
}

/// Test that a thousand chained memos update without exhausting the stack.
#[test]
fn deep_memo_chain_updates() {
    const DEPTH: usize = 1000;

    let signals: Vec<Signal<usize>> = (0..DEPTH).map(Signal::new).collect();
    let mut memos: Vec<Memo<usize>> = Vec::with_capacity(DEPTH);
    for signal in &signals {
        let signal = signal.clone();
        let below = memos.last().cloned();
        let memo = create_memo(move |_| {
            let below = match &below {
                Some(below) => below.try_get()?,
                None => 0,
            };
            Ok(signal.get() + below)
        });
        // Each level is evaluated once its source exists.
        memo.get();
        memos.push(memo);
    }
    assert_eq!(memos[DEPTH - 1].get(), 499_500);

    signals[500].set(1000);
    flush_sync().unwrap();
    assert_eq!(memos[DEPTH - 1].get(), 500_000);
    assert_eq!(memos[499].get(), 124_750);
}
