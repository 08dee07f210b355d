//! Integration Tests for Async Values
//!
//! Futures are driven by the thread's local executor, so each test decides
//! exactly when they make progress with `run_until_stalled` or `block_on`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future;
use signal_core::{
    block_on, create_async, create_effect, create_memo, create_root, create_signal, flush_sync,
    is_alive, is_pending, latest, resolve, run_until_stalled, AsyncState, ReactiveError,
};

fn bump(count: &Cell<usize>) {
    count.set(count.get() + 1);
}

/// Test that async values sharing a source load in parallel.
#[test]
fn diamond_does_not_waterfall() {
    let (s, set_s) = create_signal(1);
    let calls1 = Rc::new(Cell::new(0));
    let calls2 = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Vec::new()));

    {
        let (s1, s2) = (s.clone(), s.clone());
        let (calls1, calls2, seen) = (calls1.clone(), calls2.clone(), seen.clone());
        create_root(move |_| {
            let b = create_async(move || {
                bump(&calls1);
                Ok(future::ready(Ok(s1.get())))
            });
            let c = create_async(move || {
                bump(&calls2);
                Ok(future::ready(Ok(s2.get())))
            });
            create_effect(move |_| {
                let pair = (b.try_get()?, c.try_get()?);
                seen.borrow_mut().push(pair);
                Ok(())
            });
        });
    }

    flush_sync().unwrap();
    assert_eq!((calls1.get(), calls2.get()), (1, 1));
    assert!(seen.borrow().is_empty());

    run_until_stalled();
    assert_eq!((calls1.get(), calls2.get()), (1, 1));
    assert_eq!(*seen.borrow(), vec![(1, 1)]);

    set_s.set(2);
    flush_sync().unwrap();
    assert_eq!((calls1.get(), calls2.get()), (2, 2));

    run_until_stalled();
    assert_eq!((calls1.get(), calls2.get()), (2, 2));
    assert_eq!(*seen.borrow(), vec![(1, 1), (2, 2)]);
}

/// Test that an async value reading another one waits for it.
#[test]
fn chain_waits_for_upstream() {
    let (s, set_s) = create_signal(1);
    let calls1 = Rc::new(Cell::new(0));
    let calls2 = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Vec::new()));

    {
        let (s1, s2) = (s.clone(), s.clone());
        let (calls1, calls2, seen) = (calls1.clone(), calls2.clone(), seen.clone());
        create_root(move |_| {
            let a = create_async(move || {
                bump(&calls1);
                Ok(future::ready(Ok(s1.get())))
            });
            let b = create_async(move || {
                bump(&calls2);
                let total = s2.get() + a.try_get()?;
                Ok(future::ready(Ok(total)))
            });
            create_effect(move |_| {
                let value = b.try_get()?;
                seen.borrow_mut().push(value);
                Ok(())
            });
        });
    }

    flush_sync().unwrap();
    assert_eq!((calls1.get(), calls2.get()), (1, 1));
    assert!(seen.borrow().is_empty());

    run_until_stalled();
    assert_eq!((calls1.get(), calls2.get()), (1, 2));
    assert_eq!(*seen.borrow(), vec![2]);

    set_s.set(2);
    flush_sync().unwrap();
    assert_eq!((calls1.get(), calls2.get()), (2, 3));

    run_until_stalled();
    assert_eq!((calls1.get(), calls2.get()), (2, 4));
    assert_eq!(*seen.borrow(), vec![2, 4]);
}

/// Test that `is_pending` reports a stale value while reloading.
#[test]
fn is_pending_while_reloading() {
    let (s, set_s) = create_signal(1);
    let a = create_async(move || Ok(future::ready(Ok(s.get()))));
    let a_clone = a.clone();
    let status = create_memo(move |_| {
        Ok(if is_pending(&a_clone)? { "stale" } else { "not stale" })
    });

    assert!(status.try_get().is_err());

    run_until_stalled();
    assert_eq!(status.get(), "not stale");

    set_s.set(2);
    assert_eq!(status.get(), "stale");
    flush_sync().unwrap();
    assert_eq!(status.get(), "stale");

    run_until_stalled();
    assert_eq!(status.get(), "not stale");
}

/// Test that `latest` keeps serving the previous value.
#[test]
fn latest_serves_previous_value() {
    let (s, set_s) = create_signal(1);
    let a = create_async(move || Ok(future::ready(Ok(s.get()))));
    let a_clone = a.clone();
    let newest = create_memo(move |_| latest(&a_clone));

    assert!(newest.try_get().is_err());

    run_until_stalled();
    assert_eq!(newest.get(), 1);

    set_s.set(2);
    assert_eq!(newest.get(), 1);
    assert!(matches!(a.state(), AsyncState::Loading(Some(1))));

    run_until_stalled();
    assert_eq!(newest.get(), 2);
}

/// Test that `resolve` waits for the first ready value.
#[test]
fn resolve_waits_for_value() {
    let (s, _set_s) = create_signal(1);
    let a = create_async(move || Ok(future::ready(Ok(s.get() * 10))));
    let a_clone = a.clone();

    let value = block_on(resolve(move || a_clone.try_get()));
    assert_eq!(value.unwrap(), 10);
}

/// Test that `resolve` rejects with the first real error.
#[test]
fn resolve_rejects_on_error() {
    let a = create_async(|| Ok(future::ready(Err::<i32, _>(ReactiveError::evaluation("offline")))));

    let result = block_on(resolve(move || a.try_get()));
    assert!(matches!(result, Err(ReactiveError::Evaluation(_))));
}

/// Test that `resolve` gives up when its owner goes away.
#[test]
fn resolve_fails_when_disposed() {
    let (pending, root) = create_root(|root| (resolve(|| Err::<i32, _>(ReactiveError::NotReady)), root));

    root.dispose();
    let result = block_on(pending);
    assert!(matches!(result, Err(ReactiveError::Disposed(_))));
}

/// Test that a result arriving after disposal is dropped.
#[test]
fn late_result_after_dispose_is_ignored() {
    let effect_runs = Rc::new(Cell::new(0));
    let effect_runs_clone = effect_runs.clone();

    let (value, root) = create_root(move |root| {
        let value = create_async(|| Ok(future::ready(Ok(5))));
        let value_clone = value.clone();
        create_effect(move |_| {
            value_clone.try_get()?;
            bump(&effect_runs_clone);
            Ok(())
        });
        (value, root)
    });

    root.dispose();
    run_until_stalled();

    assert!(!is_alive(value.id()));
    assert!(matches!(value.state(), AsyncState::Loading(None)));
    assert!(matches!(value.try_get(), Err(ReactiveError::Disposed(_))));
    assert_eq!(effect_runs.get(), 0);
}

/// Test that a synchronous error from the async function is stored.
#[test]
fn sync_errors_are_stored() {
    let (fail, set_fail) = create_signal(true);
    let a = create_async(move || {
        if fail.get() {
            return Err(ReactiveError::evaluation("bad request"));
        }
        Ok(future::ready(Ok(1)))
    });

    assert!(matches!(a.try_get(), Err(ReactiveError::Evaluation(_))));
    assert!(matches!(is_pending(&a), Ok(false)));

    set_fail.set(false);
    run_until_stalled();
    assert_eq!(a.try_get().unwrap(), 1);
}
