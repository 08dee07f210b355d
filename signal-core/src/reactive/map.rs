//! List Mapping
//!
//! [`map_array`] and [`repeat`] turn a reactive list into a memo of mapped
//! rows. Each row is mapped once, inside an owner of its own, and keeps
//! whatever the mapping function created until the row goes away.
//!
//! When the list changes, rows for items that are still present are reused
//! (their index signal is updated), new items are mapped, and rows whose item
//! disappeared are disposed, running their cleanups.

use super::memo::Memo;
use super::owner::{create_root, Owner};
use super::signal::{ReadSignal, Signal, SignalOptions};
use crate::error::Result;

struct MappedRow<T, U> {
    item: T,
    value: U,
    index: Signal<usize>,
    owner: Owner,
}

struct RepeatedRow<U> {
    value: U,
    owner: Owner,
}

/// Map a reactive list, reusing the rows of items that are still present.
///
/// `list` is tracked. `map_fn` runs untracked with the item and a signal
/// holding the row's current position. Rows are matched by equality; equal
/// items are matched in order.
///
/// ```rust
/// use signal_core::{create_signal, map_array};
///
/// let (names, set_names) = create_signal(vec!["ada", "grace"]);
/// let rows = map_array(move || Ok(names.get()), |name: &&str, _index| name.to_uppercase());
///
/// assert_eq!(rows.get(), ["ADA", "GRACE"]);
/// set_names.set(vec!["grace"]);
/// assert_eq!(rows.get(), ["GRACE"]);
/// ```
pub fn map_array<T, U>(
    list: impl Fn() -> Result<Vec<T>> + 'static,
    mut map_fn: impl FnMut(&T, ReadSignal<usize>) -> U + 'static,
) -> Memo<Vec<U>>
where
    T: PartialEq + 'static,
    U: Clone + 'static,
{
    let rows_owner = create_root(|owner| owner);
    let mut rows: Vec<MappedRow<T, U>> = Vec::new();

    Memo::with_options(
        move |_| {
            let items = list()?;
            let mut previous: Vec<Option<MappedRow<T, U>>> = rows.drain(..).map(Some).collect();

            for (index, item) in items.into_iter().enumerate() {
                let reused = previous
                    .iter()
                    .position(|row| row.as_ref().is_some_and(|row| row.item == item))
                    .and_then(|at| previous[at].take());

                let row = match reused {
                    Some(row) => {
                        row.index.set(index);
                        row
                    }
                    None => rows_owner.run_with(|| {
                        create_root(|owner| {
                            let index = Signal::new(index);
                            let (read_index, _) = index.clone().split();
                            let value = map_fn(&item, read_index);
                            MappedRow {
                                item,
                                value,
                                index,
                                owner,
                            }
                        })
                    }),
                };
                rows.push(row);
            }

            let removed: Vec<_> = previous.into_iter().flatten().collect();
            if !removed.is_empty() {
                tracing::trace!(removed = removed.len(), rows = rows.len(), "disposing unmapped rows");
            }
            for row in removed {
                row.owner.dispose();
            }
            Ok(rows.iter().map(|row| row.value.clone()).collect())
        },
        SignalOptions::always_notify().named("map_array"),
    )
}

/// Map the indices `0..count` into rows.
///
/// Growing the count maps only the new indices; shrinking it disposes the
/// rows past the end, newest first.
///
/// ```rust
/// use signal_core::{create_signal, repeat};
///
/// let (count, set_count) = create_signal(2);
/// let rows = repeat(move || Ok(count.get()), |i| i * i);
///
/// assert_eq!(rows.get(), [0, 1]);
/// set_count.set(4);
/// assert_eq!(rows.get(), [0, 1, 4, 9]);
/// ```
pub fn repeat<U: Clone + 'static>(
    count: impl Fn() -> Result<usize> + 'static,
    mut map_fn: impl FnMut(usize) -> U + 'static,
) -> Memo<Vec<U>> {
    let rows_owner = create_root(|owner| owner);
    let mut rows: Vec<RepeatedRow<U>> = Vec::new();

    Memo::with_options(
        move |_| {
            let count = count()?;
            let keep = count.min(rows.len());
            for row in rows.drain(keep..).rev() {
                row.owner.dispose();
            }
            while rows.len() < count {
                let index = rows.len();
                let row = rows_owner.run_with(|| {
                    create_root(|owner| RepeatedRow {
                        value: map_fn(index),
                        owner,
                    })
                });
                rows.push(row);
            }
            Ok(rows.iter().map(|row| row.value.clone()).collect())
        },
        SignalOptions::always_notify().named("repeat"),
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
