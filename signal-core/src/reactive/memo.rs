//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. Creating a memo does not run it. The first read computes and caches
//!    the result.
//!
//! 2. When read again, if no dependencies have changed, returns the cached value.
//!
//! 3. When a dependency changes, the memo is marked `Check` or `Dirty`.
//!
//! 4. On next read, a `Check` memo first asks its sources whether they
//!    actually changed. If none did it becomes clean without running.
//!
//! 5. A recomputed value equal to the cached one does not dirty the memo's
//!    observers.
//!
//! # Errors
//!
//! The computation returns a [`Result`]. An error is cached like a value and
//! handed to every reader until a source changes and the memo recomputes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::with_runtime;
use super::signal::{EqualsFn, SignalOptions};
use super::subscriber::Subscriber;
use super::untrack;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

/// Cached result of a memo.
enum MemoValue<T> {
    Uninit,
    Value(T),
    Error(ReactiveError),
}

type ComputeFn<T> = Box<dyn FnMut(Option<&T>) -> Result<T>>;

struct MemoInner<T> {
    compute: RefCell<ComputeFn<T>>,
    value: RefCell<MemoValue<T>>,
    equals: Option<EqualsFn<T>>,
}

impl<T: 'static> Subscriber for MemoInner<T> {
    fn run(&self) -> Result<bool> {
        let previous = std::mem::replace(&mut *self.value.borrow_mut(), MemoValue::Uninit);
        let next = {
            let mut compute = self.compute.borrow_mut();
            let prev = match &previous {
                MemoValue::Value(value) => Some(value),
                _ => None,
            };
            compute(prev)
        };

        let changed = match (&previous, &next) {
            (MemoValue::Value(old), Ok(new)) => match &self.equals {
                Some(equals) => !equals(old, new),
                None => true,
            },
            (MemoValue::Error(old), Err(new)) => !old.same_outcome(new),
            _ => true,
        };

        *self.value.borrow_mut() = if changed {
            match next {
                Ok(value) => MemoValue::Value(value),
                Err(error) => MemoValue::Error(error),
            }
        } else {
            previous
        };
        Ok(changed)
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use signal_core::{create_memo, create_signal};
///
/// let (count, set_count) = create_signal(2);
/// let squared = create_memo(move |_| Ok(count.get() * count.get()));
///
/// assert_eq!(squared.get(), 4);
/// set_count.set(3);
/// assert_eq!(squared.get(), 9);
/// ```
pub struct Memo<T> {
    id: NodeId,
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    pub fn new(compute: impl FnMut(Option<&T>) -> Result<T> + 'static) -> Self
    where
        T: PartialEq,
    {
        Self::with_options(compute, SignalOptions::default())
    }

    pub fn with_options(
        compute: impl FnMut(Option<&T>) -> Result<T> + 'static,
        options: SignalOptions<T>,
    ) -> Self {
        let inner = Rc::new(MemoInner {
            compute: RefCell::new(Box::new(compute)),
            value: RefCell::new(MemoValue::Uninit),
            equals: options.equals,
        });
        let subscriber = inner.clone();
        let id = with_runtime(|rt| {
            rt.create_computation(NodeKind::Memo, options.name, move |_| {
                subscriber as Rc<dyn Subscriber>
            })
        });
        Self { id, inner }
    }

    /// Get the memo's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Bring the memo up to date, track the read and borrow the value.
    pub fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Result<U> {
        with_runtime(|rt| rt.read(self.id, NodeKind::Memo))?;
        let value = self
            .inner
            .value
            .try_borrow()
            .map_err(|_| ReactiveError::Cycle(NodeKind::Memo.label().to_string()))?;
        match &*value {
            MemoValue::Value(value) => Ok(f(value)),
            MemoValue::Error(error) => Err(error.clone()),
            MemoValue::Uninit => Err(ReactiveError::Cycle(NodeKind::Memo.label().to_string())),
        }
    }

    pub fn try_get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.try_with(T::clone)
    }

    /// Like [`Memo::try_with`].
    ///
    /// # Panics
    ///
    /// Panics if the computation failed or the memo was disposed.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        match self.try_with(f) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    /// Like [`Memo::try_get`].
    ///
    /// # Panics
    ///
    /// Panics if the computation failed or the memo was disposed.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Get the up-to-date value without tracking the read.
    pub fn get_untracked(&self) -> Result<T>
    where
        T: Clone,
    {
        untrack(|| self.try_get())
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo").field("id", &self.id).finish()
    }
}

/// Create a memo. Equal recomputed values do not notify observers.
pub fn create_memo<T: PartialEq + 'static>(
    compute: impl FnMut(Option<&T>) -> Result<T> + 'static,
) -> Memo<T> {
    Memo::new(compute)
}

/// Create a memo with a custom name or equality function.
pub fn create_memo_with_options<T: 'static>(
    compute: impl FnMut(Option<&T>) -> Result<T> + 'static,
    options: SignalOptions<T>,
) -> Memo<T> {
    Memo::with_options(compute, options)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
