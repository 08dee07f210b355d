//! Projections
//!
//! A projection is a memo over a persistent object that is updated in place
//! rather than rebuilt. The update function receives `&mut T` and mutates
//! it; the object itself is the cache.
//!
//! Reads of the draft inside the update function are plain memory reads, so
//! a projection can never depend on itself through its own draft. Reading
//! the projection handle from inside its update function is a cycle and
//! fails with [`ReactiveError::Cycle`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::with_runtime;
use super::subscriber::Subscriber;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

type MutateFn<T> = Box<dyn FnMut(&mut T) -> Result<()>>;

struct ProjectionInner<T> {
    mutate: RefCell<MutateFn<T>>,
    value: RefCell<T>,
    error: RefCell<Option<ReactiveError>>,
}

impl<T: 'static> Subscriber for ProjectionInner<T> {
    fn run(&self) -> Result<bool> {
        let result = {
            let mut mutate = self.mutate.borrow_mut();
            let mut draft = self.value.borrow_mut();
            mutate(&mut *draft)
        };
        *self.error.borrow_mut() = result.err();
        // Observers depend on the object as a whole.
        Ok(true)
    }
}

/// A lazily updated, mutable derived object.
///
/// ```rust
/// use signal_core::{create_projection, create_signal};
///
/// #[derive(Clone, Default)]
/// struct Selection {
///     selected: Option<usize>,
///     changes: u32,
/// }
///
/// let (selected, set_selected) = create_signal(1);
/// let selection = create_projection(
///     move |draft: &mut Selection| {
///         draft.selected = Some(selected.get());
///         draft.changes += 1;
///         Ok(())
///     },
///     Selection::default(),
/// );
///
/// assert_eq!(selection.with(|s| s.selected), Some(1));
/// set_selected.set(3);
/// assert_eq!(selection.with(|s| (s.selected, s.changes)), (Some(3), 2));
/// ```
pub struct Projection<T> {
    id: NodeId,
    inner: Rc<ProjectionInner<T>>,
}

impl<T: 'static> Projection<T> {
    pub fn new(mutate: impl FnMut(&mut T) -> Result<()> + 'static, initial: T) -> Self {
        let inner = Rc::new(ProjectionInner {
            mutate: RefCell::new(Box::new(mutate)),
            value: RefCell::new(initial),
            error: RefCell::new(None),
        });
        let subscriber = inner.clone();
        let id = with_runtime(|rt| {
            rt.create_computation(NodeKind::Projection, None, move |_| {
                subscriber as Rc<dyn Subscriber>
            })
        });
        Self { id, inner }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Bring the projection up to date, track the read and borrow the object.
    pub fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Result<U> {
        with_runtime(|rt| rt.read(self.id, NodeKind::Projection))?;
        if let Some(error) = self.inner.error.borrow().clone() {
            return Err(error);
        }
        self.with_untracked(f)
    }

    /// # Panics
    ///
    /// Panics if the update function failed or the projection was disposed.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        match self.try_with(f) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    pub fn try_get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.try_with(T::clone)
    }

    /// # Panics
    ///
    /// Panics if the update function failed or the projection was disposed.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the object as it is, without updating or tracking.
    pub fn with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> Result<U> {
        let value = self
            .inner
            .value
            .try_borrow()
            .map_err(|_| ReactiveError::Cycle(NodeKind::Projection.label().to_string()))?;
        Ok(f(&*value))
    }
}

impl<T> Clone for Projection<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Projection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection").field("id", &self.id).finish()
    }
}

/// Create a projection of `initial`, kept up to date by `mutate`.
pub fn create_projection<T: 'static>(
    mutate: impl FnMut(&mut T) -> Result<()> + 'static,
    initial: T,
) -> Projection<T> {
    Projection::new(mutate, initial)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
