//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as updating a renderer or logging.
//!
//! # How Effects Work
//!
//! 1. Creating an effect queues it. It runs in the current flush, or when
//!    the enclosing root or batch ends.
//!
//! 2. While running, it tracks every reactive value it reads.
//!
//! 3. When any tracked value changes, the effect is queued again. Before it
//!    re-runs, whatever the previous run created is disposed and its
//!    [`on_cleanup`](super::on_cleanup) callbacks run.
//!
//! 4. Render effects run before user effects in every flush round.
//!
//! # Errors
//!
//! An effect returning `Err(NotReady)` is waiting on an async value and
//! runs again once it settles. Any other error goes to the nearest
//! [`on_error`](super::on_error) handler. A failed run keeps the value of
//! the last successful one, so the next run still receives it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::runtime::with_runtime;
use super::subscriber::Subscriber;
use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

type EffectFn<T> = Box<dyn FnMut(Option<T>) -> Result<T>>;

struct EffectInner<T> {
    run: RefCell<EffectFn<T>>,
    value: RefCell<Option<T>>,
    runs: Rc<Cell<usize>>,
}

impl<T: Clone + 'static> Subscriber for EffectInner<T> {
    fn run(&self) -> Result<bool> {
        self.runs.set(self.runs.get() + 1);
        let previous = self.value.borrow().clone();
        let next = (self.run.borrow_mut())(previous)?;
        *self.value.borrow_mut() = Some(next);
        Ok(false)
    }
}

/// A reactive effect that runs when its dependencies change.
///
/// The handle does not keep the effect alive; the effect lives until its
/// owner is disposed or [`Effect::dispose`] is called.
///
/// # Example
///
/// ```rust
/// use signal_core::{create_effect, create_signal};
/// use std::{cell::RefCell, rc::Rc};
///
/// let (name, set_name) = create_signal("world");
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let log_clone = log.clone();
///
/// let effect = create_effect(move |_| {
///     log_clone.borrow_mut().push(format!("hello {}", name.get()));
///     Ok(())
/// });
///
/// set_name.set("signals");
/// assert_eq!(*log.borrow(), ["hello world", "hello signals"]);
///
/// effect.dispose();
/// set_name.set("nobody");
/// assert_eq!(log.borrow().len(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    id: NodeId,
    runs: Rc<Cell<usize>>,
}

impl Effect {
    fn create<T: Clone + 'static>(
        kind: NodeKind,
        initial: Option<T>,
        run: impl FnMut(Option<T>) -> Result<T> + 'static,
    ) -> Self {
        let runs = Rc::new(Cell::new(0));
        let inner = Rc::new(EffectInner {
            run: RefCell::new(Box::new(run)),
            value: RefCell::new(initial),
            runs: runs.clone(),
        });
        let id = with_runtime(|rt| {
            let id = rt.create_computation(kind, None, move |_| inner as Rc<dyn Subscriber>);
            rt.maybe_flush();
            id
        });
        Self { id, runs }
    }

    /// Create a user effect. See [`create_effect`].
    pub fn new<T: Clone + 'static>(run: impl FnMut(Option<T>) -> Result<T> + 'static) -> Self {
        Self::create(NodeKind::Effect, None, run)
    }

    /// Create a user effect whose first run receives `initial` as its
    /// previous value.
    pub fn new_with_value<T: Clone + 'static>(
        initial: T,
        run: impl FnMut(Option<T>) -> Result<T> + 'static,
    ) -> Self {
        Self::create(NodeKind::Effect, Some(initial), run)
    }

    /// Create a render effect. See [`create_render_effect`].
    pub fn new_render<T: Clone + 'static>(run: impl FnMut(Option<T>) -> Result<T> + 'static) -> Self {
        Self::create(NodeKind::RenderEffect, None, run)
    }

    /// Get the effect's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dispose the effect, running its cleanups. It never runs again.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_computation(self.id));
    }

    pub fn is_disposed(&self) -> bool {
        !with_runtime(|rt| rt.contains(self.id))
    }

    /// How many times the effect has run.
    pub fn run_count(&self) -> usize {
        self.runs.get()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect that runs after render effects in every flush.
///
/// The function receives the value it returned last time.
pub fn create_effect<T: Clone + 'static>(
    run: impl FnMut(Option<T>) -> Result<T> + 'static,
) -> Effect {
    Effect::new(run)
}

/// Create an effect that runs before user effects in every flush.
pub fn create_render_effect<T: Clone + 'static>(
    run: impl FnMut(Option<T>) -> Result<T> + 'static,
) -> Effect {
    Effect::new_render(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
