//! Ownership and Disposal
//!
//! Every reactive node is created under an owner. Owners form a tree rooted
//! at the scopes created by [`create_root`], and disposing an owner disposes
//! everything below it.
//!
//! # How Disposal Works
//!
//! 1. Child owners are disposed first, most recently created first.
//! 2. Cleanup callbacks registered with [`on_cleanup`] run in reverse
//!    registration order.
//! 3. Signals created directly under the owner are released.
//! 4. If the owner is the scope of a computation, that computation is
//!    removed from the graph.
//!
//! Each memo, effect, projection and async value gets a scope of its own.
//! Whatever a run creates (nested effects, signals, cleanups) lands in that
//! scope and is torn down right before the next run.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use slotmap::new_key_type;
use smallvec::SmallVec;

use super::context::untrack;
use super::runtime::{batch, with_runtime, Runtime};
use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

new_key_type! {
    /// Identifier of an owner scope.
    pub struct OwnerId;
}

pub(crate) type ErrorHandler = Rc<dyn Fn(ReactiveError)>;

/// Arena record for one owner scope.
#[derive(Default)]
pub(crate) struct OwnerNode {
    pub parent: Option<OwnerId>,
    pub children: Vec<OwnerId>,
    pub cleanups: Vec<Box<dyn FnOnce()>>,

    /// Signal nodes created directly under this owner.
    pub signals: SmallVec<[NodeId; 4]>,

    /// The computation this owner is the scope of.
    pub computation: Option<NodeId>,

    pub error_handler: Option<ErrorHandler>,
    pub contexts: HashMap<TypeId, Rc<dyn Any>>,
}

impl Runtime {
    pub(crate) fn owner_alive(&self, id: OwnerId) -> bool {
        self.owners.borrow().contains_key(id)
    }

    /// Create an owner under `parent`. A disposed parent yields a detached owner.
    pub(crate) fn create_owner(&self, parent: Option<OwnerId>) -> OwnerId {
        let mut owners = self.owners.borrow_mut();
        let parent = parent.filter(|parent| owners.contains_key(*parent));
        let id = owners.insert(OwnerNode {
            parent,
            ..OwnerNode::default()
        });
        if let Some(parent) = parent.and_then(|parent| owners.get_mut(parent)) {
            parent.children.push(id);
        }
        id
    }

    /// Tear down everything an owner holds, keeping the owner itself alive.
    pub(crate) fn reset_owner(&self, id: OwnerId) {
        loop {
            let child = self
                .owners
                .borrow_mut()
                .get_mut(id)
                .and_then(|owner| owner.children.pop());
            match child {
                Some(child) => self.dispose_owner(child),
                None => break,
            }
        }

        loop {
            let cleanup = self
                .owners
                .borrow_mut()
                .get_mut(id)
                .and_then(|owner| owner.cleanups.pop());
            match cleanup {
                Some(cleanup) => untrack(cleanup),
                None => break,
            }
        }

        let (signals, handler, contexts) = {
            let mut owners = self.owners.borrow_mut();
            let Some(owner) = owners.get_mut(id) else {
                return;
            };
            (
                std::mem::take(&mut owner.signals),
                owner.error_handler.take(),
                std::mem::take(&mut owner.contexts),
            )
        };
        for signal in signals {
            self.dispose_node(signal);
        }
        // Dropped outside the borrow: user values may hold arbitrary state.
        drop((handler, contexts));
    }

    /// Dispose an owner and its whole subtree. Idempotent.
    pub(crate) fn dispose_owner(&self, id: OwnerId) {
        if !self.owner_alive(id) {
            return;
        }
        self.reset_owner(id);

        let removed = {
            let mut owners = self.owners.borrow_mut();
            let removed = owners.remove(id);
            if let Some(parent) = removed.as_ref().and_then(|owner| owner.parent) {
                if let Some(parent) = owners.get_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            removed
        };

        if let Some(computation) = removed.and_then(|owner| owner.computation) {
            self.dispose_node(computation);
        }
        tracing::trace!(owner = ?id, "disposed owner");
    }

    /// Nearest error handler, starting at `from` and walking up.
    pub(crate) fn find_error_handler(&self, from: Option<OwnerId>) -> Option<ErrorHandler> {
        let owners = self.owners.borrow();
        let mut current = from;
        while let Some(id) = current {
            let owner = owners.get(id)?;
            if let Some(handler) = &owner.error_handler {
                return Some(handler.clone());
            }
            current = owner.parent;
        }
        None
    }
}

/// Restores the previous current owner when dropped.
pub(crate) struct OwnerGuard {
    previous: Option<OwnerId>,
}

impl OwnerGuard {
    pub fn enter(owner: Option<OwnerId>) -> Self {
        let previous = with_runtime(|rt| rt.current_owner.replace(owner));
        Self { previous }
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        with_runtime(|rt| rt.current_owner.set(self.previous));
    }
}

/// A handle to an owner scope.
///
/// Owners are cheap to copy. Operations on a disposed owner are no-ops.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    id: OwnerId,
}

/// The handle passed to the body of [`create_root`].
pub type RootHandle = Owner;

impl Owner {
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Run `f` with this owner as the current owner.
    ///
    /// Nodes created inside `f` belong to this owner and are disposed with it.
    pub fn run_with<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = OwnerGuard::enter(Some(self.id));
        f()
    }

    /// Dispose this owner and everything it owns.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_owner(self.id));
    }

    pub fn is_disposed(&self) -> bool {
        !with_runtime(|rt| rt.owner_alive(self.id))
    }

    /// The owner this one was created under.
    pub fn parent(&self) -> Option<Owner> {
        with_runtime(|rt| {
            rt.owners
                .borrow()
                .get(self.id)
                .and_then(|owner| owner.parent)
                .map(|id| Owner { id })
        })
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create a new owner scope and run `f` inside it.
///
/// The scope is a child of the current owner, if there is one, so disposing
/// the outer owner disposes it too. The body runs untracked and batched:
/// effects created in it run once the body returns.
///
/// ```rust
/// use signal_core::{create_root, create_signal, on_cleanup};
/// use std::{cell::Cell, rc::Rc};
///
/// let cleaned = Rc::new(Cell::new(false));
/// let cleaned_clone = cleaned.clone();
///
/// let root = create_root(move |root| {
///     let (_count, _set_count) = create_signal(0);
///     on_cleanup(move || cleaned_clone.set(true));
///     root
/// });
///
/// root.dispose();
/// assert!(cleaned.get());
/// ```
pub fn create_root<T>(f: impl FnOnce(RootHandle) -> T) -> T {
    let id = with_runtime(|rt| {
        let parent = rt.current_owner.get();
        rt.create_owner(parent)
    });
    tracing::trace!(owner = ?id, "created root");

    let _guard = OwnerGuard::enter(Some(id));
    batch(|| untrack(|| f(Owner { id })))
}

/// The current owner, if any.
pub fn get_owner() -> Option<Owner> {
    with_runtime(|rt| {
        rt.current_owner
            .get()
            .filter(|id| rt.owner_alive(*id))
            .map(|id| Owner { id })
    })
}

/// Register a callback to run when the current owner is disposed or re-run.
///
/// Outside of any owner the callback can never run; it is dropped with a
/// warning.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    with_runtime(|rt| {
        let current = rt.current_owner.get();
        let mut owners = rt.owners.borrow_mut();
        match current.and_then(|id| owners.get_mut(id)) {
            Some(owner) => owner.cleanups.push(Box::new(f)),
            None => tracing::warn!("on_cleanup called outside of a reactive owner; it will never run"),
        }
    });
}

/// Handle errors raised by effects created under the current owner.
///
/// Errors are delivered to the nearest handler up the owner chain. Errors
/// with no handler are returned by the next
/// [`flush_sync`](super::flush_sync).
pub fn on_error(handler: impl Fn(ReactiveError) + 'static) {
    with_runtime(|rt| {
        let current = rt.current_owner.get();
        let mut owners = rt.owners.borrow_mut();
        match current.and_then(|id| owners.get_mut(id)) {
            Some(owner) => owner.error_handler = Some(Rc::new(handler)),
            None => tracing::warn!("on_error called outside of a reactive owner; it will never run"),
        }
    });
}

/// Make `value` available to [`use_context`] calls in the current owner and
/// everything below it.
pub fn provide_context<T: 'static>(value: T) -> Result<()> {
    with_runtime(|rt| {
        let current = rt.current_owner.get();
        let mut owners = rt.owners.borrow_mut();
        let owner = current
            .and_then(|id| owners.get_mut(id))
            .ok_or(ReactiveError::NoOwner)?;
        owner.contexts.insert(TypeId::of::<T>(), Rc::new(value));
        Ok(())
    })
}

/// Look up the nearest value of type `T` provided by the current owner or
/// one of its ancestors.
pub fn use_context<T: Clone + 'static>() -> Option<T> {
    with_runtime(|rt| {
        let owners = rt.owners.borrow();
        let ty = TypeId::of::<T>();
        let mut current = rt.current_owner.get();
        while let Some(id) = current {
            let owner = owners.get(id)?;
            if let Some(value) = owner.contexts.get(&ty) {
                return value.downcast_ref::<T>().cloned();
            }
            current = owner.parent;
        }
        None
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn cleanups_run_in_reverse_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let root = create_root(|root| {
            for i in 0..3 {
                let log_clone = log.clone();
                on_cleanup(move || log_clone.borrow_mut().push(i));
            }
            root
        });

        root.dispose();
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn dispose_is_idempotent() {
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();

        let root = create_root(|root| {
            on_cleanup(move || *count_clone.borrow_mut() += 1);
            root
        });

        root.dispose();
        root.dispose();
        assert!(root.is_disposed());
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn nested_roots_are_children() {
        let (outer, inner) = create_root(|outer| (outer, create_root(|inner| inner)));

        assert_eq!(inner.parent(), Some(outer));
        outer.dispose();
        assert!(inner.is_disposed());
    }

    #[test]
    fn context_is_inherited() {
        create_root(|_| {
            provide_context(42_u32).unwrap();
            assert_eq!(use_context::<u32>(), Some(42));

            create_root(|_| {
                assert_eq!(use_context::<u32>(), Some(42));
                provide_context(7_u32).unwrap();
                assert_eq!(use_context::<u32>(), Some(7));
            });

            assert_eq!(use_context::<u32>(), Some(42));
            assert_eq!(use_context::<String>(), None);
        });
    }

    #[test]
    fn context_requires_owner() {
        assert!(matches!(provide_context(1_i32), Err(ReactiveError::NoOwner)));
        assert_eq!(use_context::<i32>(), None);
    }

    #[test]
    fn run_with_restores_owner() {
        let root = create_root(|root| root);
        assert_eq!(get_owner(), None);

        root.run_with(|| assert_eq!(get_owner(), Some(root)));
        assert_eq!(get_owner(), None);
    }
}
