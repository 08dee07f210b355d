//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a node is read, the
//! current computation is registered as one of its observers.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When a memo, effect or async value runs, the runtime pushes an entry for
//! it onto the stack and collects every node read while the entry is on top.
//! When the computation completes, the entry is popped and the collected
//! sources replace the node's previous ones.
//!
//! [`untrack`] pushes an entry without an observer. Reads inside it are not
//! recorded anywhere, even if an outer computation is running.

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::graph::NodeId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug)]
struct ContextEntry {
    /// The running computation, or `None` for an untracked section.
    observer: Option<NodeId>,

    /// Nodes read during this computation, in first-read order.
    sources: SmallVec<[NodeId; 4]>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub(crate) struct ReactiveContext {
    observer: Option<NodeId>,
    popped: bool,
}

impl ReactiveContext {
    /// Enter a tracking context for the given computation.
    pub fn enter(observer: NodeId) -> Self {
        Self::push(Some(observer))
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(observer: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer,
                sources: SmallVec::new(),
            });
        });

        Self {
            observer,
            popped: false,
        }
    }

    /// The computation that is tracking reads right now, if any.
    pub fn current_observer() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.observer))
    }

    /// Record a read of `source`.
    ///
    /// Returns the observer when this is its first read of `source` during
    /// the current evaluation, so the caller can link the reverse edge.
    pub fn track_dependency(source: NodeId) -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let observer = entry.observer?;
            if observer == source || entry.sources.contains(&source) {
                return None;
            }
            entry.sources.push(source);
            Some(observer)
        })
    }

    /// Leave the context and return the sources it collected.
    pub fn finish(mut self) -> SmallVec<[NodeId; 4]> {
        self.popped = true;
        CONTEXT_STACK.with(|stack| {
            let entry = stack.borrow_mut().pop();
            match entry {
                Some(entry) => {
                    debug_assert_eq!(
                        entry.observer, self.observer,
                        "ReactiveContext mismatch: expected {:?}, got {:?}",
                        self.observer, entry.observer
                    );
                    entry.sources
                }
                None => SmallVec::new(),
            }
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if self.popped {
            return;
        }
        // `try_with` because the stack may already be gone during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `f` without tracking any reads it makes.
///
/// ```rust
/// use signal_core::{create_memo, create_signal, untrack};
///
/// let (a, set_a) = create_signal(1);
/// let (b, set_b) = create_signal(10);
/// let sum = create_memo(move |_| Ok(a.get() + untrack(|| b.get())));
///
/// assert_eq!(sum.get(), 11);
/// set_b.set(20);
/// assert_eq!(sum.get(), 11);
/// set_a.set(2);
/// assert_eq!(sum.get(), 22);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
