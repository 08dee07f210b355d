//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    running computation becomes one of its observers.
//!
//! 2. When a signal is written, the new value is compared with the old one
//!    using the signal's equality function. Equal writes are dropped.
//!
//! 3. Otherwise its observers are marked dirty and, unless a batch is
//!    active, queued effects run before the write returns.
//!
//! # Memory Layout
//!
//! The graph only knows the signal's [`NodeId`]. The value lives behind an
//! `Rc` shared by every handle, so a signal whose owner was disposed can
//! still be read. It just stops notifying anyone.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::with_runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

/// Equality function deciding whether a write is a change.
pub type EqualsFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Options for signals and memos.
pub struct SignalOptions<T> {
    /// Debug name, reported by [`node_name`](super::node_name).
    pub name: Option<Cow<'static, str>>,

    /// `None` treats every write (or recomputation) as a change.
    pub equals: Option<EqualsFn<T>>,
}

impl<T> SignalOptions<T> {
    /// Options that notify observers on every write, even of an equal value.
    pub fn always_notify() -> Self {
        Self {
            name: None,
            equals: None,
        }
    }

    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_equals(mut self, equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.equals = Some(Rc::new(equals));
        self
    }
}

impl<T: PartialEq + 'static> Default for SignalOptions<T> {
    fn default() -> Self {
        Self {
            name: None,
            equals: Some(Rc::new(|a: &T, b: &T| a == b)),
        }
    }
}

impl<T> Clone for SignalOptions<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            equals: self.equals.clone(),
        }
    }
}

struct SignalInner<T> {
    value: RefCell<T>,
    equals: Option<EqualsFn<T>>,
}

/// A reactive signal holding a value of type T.
///
/// `Signal` is a read-write handle. Use [`create_signal`] or
/// [`Signal::split`] for separate read and write halves.
///
/// # Example
///
/// ```rust
/// use signal_core::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies observers)
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T> {
    id: NodeId,
    inner: Rc<SignalInner<T>>,
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Create a new signal owned by the current owner.
    pub fn new(value: T) -> Self {
        Self::with_options(value, SignalOptions::default())
    }
}

impl<T: 'static> Signal<T> {
    pub fn with_options(value: T, options: SignalOptions<T>) -> Self {
        let id = with_runtime(|rt| rt.create_signal_node(options.name));
        Self {
            id,
            inner: Rc::new(SignalInner {
                value: RefCell::new(value),
                equals: options.equals,
            }),
        }
    }

    /// Get the signal's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, tracking the read.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same signal.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.track();
        f(&*self.inner.value.borrow())
    }

    /// Get the current value, or `Cycle` if the signal is mid-write.
    pub fn try_get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.try_with(T::clone)
    }

    pub fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Result<U> {
        self.track();
        let value = self
            .inner
            .value
            .try_borrow()
            .map_err(|_| ReactiveError::Cycle("signal".to_string()))?;
        Ok(f(&*value))
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    pub fn with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&*self.inner.value.borrow())
    }

    /// Set a new value and notify observers if it changed.
    ///
    /// Returns the value the signal holds after the write. Writes to a signal
    /// whose owner was disposed are dropped, and so are writes equal to the
    /// current value.
    pub fn set(&self, value: T) -> T
    where
        T: Clone,
    {
        let changed = self.store(value);
        let current = self.get_untracked();
        if changed {
            with_runtime(|rt| {
                rt.notify(self.id);
                rt.maybe_flush();
            });
        }
        current
    }

    /// Update the value using a function of the previous one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> T
    where
        T: Clone,
    {
        let next = f(&*self.inner.value.borrow());
        self.set(next)
    }

    /// Replace the stored value unless the write is dropped.
    fn store(&self, value: T) -> bool {
        if !with_runtime(|rt| rt.contains(self.id)) {
            tracing::trace!(node = ?self.id, "write to disposed signal dropped");
            return false;
        }

        let changed = match &self.inner.equals {
            Some(equals) => !equals(&*self.inner.value.borrow(), &value),
            None => true,
        };
        if changed {
            let previous = self.inner.value.replace(value);
            drop(previous);
        }
        changed
    }

    /// Split into read and write halves.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (
            ReadSignal {
                signal: self.clone(),
            },
            WriteSignal { signal: self },
        )
    }

    fn track(&self) {
        with_runtime(|rt| {
            if rt.contains(self.id) {
                rt.track(self.id);
            }
        });
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Signal");
        s.field("id", &self.id);
        match self.inner.value.try_borrow() {
            Ok(value) => s.field("value", &*value),
            Err(_) => s.field("value", &"<borrowed>"),
        };
        s.finish()
    }
}

/// The read half of a signal.
pub struct ReadSignal<T> {
    signal: Signal<T>,
}

impl<T: 'static> ReadSignal<T> {
    pub fn id(&self) -> NodeId {
        self.signal.id
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.signal.with(f)
    }

    pub fn try_get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.signal.try_get()
    }

    pub fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Result<U> {
        self.signal.try_with(f)
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    pub fn with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.signal.with_untracked(f)
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

/// The write half of a signal.
pub struct WriteSignal<T> {
    signal: Signal<T>,
}

impl<T: 'static> WriteSignal<T> {
    pub fn id(&self) -> NodeId {
        self.signal.id
    }

    pub fn set(&self, value: T) -> T
    where
        T: Clone,
    {
        self.signal.set(value)
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) -> T
    where
        T: Clone,
    {
        self.signal.update(f)
    }
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> fmt::Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal").field("id", &self.signal.id).finish()
    }
}

/// Create a signal and return its read and write halves.
pub fn create_signal<T: PartialEq + 'static>(value: T) -> (ReadSignal<T>, WriteSignal<T>) {
    Signal::new(value).split()
}

/// Create a signal with a custom name or equality function.
pub fn create_signal_with_options<T: 'static>(
    value: T,
    options: SignalOptions<T>,
) -> (ReadSignal<T>, WriteSignal<T>) {
    Signal::with_options(value, options).split()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
