//! Async Values
//!
//! [`create_async`] bridges futures into the graph. The function passed to
//! it runs synchronously, tracked like a memo, and returns a future. The
//! future runs on the thread's local executor and its output becomes the
//! node's value.
//!
//! # How Async Values Work
//!
//! 1. The node is eager: it is queued in the compute lane on creation and
//!    whenever a source changes, so its future starts as early as possible.
//!
//! 2. Every invocation moves the node to `Loading`, keeping the last
//!    resolved value around as a stale value.
//!
//! 3. When the future completes, the node becomes `Ready` or `Errored` and
//!    its observers are marked dirty. Outputs of invocations that have been
//!    superseded, or of a disposed node, are ignored.
//!
//! Reading a loading value fails with [`ReactiveError::NotReady`]. When an
//! async function reads another async value with `?`, it bails out with
//! `NotReady` before creating its future, stays loading, and is invoked
//! again once the upstream value settles. Async values that only share
//! plain sources start in the same flush, independently of each other.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};

use super::effect::create_effect;
use super::executor::spawn_local;
use super::owner::create_root;
use super::runtime::with_runtime;
use super::subscriber::Subscriber;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

/// State of an async value.
#[derive(Debug, Clone)]
pub enum AsyncState<T> {
    /// Never invoked.
    Uninitialized,

    /// A future is in flight. Holds the last resolved value, if any.
    Loading(Option<T>),

    Ready(T),

    Errored(ReactiveError),
}

impl<T> AsyncState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Move to `Loading`, keeping the last resolved value.
    fn into_loading(self) -> Self {
        match self {
            Self::Ready(value) | Self::Loading(Some(value)) => Self::Loading(Some(value)),
            Self::Uninitialized | Self::Loading(None) | Self::Errored(_) => Self::Loading(None),
        }
    }
}

type FetchFn<T> = Box<dyn Fn() -> Result<LocalBoxFuture<'static, Result<T>>>>;

/// State shared between the node and its in-flight futures.
struct AsyncShared<T> {
    state: RefCell<AsyncState<T>>,
    version: Cell<u64>,
}

struct AsyncInner<T> {
    id: NodeId,
    fetch: FetchFn<T>,
    shared: Rc<AsyncShared<T>>,
}

impl<T: 'static> Subscriber for AsyncInner<T> {
    fn run(&self) -> Result<bool> {
        let version = self.shared.version.get() + 1;
        self.shared.version.set(version);

        let fetched = (self.fetch)();

        let mut state = self.shared.state.borrow_mut();
        let was_loading = state.is_loading();
        let previous = std::mem::replace(&mut *state, AsyncState::Uninitialized);

        match fetched {
            Ok(future) => {
                *state = previous.into_loading();
                drop(state);
                let shared = self.shared.clone();
                let id = self.id;
                spawn_local(async move {
                    let output = future.await;
                    settle(&shared, id, version, output);
                });
                Ok(!was_loading)
            }
            Err(error) if error.is_not_ready() => {
                *state = previous.into_loading();
                Ok(!was_loading)
            }
            Err(error) => {
                *state = AsyncState::Errored(error);
                Ok(true)
            }
        }
    }

    fn dispose(&self) {
        // Anything still in flight resolves into the void.
        self.shared.version.set(self.shared.version.get() + 1);
    }
}

fn settle<T>(shared: &AsyncShared<T>, id: NodeId, version: u64, output: Result<T>) {
    if shared.version.get() != version || !with_runtime(|rt| rt.contains(id)) {
        tracing::trace!(node = ?id, version, "ignoring superseded async result");
        return;
    }

    let next = match output {
        Ok(value) => AsyncState::Ready(value),
        Err(error) if error.is_not_ready() => return,
        Err(error) => AsyncState::Errored(error),
    };
    shared.state.replace(next);

    tracing::trace!(node = ?id, version, "async value settled");
    with_runtime(|rt| {
        rt.notify(id);
        rt.maybe_flush();
    });
}

/// A value produced by a future, tracked like a memo.
pub struct AsyncRead<T> {
    id: NodeId,
    shared: Rc<AsyncShared<T>>,
}

impl<T: 'static> AsyncRead<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Track the read and borrow the current state.
    fn read<U>(&self, f: impl FnOnce(&AsyncState<T>) -> Result<U>) -> Result<U> {
        with_runtime(|rt| rt.read(self.id, NodeKind::Async))?;
        let state = self
            .shared
            .state
            .try_borrow()
            .map_err(|_| ReactiveError::Cycle(NodeKind::Async.label().to_string()))?;
        f(&state)
    }

    /// The resolved value, `NotReady` while loading, or the error the
    /// future failed with.
    pub fn try_get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.try_with(T::clone)
    }

    pub fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Result<U> {
        self.read(|state| match state {
            AsyncState::Ready(value) => Ok(f(value)),
            AsyncState::Errored(error) => Err(error.clone()),
            AsyncState::Uninitialized | AsyncState::Loading(_) => Err(ReactiveError::NotReady),
        })
    }

    /// A snapshot of the state, without tracking.
    pub fn state(&self) -> AsyncState<T>
    where
        T: Clone,
    {
        self.shared.state.borrow().clone()
    }
}

impl<T> Clone for AsyncRead<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for AsyncRead<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRead").field("id", &self.id).finish()
    }
}

/// Create an async value from a tracked function returning a future.
///
/// ```rust
/// use signal_core::{create_async, create_signal, run_until_stalled, ReactiveError};
///
/// let (id, set_id) = create_signal(1);
/// let user = create_async(move || {
///     let id = id.get();
///     Ok(async move { Ok(format!("user {id}")) })
/// });
///
/// assert!(matches!(user.try_get(), Err(ReactiveError::NotReady)));
/// run_until_stalled();
/// assert_eq!(user.try_get().unwrap(), "user 1");
///
/// set_id.set(2);
/// run_until_stalled();
/// assert_eq!(user.try_get().unwrap(), "user 2");
/// ```
pub fn create_async<T, F, Fut>(fetch: F) -> AsyncRead<T>
where
    T: 'static,
    F: Fn() -> Result<Fut> + 'static,
    Fut: Future<Output = Result<T>> + 'static,
{
    let shared = Rc::new(AsyncShared {
        state: RefCell::new(AsyncState::Uninitialized),
        version: Cell::new(0),
    });
    let fetch: FetchFn<T> = Box::new(move || fetch().map(FutureExt::boxed_local));

    let node_shared = shared.clone();
    let id = with_runtime(|rt| {
        let id = rt.create_computation(NodeKind::Async, None, move |id| {
            Rc::new(AsyncInner {
                id,
                fetch,
                shared: node_shared,
            }) as Rc<dyn Subscriber>
        });
        rt.maybe_flush();
        id
    });
    AsyncRead { id, shared }
}

/// Whether a newer value is loading while a stale one is available.
///
/// Fails with `NotReady` until the first value resolves.
pub fn is_pending<T: 'static>(value: &AsyncRead<T>) -> Result<bool> {
    value.read(|state| match state {
        AsyncState::Loading(Some(_)) => Ok(true),
        AsyncState::Ready(_) | AsyncState::Errored(_) => Ok(false),
        AsyncState::Uninitialized | AsyncState::Loading(None) => Err(ReactiveError::NotReady),
    })
}

/// The last resolved value, even while a newer one is loading.
pub fn latest<T: Clone + 'static>(value: &AsyncRead<T>) -> Result<T> {
    value.read(|state| match state {
        AsyncState::Ready(value) | AsyncState::Loading(Some(value)) => Ok(value.clone()),
        AsyncState::Errored(error) => Err(error.clone()),
        AsyncState::Uninitialized | AsyncState::Loading(None) => Err(ReactiveError::NotReady),
    })
}

/// Resolve with the first value `f` produces without `NotReady`.
///
/// `f` is re-evaluated whenever what it read changes. The first other error
/// rejects the returned future. If the current owner is disposed before a
/// value is produced, the future resolves to `Disposed`.
pub fn resolve<T: 'static>(
    f: impl Fn() -> Result<T> + 'static,
) -> impl Future<Output = Result<T>> {
    let (sender, receiver) = oneshot::channel();
    let sender = Rc::new(RefCell::new(Some(sender)));

    create_root(move |root| {
        create_effect(move |_| {
            let outcome = match f() {
                Err(error) if error.is_not_ready() => return Err(error),
                outcome => outcome,
            };
            if let Some(sender) = sender.borrow_mut().take() {
                let _ = sender.send(outcome);
            }
            root.dispose();
            Ok(())
        });
    });

    async move {
        receiver
            .await
            .map_err(|_| ReactiveError::Disposed("resolve".to_string()))?
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_signal, run_until_stalled};

    #[test]
    fn async_value_loads_then_resolves() {
        let (input, set_input) = create_signal(1);
        let value = create_async(move || {
            let input = input.get();
            Ok(async move { Ok(input * 10) })
        });

        assert!(matches!(value.state(), AsyncState::Loading(None)));
        run_until_stalled();
        assert!(matches!(value.state(), AsyncState::Ready(10)));

        set_input.set(2);
        assert!(matches!(value.state(), AsyncState::Loading(Some(10))));
        run_until_stalled();
        assert_eq!(value.try_get().unwrap(), 20);
    }

    #[test]
    fn errors_surface_on_read() {
        let value = create_async(|| Ok(async { Err::<i32, _>(ReactiveError::evaluation("offline")) }));
        run_until_stalled();

        assert!(matches!(value.try_get(), Err(ReactiveError::Evaluation(_))));
        assert!(matches!(value.state(), AsyncState::Errored(_)));
    }

    #[test]
    fn superseded_results_are_ignored() {
        let (input, set_input) = create_signal(1);
        let value = create_async(move || {
            let input = input.get();
            Ok(async move { Ok(input) })
        });

        set_input.set(2);
        set_input.set(3);
        run_until_stalled();

        assert_eq!(value.try_get().unwrap(), 3);
    }
}
