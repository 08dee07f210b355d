//! Reactive Primitives
//!
//! This module implements the reactive system: signals, memos, effects,
//! projections and async values, plus the owner tree that decides how long
//! each of them lives.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal
//! automatically registers that context as an observer. When the signal's
//! value changes, all observers are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates lazily,
//! only when read after one of its dependencies actually changed.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Render effects run before user effects.
//!
//! ## Owners
//!
//! Every computation owns whatever it creates while running. Disposing an
//! owner disposes its children most recent first, then runs its
//! [`on_cleanup`] callbacks in reverse registration order. [`create_root`]
//! opens a new owner explicitly.
//!
//! ## Lists and Boundaries
//!
//! [`map_array`] and [`repeat`] map a reactive list into rows that each own
//! what their mapping created. [`create_error_boundary`] swaps a body for a
//! fallback once something under it fails, until it is reset.
//!
//! ## Async Values
//!
//! [`create_async`] turns a future into a reactive value. Reading it before
//! it resolves fails with [`NotReady`](crate::ReactiveError::NotReady), which
//! readers propagate with `?` until the value arrives.
//!
//! # Implementation Notes
//!
//! The runtime uses a thread-local tracking context to detect dependencies.
//! Writes push `Dirty`/`Check` marks downstream; reads pull stale nodes up to
//! date, so every computation sees a consistent snapshot of its sources.

mod boundary;
mod context;
mod effect;
mod executor;
mod map;
mod memo;
mod owner;
mod projection;
mod resource;
mod runtime;
mod signal;
mod subscriber;

pub use boundary::{create_error_boundary, BoundaryReset};
pub use context::untrack;
pub use effect::{create_effect, create_render_effect, Effect};
pub use executor::{block_on, run_until_stalled};
pub use map::{map_array, repeat};
pub use memo::{create_memo, create_memo_with_options, Memo};
pub use owner::{
    create_root, get_owner, on_cleanup, on_error, provide_context, use_context, Owner, OwnerId,
    RootHandle,
};
pub use projection::{create_projection, Projection};
pub use resource::{create_async, is_pending, latest, resolve, AsyncRead, AsyncState};
pub use runtime::{
    batch, flush_sync, flush_sync_with, is_alive, node_name, node_observers, node_sources,
};
pub use signal::{
    create_signal, create_signal_with_options, EqualsFn, ReadSignal, Signal, SignalOptions,
    WriteSignal,
};

pub(crate) use subscriber::Subscriber;
