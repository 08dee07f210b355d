//! Signal Core
//!
//! This crate provides a fine-grained reactive runtime. It implements:
//!
//! - Reactive primitives (signals, memos, effects, projections)
//! - A push/pull dependency graph with glitch-free updates
//! - An owner tree with scoped disposal, cleanups, error handlers and context
//! - A batching scheduler with render and user effect lanes
//! - Async values bridged from futures
//! - Keyed list mapping and error boundaries
//!
//! The runtime is single-threaded: every thread has its own graph, and
//! handles are `!Send`.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives, the owner tree and the runtime
//! - `graph`: Node storage, node states and the update queue
//! - `error`: The error type shared by every fallible operation
//! - `config`: Per-thread runtime settings
//!
//! # Example
//!
//! ```rust
//! use signal_core::{create_effect, create_memo, create_signal};
//! use std::{cell::RefCell, rc::Rc};
//!
//! // Create a signal
//! let (count, set_count) = create_signal(0);
//!
//! // Create a derived value
//! let doubled = create_memo(move |_| Ok(count.get() * 2));
//!
//! // Create an effect
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let seen_clone = seen.clone();
//! create_effect(move |_| {
//!     seen_clone.borrow_mut().push(doubled.try_get()?);
//!     Ok(())
//! });
//!
//! // Update the signal; the effect runs again
//! set_count.set(5);
//! assert_eq!(*seen.borrow(), [0, 10]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

#[cfg(feature = "serde")]
mod serde;

pub use config::{config, set_config, RuntimeConfig};
pub use error::{ReactiveError, Result};
pub use graph::{Lane, NodeId, NodeKind, NodeState};
pub use reactive::*;
