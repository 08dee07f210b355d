//! Error Boundaries
//!
//! [`create_error_boundary`] runs a body inside a scope with an
//! [`on_error`] handler. While the body and everything it created are
//! healthy the boundary reads as the body's value. The first error raised
//! under it switches the boundary to its fallback, which receives the error
//! and a [`BoundaryReset`] handle. Resetting re-runs the body from scratch.
//!
//! Errors returned by the fallback itself go to the next handler up, the
//! same way errors from any other memo do.

use std::fmt;

use super::memo::Memo;
use super::owner::on_error;
use super::runtime::batch;
use super::signal::{Signal, SignalOptions};
use crate::error::{ReactiveError, Result};

/// Clears a boundary's error and re-runs its body.
#[derive(Clone)]
pub struct BoundaryReset {
    error: Signal<Option<ReactiveError>>,
    generation: Signal<u64>,
}

impl BoundaryReset {
    pub fn reset(&self) {
        tracing::debug!(boundary = ?self.error.id(), "resetting error boundary");
        batch(|| {
            self.error.set(None);
            self.generation.update(|generation| generation + 1);
        });
    }
}

impl fmt::Debug for BoundaryReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryReset")
            .field("error", &self.error.id())
            .finish()
    }
}

/// Show `fallback` instead of `body` once something under `body` fails.
///
/// ```rust
/// use signal_core::{create_error_boundary, create_signal, ReactiveError};
///
/// let (input, set_input) = create_signal(1);
/// let view = create_error_boundary(
///     move || match input.get() {
///         n if n > 0 => Ok(format!("{n} items")),
///         _ => Err(ReactiveError::evaluation("negative count")),
///     },
///     |error, _reset| Ok(format!("failed: {error}")),
/// );
///
/// assert_eq!(view.get(), "1 items");
/// set_input.set(-1);
/// assert_eq!(view.get(), "failed: computation failed: negative count");
/// ```
pub fn create_error_boundary<T: Clone + 'static>(
    mut body: impl FnMut() -> Result<T> + 'static,
    fallback: impl Fn(ReactiveError, BoundaryReset) -> Result<T> + 'static,
) -> Memo<T> {
    let reset = BoundaryReset {
        error: Signal::with_options(None, SignalOptions::always_notify().named("boundary error")),
        generation: Signal::new(0),
    };

    let content = {
        let reset = reset.clone();
        Memo::with_options(
            move |_| {
                reset.generation.get();
                let error = reset.error.clone();
                on_error(move |caught| {
                    if error.with_untracked(Option::is_none) {
                        tracing::debug!(%caught, "error boundary caught an error");
                        error.set(Some(caught));
                    }
                });
                body()
            },
            SignalOptions::always_notify(),
        )
    };

    Memo::with_options(
        move |_| {
            if let Some(error) = reset.error.get() {
                return fallback(error, reset.clone());
            }
            match content.try_get() {
                Err(error) if !error.is_not_ready() && !error.is_disposed() => {
                    fallback(error, reset.clone())
                }
                outcome => outcome,
            }
        },
        SignalOptions::always_notify().named("error boundary"),
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
