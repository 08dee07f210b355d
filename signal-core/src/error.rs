//! Error Types
//!
//! Every fallible operation in the reactive graph reports a [`ReactiveError`].
//! User-supplied computations return [`Result`], so errors flow through the
//! graph with `?` the same way values do:
//!
//! - A memo or projection that fails caches its error and hands it to every
//!   reader until one of its sources changes.
//! - An effect that fails reports to the nearest owner with an error handler,
//!   or to the next [`flush_sync`](crate::reactive::flush_sync) call.
//! - An async value that fails stores the error in its state and returns it
//!   when read.

use std::error::Error as StdError;
use std::sync::Arc;

/// Result type used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors produced by the reactive graph.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReactiveError {
    /// A computation was read after its owner disposed it.
    #[error("tried to read disposed {0}")]
    Disposed(String),

    /// A node was read while it was computing its own value.
    #[error("cycle detected: {0} was read during its own evaluation")]
    Cycle(String),

    /// A user-supplied computation failed.
    #[error("computation failed: {0}")]
    Evaluation(#[source] Arc<dyn StdError + Send + Sync>),

    /// An async value was read before it resolved.
    #[error("async value is not ready yet")]
    NotReady,

    /// An owner-scoped operation ran outside of any owner.
    #[error("no reactive owner is active")]
    NoOwner,
}

impl ReactiveError {
    /// Wrap an arbitrary error (or message) as an evaluation failure.
    ///
    /// ```rust
    /// use signal_core::ReactiveError;
    ///
    /// let err = ReactiveError::evaluation("division by zero");
    /// assert_eq!(err.to_string(), "computation failed: division by zero");
    /// ```
    pub fn evaluation<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Evaluation(Arc::from(error.into()))
    }

    /// Whether this is the "async value not resolved yet" signal.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady)
    }

    /// Whether this error came from reading a disposed node.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed(_))
    }

    /// Two errors are "the same outcome" for change detection when both are
    /// `NotReady`; every other error counts as a new value.
    pub(crate) fn same_outcome(&self, other: &Self) -> bool {
        self.is_not_ready() && other.is_not_ready()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = ReactiveError::evaluation(io);

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "computation failed: disk on fire");
    }

    #[test]
    fn only_not_ready_pairs_are_the_same_outcome() {
        assert!(ReactiveError::NotReady.same_outcome(&ReactiveError::NotReady));
        assert!(!ReactiveError::NoOwner.same_outcome(&ReactiveError::NoOwner));
        assert!(!ReactiveError::NotReady.same_outcome(&ReactiveError::evaluation("x")));
    }
}
