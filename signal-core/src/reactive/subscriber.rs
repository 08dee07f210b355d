//! Subscriber types for the reactive system.
//!
//! A subscriber is the type-erased half of a computation. The graph only
//! stores node ids and states; when a node has to recompute, the runtime
//! calls its subscriber, which owns the typed closure and value.

use crate::error::Result;

/// The compute hook of a memo, projection, async value or effect.
pub(crate) trait Subscriber {
    /// Re-run the computation.
    ///
    /// Returns whether the node's observable value changed. Memos and
    /// projections store their own errors and report them as a change;
    /// effects return theirs so the runtime can route them to a handler.
    fn run(&self) -> Result<bool>;

    /// Release whatever the node holds. Called once, when the node is disposed.
    fn dispose(&self) {}
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        runs: Cell<u32>,
    }

    impl Subscriber for Counter {
        fn run(&self) -> Result<bool> {
            self.runs.set(self.runs.get() + 1);
            Ok(self.runs.get() % 2 == 0)
        }
    }

    #[test]
    fn subscriber_reports_change() {
        let counter = Counter { runs: Cell::new(0) };
        let subscriber: &dyn Subscriber = &counter;

        assert!(!subscriber.run().unwrap());
        assert!(subscriber.run().unwrap());
        subscriber.dispose();
        assert_eq!(counter.runs.get(), 2);
    }
}
