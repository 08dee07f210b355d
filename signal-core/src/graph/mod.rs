//! Dependency Graph
//!
//! This module implements the graph that tracks relationships between
//! reactive values and the computations that read them.
//!
//! # Overview
//!
//! The dependency graph is a directed graph where:
//!
//! - Nodes represent reactive values (signals) or computations (memos,
//!   projections, async values, effects)
//! - Edges represent reads: if A read B during its last run, B has A as an
//!   observer and A has B as a source
//!
//! When a signal changes, its observers are marked dirty and everything
//! further downstream is marked "check". Nothing recomputes during that push.
//! Stale nodes are pulled up to date when they are read, or when the
//! scheduler visits them during a flush.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a slot arena keyed by generational ids, so a disposed
//!    node's id can never alias a new node.
//!
//! 2. Edges are stored in both directions. The push phase walks observers,
//!    the pull phase walks sources.
//!
//! 3. Dependencies are rediscovered on every run. Edges that were not read
//!    during the latest run are pruned when it finishes.

mod node;
mod scheduler;
mod store;

pub use node::{NodeId, NodeKind, NodeState};
pub use scheduler::Lane;

pub(crate) use node::ReactiveNode;
pub(crate) use scheduler::UpdateScheduler;
pub(crate) use store::Graph;
