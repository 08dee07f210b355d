//! Graph Nodes
//!
//! This module defines the node records that live in the dependency graph.
//! A node only carries graph bookkeeping (state, edges, ownership); the typed
//! value lives in the handle that created it and is reached through the
//! node's [`Subscriber`](crate::reactive::Subscriber).

use std::borrow::Cow;
use std::rc::Rc;

use indexmap::IndexSet;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::reactive::{OwnerId, Subscriber};

new_key_type! {
    /// Unique identifier for a node in the dependency graph.
    ///
    /// Identifiers are generational: once a node is disposed its identifier
    /// never refers to another node.
    pub struct NodeId;
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    Signal,

    /// A lazily recomputed cached derivation.
    Memo,

    /// A memo that mutates a persistent object in place.
    Projection,

    /// An eager node wrapping a future-producing computation.
    Async,

    /// A side-effecting leaf, run after render effects.
    Effect,

    /// A side-effecting leaf, run before user effects.
    RenderEffect,
}

impl NodeKind {
    /// Eager nodes are queued as soon as they go stale; lazy ones wait to be read.
    pub fn is_eager(self) -> bool {
        matches!(self, Self::Async | Self::Effect | Self::RenderEffect)
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Memo => "memo",
            Self::Projection => "projection",
            Self::Async => "async value",
            Self::Effect => "effect",
            Self::RenderEffect => "render effect",
        }
    }
}

/// Staleness of a node.
///
/// The ordering matters: a notification only ever raises the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    /// The node's value is up-to-date.
    Clean,

    /// A transitive source might have changed. Sources must be checked
    /// before deciding whether to recompute.
    Check,

    /// A direct source changed. The node must recompute.
    Dirty,

    /// The node has been disposed and will never run again.
    Disposed,
}

/// A node in the dependency graph.
pub(crate) struct ReactiveNode {
    pub kind: NodeKind,
    pub state: NodeState,

    /// Set while the node's computation is executing.
    pub running: bool,

    /// Nodes read during the last evaluation, in read order.
    pub sources: SmallVec<[NodeId; 4]>,

    /// Nodes that read this node during their last evaluation.
    pub observers: IndexSet<NodeId>,

    /// The owner this node was created under.
    pub owner: Option<OwnerId>,

    /// For computations, the scope that owns whatever a run creates.
    pub scope: Option<OwnerId>,

    pub name: Option<Cow<'static, str>>,

    /// Compute hook. Absent for signals.
    pub subscriber: Option<Rc<dyn Subscriber>>,
}

impl ReactiveNode {
    /// Create a new node of the given kind.
    ///
    /// Computations start dirty so that their first read (or first flush,
    /// for eager nodes) runs them.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            state: match kind {
                NodeKind::Signal => NodeState::Clean,
                _ => NodeState::Dirty,
            },
            running: false,
            sources: SmallVec::new(),
            observers: IndexSet::new(),
            owner: None,
            scope: None,
            name: None,
            subscriber: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.state == NodeState::Clean
    }

    /// Raise the state to `state`. Returns the previous state when it
    /// actually changed.
    pub fn raise(&mut self, state: NodeState) -> Option<NodeState> {
        if self.state >= state {
            return None;
        }
        let previous = self.state;
        self.state = state;
        Some(previous)
    }

    /// Human readable description used in error messages.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} `{}`", self.kind.label(), name),
            None => self.kind.label().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_node_starts_clean() {
        let node = ReactiveNode::new(NodeKind::Signal);
        assert!(node.is_clean());
    }

    #[test]
    fn computations_start_dirty() {
        for kind in [NodeKind::Memo, NodeKind::Projection, NodeKind::Effect, NodeKind::Async] {
            assert_eq!(ReactiveNode::new(kind).state, NodeState::Dirty);
        }
    }

    #[test]
    fn raise_only_moves_up() {
        let mut node = ReactiveNode::new(NodeKind::Signal);

        assert_eq!(node.raise(NodeState::Check), Some(NodeState::Clean));
        assert_eq!(node.raise(NodeState::Check), None);
        assert_eq!(node.raise(NodeState::Dirty), Some(NodeState::Check));
        assert_eq!(node.raise(NodeState::Check), None);
        assert_eq!(node.state, NodeState::Dirty);
    }

    #[test]
    fn describe_uses_name_when_present() {
        let mut node = ReactiveNode::new(NodeKind::Memo);
        assert_eq!(node.describe(), "memo");

        node.name = Some("total".into());
        assert_eq!(node.describe(), "memo `total`");
    }
}
