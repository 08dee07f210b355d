//! Node Store
//!
//! The store owns every node of a runtime in a slot arena and maintains the
//! edges between them. Edges are kept in both directions:
//!
//! - `sources`: the nodes a computation read during its last run
//! - `observers`: the nodes that read this node during their last run
//!
//! The two directions are always mutual. Every method that touches one side
//! also updates the other, so a disposed or re-run node never leaves a
//! dangling one-directional edge behind.

use slotmap::SlotMap;
use smallvec::SmallVec;

use super::node::{NodeId, ReactiveNode};

/// Arena of graph nodes, addressed by stable [`NodeId`]s.
#[derive(Default)]
pub(crate) struct Graph {
    nodes: SlotMap<NodeId, ReactiveNode>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub fn insert(&mut self, node: ReactiveNode) -> NodeId {
        self.nodes.insert(node)
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove(&mut self, node_id: NodeId) -> Option<ReactiveNode> {
        let node = self.nodes.remove(node_id)?;

        // Remove this node from its sources' observer sets
        for source_id in &node.sources {
            if let Some(source) = self.nodes.get_mut(*source_id) {
                source.observers.shift_remove(&node_id);
            }
        }

        // Remove this node from its observers' source lists
        for observer_id in &node.observers {
            if let Some(observer) = self.nodes.get_mut(*observer_id) {
                observer.sources.retain(|s| *s != node_id);
            }
        }

        Some(node)
    }

    pub fn get(&self, node_id: NodeId) -> Option<&ReactiveNode> {
        self.nodes.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: NodeId) -> Option<&mut ReactiveNode> {
        self.nodes.get_mut(node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Record that `observer` read `source`.
    ///
    /// Only the observer side of the edge is written here; the source list
    /// of the observer is replaced wholesale by [`Graph::replace_sources`]
    /// when its evaluation finishes.
    pub fn add_observer(&mut self, source: NodeId, observer: NodeId) {
        if let Some(node) = self.nodes.get_mut(source) {
            node.observers.insert(observer);
        }
    }

    /// Install the sources collected during an evaluation of `observer`,
    /// pruning the edges to sources that were not read this time.
    pub fn replace_sources(&mut self, observer: NodeId, sources: SmallVec<[NodeId; 4]>) {
        let Some(node) = self.nodes.get_mut(observer) else {
            // The observer was disposed while running; drop the edges it
            // created on the way.
            self.unlink(observer, &sources);
            return;
        };
        let previous = std::mem::replace(&mut node.sources, sources);

        let stale: SmallVec<[NodeId; 4]> = {
            let current = &self.nodes[observer].sources;
            previous
                .into_iter()
                .filter(|source| !current.contains(source))
                .collect()
        };
        self.unlink(observer, &stale);
    }

    /// Remove `observer` from the observer sets of `sources`.
    pub fn unlink(&mut self, observer: NodeId, sources: &[NodeId]) {
        for source_id in sources {
            if let Some(source) = self.nodes.get_mut(*source_id) {
                source.observers.shift_remove(&observer);
            }
        }
    }

    /// Observers of a node, in subscription order.
    pub fn observers(&self, node_id: NodeId) -> SmallVec<[NodeId; 4]> {
        self.nodes
            .get(node_id)
            .map(|node| node.observers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Sources of a node, in read order.
    pub fn sources(&self, node_id: NodeId) -> SmallVec<[NodeId; 4]> {
        self.nodes
            .get(node_id)
            .map(|node| node.sources.clone())
            .unwrap_or_default()
    }
}
