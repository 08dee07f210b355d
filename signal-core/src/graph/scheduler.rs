//! Update Scheduler
//!
//! The scheduler holds the eager nodes (effects and async values) that went
//! stale and are waiting for the next flush. It does not decide *whether* a
//! node recomputes; that is the job of the pull phase in the runtime. It only
//! decides *when* and *in what order* queued nodes are visited.
//!
//! # Algorithm
//!
//! Queued nodes are split into three lanes:
//!
//! 1. `Compute`: async values, so that their futures start as early as
//!    possible and effects that read them see a consistent pending state
//! 2. `Render`: render effects
//! 3. `User`: user effects
//!
//! A flush runs in rounds. Each round takes a snapshot of all three lanes in
//! lane order and visits every node in it. Nodes queued while a round is
//! running (because an effect wrote a signal) land in the next round. A node
//! is queued at most once per round, in the order it was first queued.

use indexmap::IndexSet;

use super::node::{NodeId, NodeKind};

/// Scheduling lane of a queued node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lane {
    Compute,
    Render,
    User,
}

impl Lane {
    /// The lane a node kind is scheduled in. Lazy kinds are never queued.
    pub fn of(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Async => Some(Self::Compute),
            NodeKind::RenderEffect => Some(Self::Render),
            NodeKind::Effect => Some(Self::User),
            NodeKind::Signal | NodeKind::Memo | NodeKind::Projection => None,
        }
    }
}

/// Pending eager nodes, grouped by lane.
#[derive(Debug, Default)]
pub(crate) struct UpdateScheduler {
    compute: IndexSet<NodeId>,
    render: IndexSet<NodeId>,
    user: IndexSet<NodeId>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a node. Returns `false` if it was already queued.
    pub fn enqueue(&mut self, lane: Lane, node_id: NodeId) -> bool {
        self.lane_mut(lane).insert(node_id)
    }

    /// Drop a node from whatever lane it is queued in.
    pub fn remove(&mut self, node_id: NodeId) {
        self.compute.shift_remove(&node_id);
        self.render.shift_remove(&node_id);
        self.user.shift_remove(&node_id);
    }

    /// Take everything queued so far, in lane order.
    pub fn drain_round(&mut self) -> Vec<NodeId> {
        let mut round = Vec::with_capacity(self.len());
        round.extend(self.compute.drain(..));
        round.extend(self.render.drain(..));
        round.extend(self.user.drain(..));
        round
    }

    pub fn clear(&mut self) {
        self.compute.clear();
        self.render.clear();
        self.user.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.compute.is_empty() && self.render.is_empty() && self.user.is_empty()
    }

    pub fn len(&self) -> usize {
        self.compute.len() + self.render.len() + self.user.len()
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut IndexSet<NodeId> {
        match lane {
            Lane::Compute => &mut self.compute,
            Lane::Render => &mut self.render,
            Lane::User => &mut self.user,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
