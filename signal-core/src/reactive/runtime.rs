//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos,
//! effects and async values. It owns the dependency graph, the owner tree
//! and the update queue of the current thread.
//!
//! # How It Works
//!
//! 1. When a signal is written, the runtime marks its observers `Dirty` and
//!    everything further downstream `Check` (the push phase). Effects and
//!    async values that leave `Clean` are queued.
//!
//! 2. When a stale node is read, or the flush reaches a queued node, the
//!    runtime brings it up to date (the pull phase):
//!    a. A `Check` node pulls its sources in order and stops at the first
//!       one whose value actually changed
//!    b. A `Dirty` node recomputes
//!    c. A node whose sources all turned out unchanged is marked `Clean`
//!       without running
//!
//! 3. A recomputation first resets the node's scope (disposing whatever the
//!    previous run created and running its cleanups), then runs with fresh
//!    tracking. Edges that were not read this time are dropped.
//!
//! 4. Writes flush automatically when no batch and no flush is active.
//!
//! # Re-entrancy
//!
//! User code runs arbitrary reactive operations, so no borrow of the
//! runtime's cells is ever held across a call into user code.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::SlotMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::owner::{OwnerGuard, OwnerId, OwnerNode};
use super::subscriber::Subscriber;
use crate::config::config;
use crate::error::{ReactiveError, Result};
use crate::graph::{Graph, Lane, NodeId, NodeKind, NodeState, ReactiveNode, UpdateScheduler};

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Run `f` with the current thread's runtime.
pub(crate) fn with_runtime<T>(f: impl FnOnce(&Runtime) -> T) -> T {
    RUNTIME.with(f)
}

/// The per-thread reactive runtime.
pub(crate) struct Runtime {
    pub graph: RefCell<Graph>,
    pub owners: RefCell<SlotMap<OwnerId, OwnerNode>>,
    pub scheduler: RefCell<UpdateScheduler>,
    pub current_owner: Cell<Option<OwnerId>>,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
    uncaught: RefCell<Option<ReactiveError>>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            graph: RefCell::new(Graph::new()),
            owners: RefCell::new(SlotMap::with_key()),
            scheduler: RefCell::new(UpdateScheduler::new()),
            current_owner: Cell::new(None),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            uncaught: RefCell::new(None),
        }
    }

    // ---- Node lifecycle ----

    /// Register a signal node under the current owner.
    pub fn create_signal_node(&self, name: Option<Cow<'static, str>>) -> NodeId {
        let owner = self.current_owner.get();
        let mut node = ReactiveNode::new(NodeKind::Signal);
        node.owner = owner;
        node.name = name;
        let id = self.graph.borrow_mut().insert(node);

        if let Some(owner) = owner {
            let registered = match self.owners.borrow_mut().get_mut(owner) {
                Some(owner) => {
                    owner.signals.push(id);
                    true
                }
                None => false,
            };
            if !registered {
                // Created under a disposed owner.
                self.dispose_node(id);
            }
        }
        tracing::trace!(node = ?id, "created signal");
        id
    }

    /// Register a computation node with its own scope under the current owner.
    ///
    /// `make` receives the new node's id and builds its compute hook. Eager
    /// kinds are queued for their first run; the caller decides when to flush.
    pub fn create_computation(
        &self,
        kind: NodeKind,
        name: Option<Cow<'static, str>>,
        make: impl FnOnce(NodeId) -> Rc<dyn Subscriber>,
    ) -> NodeId {
        let owner = self.current_owner.get();
        let mut node = ReactiveNode::new(kind);
        node.owner = owner;
        node.name = name;
        let id = self.graph.borrow_mut().insert(node);
        let subscriber = make(id);

        if owner.is_some_and(|owner| !self.owner_alive(owner)) {
            tracing::trace!(node = ?id, "created under a disposed owner");
            self.graph.borrow_mut().remove(id);
            subscriber.dispose();
            return id;
        }
        if owner.is_none()
            && matches!(kind, NodeKind::Effect | NodeKind::RenderEffect)
            && config().warn_unowned_effects
        {
            tracing::warn!(node = ?id, "effect created outside of a reactive owner will never be disposed");
        }

        let scope = self.create_owner(owner);
        if let Some(scope) = self.owners.borrow_mut().get_mut(scope) {
            scope.computation = Some(id);
        }
        if let Some(node) = self.graph.borrow_mut().get_mut(id) {
            node.scope = Some(scope);
            node.subscriber = Some(subscriber);
        }
        if let Some(lane) = Lane::of(kind) {
            self.scheduler.borrow_mut().enqueue(lane, id);
        }
        tracing::trace!(
            node = ?id,
            kind = kind.label(),
            created_by = ?ReactiveContext::current_observer(),
            "created computation"
        );
        id
    }

    /// Remove a node from the graph and release its value.
    ///
    /// Computations should be disposed through their scope instead, so that
    /// whatever their last run created goes with them.
    pub fn dispose_node(&self, id: NodeId) {
        let removed = self.graph.borrow_mut().remove(id);
        let Some(node) = removed else {
            return;
        };
        self.scheduler.borrow_mut().remove(id);
        tracing::trace!(node = ?id, kind = node.kind.label(), "disposed node");

        if let Some(scope) = node.scope {
            self.dispose_owner(scope);
        }
        if let Some(subscriber) = node.subscriber {
            subscriber.dispose();
        }
    }

    /// Dispose a computation together with its scope.
    pub fn dispose_computation(&self, id: NodeId) {
        let scope = self.graph.borrow().get(id).and_then(|node| node.scope);
        match scope {
            Some(scope) => self.dispose_owner(scope),
            None => self.dispose_node(id),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.borrow().contains(id)
    }

    // ---- Reads ----

    /// Bring a computation up to date and track the read.
    ///
    /// Returns `Disposed` if the node is gone and `Cycle` if it is running.
    pub fn read(&self, id: NodeId, kind: NodeKind) -> Result<()> {
        self.update_if_necessary(id)?;
        if !self.contains(id) {
            return Err(ReactiveError::Disposed(kind.label().to_string()));
        }
        self.track(id);
        self.maybe_flush();
        Ok(())
    }

    /// Track a read of a signal. Disposed signals are not tracked.
    pub fn track(&self, source: NodeId) {
        if let Some(observer) = ReactiveContext::track_dependency(source) {
            self.graph.borrow_mut().add_observer(source, observer);
        }
    }

    fn state_of(&self, id: NodeId) -> Option<NodeState> {
        self.graph.borrow().get(id).map(|node| node.state)
    }

    fn set_state(&self, id: NodeId, state: NodeState) {
        if let Some(node) = self.graph.borrow_mut().get_mut(id) {
            node.state = state;
        }
    }

    /// Bring `id` up to date.
    ///
    /// The walk over `Check` sources uses an explicit stack, so a long chain
    /// of stale memos is settled bottom-up without recursing once per level.
    pub(crate) fn update_if_necessary(&self, id: NodeId) -> Result<()> {
        let root = {
            let graph = self.graph.borrow();
            let Some(node) = graph.get(id) else {
                return Ok(());
            };
            if node.running {
                return Err(ReactiveError::Cycle(node.describe()));
            }
            match node.state {
                NodeState::Clean => return Ok(()),
                NodeState::Disposed => return Err(ReactiveError::Disposed(node.describe())),
                NodeState::Check | NodeState::Dirty => CheckFrame::new(id, node),
            }
        };

        let mut stack = vec![root];
        while let Some(frame) = stack.last_mut() {
            let current = frame.id;
            // A changed source raises the node to `Dirty`; no need to look further.
            let next = match self.state_of(current) {
                Some(NodeState::Check) => frame.next_source(),
                _ => None,
            };

            let Some(source) = next else {
                stack.pop();
                match self.state_of(current) {
                    Some(NodeState::Check) => self.set_state(current, NodeState::Clean),
                    Some(NodeState::Dirty) => self.update(current),
                    _ => {}
                }
                continue;
            };

            let graph = self.graph.borrow();
            let Some(node) = graph.get(source) else {
                continue;
            };
            match node.state {
                NodeState::Clean if !node.running => {}
                NodeState::Check | NodeState::Dirty if !node.running => {
                    let frame = CheckFrame::new(source, node);
                    drop(graph);
                    stack.push(frame);
                }
                _ => {
                    // The source itself is broken; let the computation see it.
                    drop(graph);
                    self.set_state(current, NodeState::Dirty);
                }
            }
        }
        Ok(())
    }

    /// Recompute a node.
    fn update(&self, id: NodeId) {
        let Some((subscriber, scope, owner)) = self
            .graph
            .borrow()
            .get(id)
            .map(|node| (node.subscriber.clone(), node.scope, node.owner))
        else {
            return;
        };
        let Some(subscriber) = subscriber else {
            self.set_state(id, NodeState::Clean);
            return;
        };

        let _batch = BatchGuard::enter();
        if let Some(scope) = scope {
            self.reset_owner(scope);
        }
        match self.graph.borrow_mut().get_mut(id) {
            Some(node) => node.running = true,
            None => return,
        }
        tracing::trace!(node = ?id, "recomputing");

        let ctx = ReactiveContext::enter(id);
        let owner_guard = OwnerGuard::enter(scope);
        let result = subscriber.run();
        drop(owner_guard);
        let sources = ctx.finish();

        {
            let mut graph = self.graph.borrow_mut();
            graph.replace_sources(id, sources);
            if let Some(node) = graph.get_mut(id) {
                node.running = false;
                node.state = NodeState::Clean;
            }
        }

        match result {
            Ok(true) => self.notify(id),
            Ok(false) => {}
            Err(error) if error.is_not_ready() => {
                tracing::trace!(node = ?id, "waiting on an async value");
            }
            Err(error) => self.report_error(owner, error),
        }
    }

    /// Run the stale computations above `id` in the owner tree, then `id`.
    ///
    /// A parent rerun may dispose `id`, in which case it never runs.
    fn run_top(&self, id: NodeId) {
        let mut ancestors: SmallVec<[NodeId; 4]> = SmallVec::new();
        {
            let graph = self.graph.borrow();
            let owners = self.owners.borrow();
            let mut owner = graph.get(id).and_then(|node| node.owner);
            while let Some(scope) = owner.and_then(|owner| owners.get(owner)) {
                if let Some(parent) = scope.computation {
                    if graph.get(parent).is_some_and(|node| !node.is_clean()) {
                        ancestors.push(parent);
                    }
                }
                owner = scope.parent;
            }
        }

        for ancestor in ancestors.into_iter().rev() {
            let _ = self.update_if_necessary(ancestor);
        }
        let _ = self.update_if_necessary(id);
    }

    // ---- Writes ----

    /// Mark the observers of `source` dirty and everything below them `Check`.
    pub fn notify(&self, source: NodeId) {
        let mut graph = self.graph.borrow_mut();
        let mut scheduler = self.scheduler.borrow_mut();

        let mut stack: Vec<(NodeId, NodeState)> = graph
            .observers(source)
            .into_iter()
            .rev()
            .map(|observer| (observer, NodeState::Dirty))
            .collect();

        while let Some((id, state)) = stack.pop() {
            let Some(node) = graph.get_mut(id) else {
                continue;
            };
            let Some(previous) = node.raise(state) else {
                continue;
            };
            if previous != NodeState::Clean {
                continue;
            }
            if let Some(lane) = Lane::of(node.kind) {
                scheduler.enqueue(lane, id);
            }
            stack.extend(
                node.observers
                    .iter()
                    .rev()
                    .map(|observer| (*observer, NodeState::Check)),
            );
        }
    }

    fn report_error(&self, owner: Option<OwnerId>, error: ReactiveError) {
        match self.find_error_handler(owner) {
            Some(handler) => handler(error),
            None => {
                tracing::error!(%error, "uncaught error in effect");
                self.record_uncaught(error);
            }
        }
    }

    /// Keep the first uncaught error until [`flush_sync`] hands it out.
    fn record_uncaught(&self, error: ReactiveError) {
        let mut uncaught = self.uncaught.borrow_mut();
        if uncaught.is_none() {
            *uncaught = Some(error);
        }
    }

    // ---- Scheduling ----

    /// Flush unless a batch or flush is in progress.
    pub fn maybe_flush(&self) {
        if self.batch_depth.get() == 0 && !self.flushing.get() {
            self.flush();
        }
    }

    /// Run queued nodes until the queue is empty.
    pub fn flush(&self) {
        if self.flushing.get() || self.scheduler.borrow().is_empty() {
            return;
        }
        let _flushing = FlushGuard::enter(self);
        let max_rounds = config().max_flush_rounds;
        let mut rounds = 0;

        loop {
            let round = self.scheduler.borrow_mut().drain_round();
            if round.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > max_rounds {
                tracing::warn!(rounds = max_rounds, "possible infinite update loop, abandoning flush");
                self.scheduler.borrow_mut().clear();
                self.record_uncaught(ReactiveError::Cycle(format!(
                    "updates did not settle after {max_rounds} flush rounds"
                )));
                break;
            }
            tracing::debug!(round = rounds, nodes = round.len(), "flush round");
            for id in round {
                self.run_top(id);
            }
        }
    }

    fn take_uncaught(&self) -> Result<()> {
        match self.uncaught.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A node whose sources are being checked by [`Runtime::update_if_necessary`].
struct CheckFrame {
    id: NodeId,
    sources: SmallVec<[NodeId; 4]>,
    next: usize,
}

impl CheckFrame {
    fn new(id: NodeId, node: &ReactiveNode) -> Self {
        let sources = match node.state {
            NodeState::Check => node.sources.clone(),
            _ => SmallVec::new(),
        };
        Self {
            id,
            sources,
            next: 0,
        }
    }

    fn next_source(&mut self) -> Option<NodeId> {
        let source = self.sources.get(self.next).copied()?;
        self.next += 1;
        Some(source)
    }
}

/// Holds off automatic flushing while alive.
struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        with_runtime(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
        Self
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        with_runtime(|rt| rt.batch_depth.set(rt.batch_depth.get().saturating_sub(1)));
    }
}

struct FlushGuard<'a> {
    rt: &'a Runtime,
}

impl<'a> FlushGuard<'a> {
    fn enter(rt: &'a Runtime) -> Self {
        rt.flushing.set(true);
        Self { rt }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.rt.flushing.set(false);
    }
}

/// Run `f` with automatic flushing suspended, then flush once.
///
/// ```rust
/// use signal_core::{batch, create_effect, create_signal};
/// use std::{cell::Cell, rc::Rc};
///
/// let (a, set_a) = create_signal(1);
/// let (b, set_b) = create_signal(2);
/// let runs = Rc::new(Cell::new(0));
/// let runs_clone = runs.clone();
///
/// let _effect = create_effect(move |_| {
///     runs_clone.set(runs_clone.get() + 1);
///     Ok(a.get() + b.get())
/// });
/// assert_eq!(runs.get(), 1);
///
/// batch(|| {
///     set_a.set(10);
///     set_b.set(20);
/// });
/// assert_eq!(runs.get(), 2);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    let value = {
        let _batch = BatchGuard::enter();
        f()
    };
    with_runtime(Runtime::maybe_flush);
    value
}

/// Run every queued effect and async value now.
///
/// Returns the first effect error that no [`on_error`](super::on_error)
/// handler caught since the last call. Calling this while a flush is
/// already running does nothing; the running flush picks up the work.
pub fn flush_sync() -> Result<()> {
    with_runtime(|rt| {
        rt.flush();
        rt.take_uncaught()
    })
}

/// Run `f` batched, then flush as [`flush_sync`] does.
pub fn flush_sync_with<T>(f: impl FnOnce() -> T) -> Result<T> {
    let value = batch(f);
    flush_sync()?;
    Ok(value)
}

// ---- Introspection ----

/// Sources the node read during its last evaluation, in read order.
pub fn node_sources(id: NodeId) -> Vec<NodeId> {
    with_runtime(|rt| rt.graph.borrow().sources(id).into_vec())
}

/// Nodes that read this node during their last evaluation.
pub fn node_observers(id: NodeId) -> Vec<NodeId> {
    with_runtime(|rt| rt.graph.borrow().observers(id).into_vec())
}

/// Debug name of a node, if it has one and is still alive.
pub fn node_name(id: NodeId) -> Option<String> {
    with_runtime(|rt| {
        rt.graph
            .borrow()
            .get(id)
            .and_then(|node| node.name.as_ref().map(|name| name.to_string()))
    })
}

/// Whether a node is still part of the graph.
pub fn is_alive(id: NodeId) -> bool {
    with_runtime(|rt| rt.contains(id))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
