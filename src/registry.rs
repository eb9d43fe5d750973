//! The dependency registry.
//!
//! Every resource handed out across the bridge is stored as a node in a
//! [`StableGraph`]. Edges run from a parent to the resources derived from it
//! and are tagged with the [`Side`] of the derivation the parent fed. The
//! structure is a forest fixed at registration time: a node can only name
//! parents registered before it, and its edges are never rewired.
//!
//! Destroying a node frees it together with everything it was derived from.
//! A destroyed node stays in the graph, still answering lookups, until a
//! compaction sweep removes it and releases its slot for reuse.

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use tracing::Level;

use crate::config::{Compaction, Config, Options};
use crate::error::RegistryError;
use crate::factory::ResourceFactory;
use crate::handle::Handle;
use crate::parents::{Parents, Side};

pub(crate) struct Node<R> {
    pub epoch: u64,
    /// `None` once the resource went back to the factory.
    pub resource: Option<R>,
    /// Held by a slot through [`Registry::assign`]. A bound node is never
    /// linked as a parent and never freed by a cascade started elsewhere.
    pub bound: bool,
}

impl<R> Node<R> {
    pub fn is_destroyed(&self) -> bool {
        self.resource.is_none()
    }
}

/// A borrowed view of one registered node.
pub struct NodeRef<'a, R> {
    handle: Handle,
    node: &'a Node<R>,
    parents: [Option<Handle>; 2],
}

impl<'a, R> NodeRef<'a, R> {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn is_destroyed(&self) -> bool {
        self.node.is_destroyed()
    }

    /// Whether the node is bound to a slot by [`Registry::assign`].
    pub fn is_bound(&self) -> bool {
        self.node.bound
    }

    /// The resource, unless it has already been freed.
    pub fn resource(&self) -> Option<&'a R> {
        self.node.resource.as_ref()
    }

    pub fn left(&self) -> Option<Handle> {
        self.parents[0]
    }

    pub fn right(&self) -> Option<Handle> {
        self.parents[1]
    }

    /// Parents that are still present in the registry, left first.
    pub fn parents(&self) -> [Option<Handle>; 2] {
        self.parents
    }
}

/// Tracks which resources were derived from which, and frees them in
/// dependency order.
///
/// The registry owns every live resource registered with it. A resource leaves
/// the registry only through [`ResourceFactory::free`], which is called
/// exactly once per registration: on [`destroy`](Self::destroy),
/// [`cleanup`](Self::cleanup), [`release_all`](Self::release_all) or when the
/// registry is dropped.
pub struct Registry<F: ResourceFactory> {
    pub(crate) graph: StableGraph<Node<F::Resource>, Side>,
    factory: F,
    options: Options,
    epoch: u64,
}

/// Every node has at most two parent edges.
fn edge_capacity(nodes: usize) -> usize {
    nodes.saturating_mul(2)
}

impl<F: ResourceFactory> Registry<F> {
    /// Creates an empty registry with default settings.
    pub fn new(factory: F) -> Self {
        Self::config(factory).finish()
    }

    /// Starts configuring a registry, see [`Config`].
    pub fn config(factory: F) -> Config<F> {
        Config::new(factory)
    }

    pub(crate) fn with_options(factory: F, options: Options) -> Self {
        Self {
            graph: StableGraph::with_capacity(options.capacity, edge_capacity(options.capacity)),
            factory,
            options,
            epoch: 0,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Number of nodes currently stored, destroyed ones included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of nodes whose resource has not been freed yet.
    pub fn live_count(&self) -> usize {
        self.graph
            .node_indices()
            .filter(|&index| !self.graph[index].is_destroyed())
            .count()
    }

    /// All stored handles in registration order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<_> = self
            .graph
            .node_indices()
            .map(|index| Handle::new(index, self.graph[index].epoch))
            .collect();
        handles.sort_unstable();
        handles
    }

    fn resolve(&self, handle: Handle) -> Option<&Node<F::Resource>> {
        self.graph
            .node_weight(handle.index)
            .filter(|node| node.epoch == handle.epoch)
    }

    fn parent_indices(&self, index: NodeIndex) -> [Option<NodeIndex>; 2] {
        let mut sides = [None, None];
        for edge in self.graph.edges_directed(index, Direction::Incoming) {
            match edge.weight() {
                Side::Left => sides[0] = Some(edge.source()),
                Side::Right => sides[1] = Some(edge.source()),
            }
        }
        sides
    }

    fn handle_at(&self, index: NodeIndex) -> Handle {
        Handle::new(index, self.graph[index].epoch)
    }

    /// Finds the node registered under `handle`.
    ///
    /// Destroyed nodes are still returned until compaction removes them. A
    /// `None` is not an error: it means the handle carries no bookkeeping,
    /// either because it was never tracked or because it has been swept.
    pub fn lookup(&self, handle: Handle) -> Option<NodeRef<'_, F::Resource>> {
        let node = self.resolve(handle)?;
        let parents = self
            .parent_indices(handle.index)
            .map(|side| side.map(|index| self.handle_at(index)));

        Some(NodeRef {
            handle,
            node,
            parents,
        })
    }

    /// Returns `true` if `handle` names a resource that has not been freed.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.resolve(handle).is_some_and(|node| !node.is_destroyed())
    }

    pub fn get(&self, handle: Handle) -> Option<&F::Resource> {
        self.resolve(handle)?.resource.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut F::Resource> {
        self.graph
            .node_weight_mut(handle.index)
            .filter(|node| node.epoch == handle.epoch)?
            .resource
            .as_mut()
    }

    /// Live handles registered with `handle` as one of their parents.
    pub fn dependents(&self, handle: Handle) -> Vec<Handle> {
        if self.resolve(handle).is_none() {
            return Vec::new();
        }

        let mut dependents: Vec<_> = self
            .graph
            .neighbors_directed(handle.index, Direction::Outgoing)
            .filter(|&index| !self.graph[index].is_destroyed())
            .map(|index| self.handle_at(index))
            .collect();
        dependents.sort_unstable();
        dependents.dedup();
        dependents
    }

    fn resolve_parents(&self, sides: [Option<Handle>; 2]) -> Result<[Option<NodeIndex>; 2], Handle> {
        let mut resolved = [None, None];
        for (slot, side) in resolved.iter_mut().zip(sides) {
            let Some(parent) = side else { continue };
            if self.resolve(parent).is_some_and(|node| node.bound) {
                tracing::debug!(%parent, "parent is bound to a slot, recording as absent");
            } else if self.is_live(parent) {
                *slot = Some(parent.index);
            } else if self.options.strict_parents {
                return Err(parent);
            } else {
                tracing::debug!(%parent, "parent is not live, recording as absent");
            }
        }
        Ok(resolved)
    }

    fn insert(&mut self, resource: F::Resource, parents: [Option<NodeIndex>; 2]) -> Handle {
        let epoch = self.epoch;
        self.epoch += 1;

        let index = self.graph.add_node(Node {
            epoch,
            resource: Some(resource),
            bound: false,
        });

        for (side, parent) in [Side::Left, Side::Right].into_iter().zip(parents) {
            if let Some(parent) = parent {
                self.graph.add_edge(parent, index, side);
            }
        }

        let handle = Handle::new(index, epoch);
        tracing::debug!(
            %handle,
            left = ?parents[0].map(|i| self.handle_at(i)),
            right = ?parents[1].map(|i| self.handle_at(i)),
            "registered"
        );
        handle
    }

    /// Takes ownership of an already allocated resource and records the
    /// handles it was derived from.
    ///
    /// Parents that are not live are recorded as absent. With
    /// [`Config::strict_parents`] they are rejected instead; the resource is
    /// then handed straight back to the factory and nothing is registered.
    pub fn register<P>(&mut self, resource: F::Resource, parents: P) -> Result<Handle, RegistryError>
    where
        P: Parents,
    {
        match self.resolve_parents(parents.sides()) {
            Ok(parents) => Ok(self.insert(resource, parents)),
            Err(parent) => {
                self.factory.free(resource);
                Err(RegistryError::StaleParent(parent))
            }
        }
    }

    /// Allocates through the factory and registers the result.
    ///
    /// If `alloc` fails nothing is registered. Parents are checked before
    /// allocating, so a strict-mode rejection never allocates at all.
    pub fn try_register_with<P, A, E>(&mut self, parents: P, alloc: A) -> Result<Handle, RegistryError>
    where
        P: Parents,
        A: FnOnce(&mut F) -> Result<F::Resource, E>,
        E: Into<anyhow::Error>,
    {
        let parents = self
            .resolve_parents(parents.sides())
            .map_err(RegistryError::StaleParent)?;

        let resource = alloc(&mut self.factory).map_err(|e| RegistryError::Allocation(e.into()))?;

        Ok(self.insert(resource, parents))
    }

    /// Frees the resource at `index` unless that already happened.
    fn release(&mut self, index: NodeIndex) -> bool {
        let Some(node) = self.graph.node_weight_mut(index) else {
            return false;
        };
        let epoch = node.epoch;
        let Some(resource) = node.resource.take() else {
            return false;
        };

        tracing::trace!(handle = %Handle::new(index, epoch), "freeing");
        self.factory.free(resource);
        true
    }

    /// Post-order walk over the live ancestors of `root`: the left closure,
    /// then the right closure, then the node itself. Destroyed nodes are
    /// skipped, which also stops the walk from freeing a shared ancestor twice.
    /// Bound ancestors belong to their slot and are skipped too.
    fn cascade(&mut self, root: NodeIndex) -> usize {
        let mut stack = vec![(root, false)];
        let mut freed = 0;

        while let Some((index, expanded)) = stack.pop() {
            match self.graph.node_weight(index) {
                Some(node) if node.bound && index != root => continue,
                Some(node) if !node.is_destroyed() => {}
                _ => continue,
            }

            if expanded {
                if self.release(index) {
                    freed += 1;
                }
                continue;
            }

            let [left, right] = self.parent_indices(index);
            stack.push((index, true));
            stack.extend(right.map(|index| (index, false)));
            stack.extend(left.map(|index| (index, false)));
        }

        freed
    }

    /// Frees `handle` and every live resource it was transitively derived
    /// from, each exactly once. Returns the number of resources freed.
    ///
    /// Unknown, swept and already destroyed handles are a no-op.
    pub fn destroy(&mut self, handle: Handle) -> usize {
        if !self.is_live(handle) {
            return 0;
        }

        let span = tracing::span!(Level::DEBUG, "destroy", %handle);
        let _enter = span.enter();

        let freed = self.cascade(handle.index);
        tracing::debug!(freed, "destroyed");

        if self.options.compaction == Compaction::Eager {
            self.compact();
        }

        freed
    }

    /// Destroys `handle` like [`destroy`](Self::destroy), then sweeps every
    /// destroyed node out of the registry.
    pub fn cleanup(&mut self, handle: Handle) -> usize {
        let freed = self.destroy(handle);
        self.compact();
        freed
    }

    /// Removes all destroyed nodes and returns how many were removed.
    ///
    /// A destroyed node only ever has destroyed parents, so the sweep never
    /// leaves a live node linked to something that is gone; live children of
    /// a swept parent simply lose that edge.
    pub fn compact(&mut self) -> usize {
        let destroyed: Vec<_> = self
            .graph
            .node_indices()
            .filter(|&index| self.graph[index].is_destroyed())
            .collect();

        for &index in &destroyed {
            self.graph.remove_node(index);
        }

        if !destroyed.is_empty() {
            tracing::debug!(removed = destroyed.len(), remaining = self.graph.node_count(), "compacted");
        }

        destroyed.len()
    }

    /// Binds `value` to `slot`, the copy-assign of the bridge.
    ///
    /// The value the slot held before is freed on its own; its ancestors are
    /// not touched. The temporaries `value` was derived from are destroyed,
    /// `value` is taken out of dependency tracking and the registry is
    /// compacted. From then on the bound value is recorded as an absent parent
    /// by later registrations, so no cascade can reach it while a slot holds
    /// it. Returns the number of resources freed.
    ///
    /// Fails without touching anything if `value` is not live or is already
    /// bound to a slot.
    pub fn assign(&mut self, slot: &mut Option<Handle>, value: Handle) -> Result<usize, RegistryError> {
        if *slot == Some(value) {
            return Ok(0);
        }

        match self.resolve(value) {
            Some(node) if node.is_destroyed() => return Err(RegistryError::StaleHandle(value)),
            Some(node) if node.bound => return Err(RegistryError::AlreadyBound(value)),
            Some(_) => {}
            None => return Err(RegistryError::StaleHandle(value)),
        }

        let span = tracing::span!(Level::DEBUG, "assign", %value);
        let _enter = span.enter();

        let mut freed = 0;
        if let Some(old) = *slot
            && self.is_live(old)
            && self.release(old.index)
        {
            freed += 1;
        }

        let [left, right] = self.parent_indices(value.index);
        for parent in [left, right].into_iter().flatten() {
            // A parent linked before it got bound belongs to its own slot.
            if !self.graph[parent].bound {
                freed += self.cascade(parent);
            }
        }

        let incoming: Vec<_> = self
            .graph
            .edges_directed(value.index, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();
        for edge in incoming {
            self.graph.remove_edge(edge);
        }
        self.graph[value.index].bound = true;

        tracing::debug!(freed, "bound to slot");
        self.compact();

        *slot = Some(value);
        Ok(freed)
    }

    /// Frees every live resource in registration order and empties the
    /// registry.
    pub fn release_all(&mut self) -> usize {
        let freed = self
            .handles()
            .into_iter()
            .filter(|&handle| self.release(handle.index))
            .count();

        self.graph.clear();
        tracing::debug!(freed, "released all resources");
        freed
    }
}

impl<F: ResourceFactory> Drop for Registry<F> {
    fn drop(&mut self) {
        self.release_all();
    }
}
