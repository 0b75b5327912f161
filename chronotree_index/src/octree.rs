// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The octree: insertion with rebalancing, point and range queries, and the
//! hooks the store uses to rebuild a tree from disk.

use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use crate::error::InsertError;
use crate::ids::{IdAllocator, RecordId};
use crate::occupancy::Occupancy;
use crate::queue::Queue;
use crate::types::{Cube, OCTANT_COUNT, Point3};

/// Generational handle to a node in an [`Octree`].
///
/// Handles are only meaningful for the tree that produced them and become
/// stale when the node is discarded (by [`Octree::unify`], [`Octree::split`]
/// overwriting a slot, or [`Octree::reset`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey(u32, u32);

impl NodeKey {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Node keys store 32-bit arena indices."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// An indexed point: an opaque payload id placed at a position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Leaf {
    /// Opaque payload id; the index never looks inside the payload.
    pub leaf_data: u64,
    /// Where the payload sits in (x, y, time).
    pub position: Point3,
    /// The leaf's own record id.
    pub id: RecordId,
}

/// Tuning knobs for an [`Octree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OctreeConfig {
    /// A leaf-bearing node splits once it would hold more than this many leaves.
    pub max_leaves_per_node: usize,
    /// Deepest level a split may create. The root is depth `0`.
    pub maximum_depth: u32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_leaves_per_node: 10,
            maximum_depth: 24,
        }
    }
}

impl OctreeConfig {
    /// Config with the given leaf capacity and the default depth limit.
    pub fn with_max_leaves(max_leaves_per_node: usize) -> Self {
        Self {
            max_leaves_per_node,
            ..Self::default()
        }
    }

    fn capacity(&self) -> usize {
        self.max_leaves_per_node.max(1)
    }
}

#[derive(Clone, Debug)]
struct Node {
    cube: Cube,
    id: RecordId,
    depth: u32,
    parent: Option<NodeKey>,
    children: [Option<NodeKey>; OCTANT_COUNT],
    leaves: Vec<Leaf>,
}

impl Node {
    fn new(cube: Cube, id: RecordId, depth: u32, parent: Option<NodeKey>) -> Self {
        Self {
            cube,
            id,
            depth,
            parent,
            children: [None; OCTANT_COUNT],
            leaves: Vec::new(),
        }
    }

    fn is_leaf_bearing(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    fn occupancy(&self) -> Occupancy {
        Occupancy::from_slots(|slot| self.children[slot].is_some())
    }
}

/// Read-only view of one node.
#[derive(Copy, Clone, Debug)]
pub struct NodeView<'a> {
    key: NodeKey,
    node: &'a Node,
}

impl<'a> NodeView<'a> {
    /// Handle of this node.
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Persisted record id.
    pub fn id(&self) -> RecordId {
        self.node.id
    }

    /// Bounding cube.
    pub fn cube(&self) -> Cube {
        self.node.cube
    }

    /// Depth below the root.
    pub fn depth(&self) -> u32 {
        self.node.depth
    }

    /// Parent handle; `None` for the root.
    pub fn parent(&self) -> Option<NodeKey> {
        self.node.parent
    }

    /// Child at `slot`, if populated.
    pub fn child(&self, slot: usize) -> Option<NodeKey> {
        self.node.children.get(slot).copied().flatten()
    }

    /// Populated `(slot, child)` pairs in slot order.
    pub fn children(self) -> impl Iterator<Item = (usize, NodeKey)> + 'a {
        self.node
            .children
            .iter()
            .enumerate()
            .filter_map(|(slot, child)| child.map(|c| (slot, c)))
    }

    /// Leaves stored directly on this node (empty for internal nodes).
    pub fn leaves(&self) -> &'a [Leaf] {
        &self.node.leaves
    }

    /// Child occupancy bitmask.
    pub fn occupancy(&self) -> Occupancy {
        self.node.occupancy()
    }

    /// True if the node has no children and may hold leaves.
    pub fn is_leaf_bearing(&self) -> bool {
        self.node.is_leaf_bearing()
    }
}

/// Spatiotemporal octree over (x, y, time).
///
/// Nodes live in an arena and refer to each other by [`NodeKey`]; the parent
/// link is navigational only. A node either holds leaves or has children,
/// never both.
pub struct Octree {
    config: OctreeConfig,
    nodes: Vec<Option<Node>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeKey,
    partial: bool,
}

impl core::fmt::Debug for Octree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Octree")
            .field("config", &self.config)
            .field("bounds", &self.bounds())
            .field("nodes_alive", &self.node_count())
            .field("leaves", &self.leaf_count())
            .field("free_list", &self.free_list.len())
            .field("partial", &self.partial)
            .finish_non_exhaustive()
    }
}

impl Octree {
    /// Create an empty tree over `bounds`; the root id comes from `ids`.
    pub fn new(bounds: Cube, config: OctreeConfig, ids: &mut impl IdAllocator) -> Self {
        Self::with_root_id(bounds, config, ids.next_id())
    }

    /// Create an empty tree whose root carries a known id.
    pub fn with_root_id(bounds: Cube, config: OctreeConfig, root_id: RecordId) -> Self {
        Self {
            config,
            nodes: vec![Some(Node::new(bounds, root_id, 0, None))],
            generations: vec![1],
            free_list: Vec::new(),
            root: NodeKey::new(0, 1),
            partial: false,
        }
    }

    /// Discard every node and start over with a single empty root.
    ///
    /// All outstanding [`NodeKey`]s become stale.
    pub fn reset(&mut self, bounds: Cube, root_id: RecordId) {
        for generation in &mut self.generations {
            *generation = generation.saturating_add(1);
        }
        self.nodes.clear();
        self.free_list.clear();
        self.partial = false;
        self.root = self.alloc(Node::new(bounds, root_id, 0, None));
    }

    /// Handle of the root node.
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// The root bounding cube.
    pub fn bounds(&self) -> Cube {
        self.get(self.root).map(|n| n.cube).unwrap_or_default()
    }

    /// Active configuration.
    pub fn config(&self) -> OctreeConfig {
        self.config
    }

    /// Re-assign the root's persisted id.
    pub fn set_root_id(&mut self, id: RecordId) {
        if let Some(root) = self.get_mut(self.root) {
            root.id = id;
        }
    }

    /// True if this tree was rebuilt from only part of a store.
    ///
    /// Partial trees answer queries inside the region they were restored for,
    /// but must not be written back over the full tree.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Flag the tree as a partial reconstruction.
    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    /// Whether `key` still refers to a live node.
    pub fn is_alive(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// View a live node.
    pub fn node(&self, key: NodeKey) -> Option<NodeView<'_>> {
        self.get(key).map(|node| NodeView { key, node })
    }

    /// Bit `i` set iff child slot `i` of `key` is populated. `0` for stale keys.
    pub fn encode_child_occupancy(&self, key: NodeKey) -> u8 {
        self.get(key).map(|n| n.occupancy().bits()).unwrap_or(0)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Number of stored leaves.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().flatten().map(|n| n.leaves.len()).sum()
    }

    /// Insert `leaf_data` at `position`, splitting full nodes as needed.
    ///
    /// The leaf and any nodes created on the way get fresh ids from `ids`.
    /// Returns the node that now holds the leaf.
    ///
    /// Rejections leave the tree untouched: a position outside the root cube
    /// is [`InsertError::OutOfBounds`], and a split that would have to go past
    /// [`OctreeConfig::maximum_depth`] is [`InsertError::DepthExceeded`]. The
    /// latter happens when more than `max_leaves_per_node` leaves share (nearly)
    /// the same position.
    pub fn add(
        &mut self,
        leaf_data: u64,
        position: Point3,
        ids: &mut impl IdAllocator,
    ) -> Result<NodeKey, InsertError> {
        if !self.bounds().contains(position) {
            return Err(InsertError::OutOfBounds { position });
        }

        let target = self.descend(position);
        let node = self.node_ref(target);
        if node.is_leaf_bearing() && node.leaves.len() >= self.config.capacity() {
            let mut positions: Vec<Point3> = node.leaves.iter().map(|l| l.position).collect();
            positions.push(position);
            if let Err(depth) = self.check_split_depth(node.cube, node.depth, &positions) {
                log::warn!(
                    "rejecting leaf {leaf_data} at {position:?}: split needs depth {depth}, limit is {}",
                    self.config.maximum_depth
                );
                return Err(InsertError::DepthExceeded {
                    depth,
                    limit: self.config.maximum_depth,
                });
            }
        }

        let leaf = Leaf {
            leaf_data,
            position,
            id: ids.next_id(),
        };
        Ok(self.place(target, leaf, ids))
    }

    /// Payload ids held by the leaf-bearing node that would contain `point`.
    ///
    /// Empty if `point` is outside the root or the path ends at an empty slot.
    pub fn elements_at(&self, point: Point3) -> Vec<u64> {
        if !self.bounds().contains(point) {
            return Vec::new();
        }
        let mut key = self.root;
        loop {
            let node = self.node_ref(key);
            if node.is_leaf_bearing() {
                return node.leaves.iter().map(|l| l.leaf_data).collect();
            }
            let next = node
                .cube
                .octant_of(point)
                .and_then(|slot| node.children[slot]);
            match next {
                Some(child) => key = child,
                None => return Vec::new(),
            }
        }
    }

    /// Payload ids of every leaf positioned inside `cube`. Order is unspecified.
    pub fn elements_in(&self, cube: &Cube) -> Vec<u64> {
        let mut out = Vec::new();
        self.visit_leaves_in(cube, |leaf| out.push(leaf.leaf_data));
        out
    }

    /// Every leaf positioned inside `cube`. Order is unspecified.
    pub fn leaves_in(&self, cube: &Cube) -> Vec<Leaf> {
        let mut out = Vec::new();
        self.visit_leaves_in(cube, |leaf| out.push(*leaf));
        out
    }

    /// Create (or overwrite) the child of `parent` at `slot` with a known id.
    ///
    /// Used when rebuilding a tree from storage. Overwriting discards the old
    /// subtree. Any leaves still on `parent` are dropped, since a node with
    /// children holds none.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is stale or `slot >= OCTANT_COUNT`.
    pub fn split(&mut self, parent: NodeKey, id: RecordId, slot: usize) -> NodeKey {
        assert!(slot < OCTANT_COUNT, "octant slot {slot} out of range");
        let (cube, depth, old) = {
            let p = self.node_mut(parent);
            p.leaves.clear();
            (p.cube.octant(slot), p.depth + 1, p.children[slot].take())
        };
        if let Some(old) = old {
            self.free_subtree(old);
        }
        let child = self.alloc(Node::new(cube, id, depth, Some(parent)));
        self.node_mut(parent).children[slot] = Some(child);
        child
    }

    /// Append a leaf to a leaf-bearing node without splitting.
    ///
    /// Used when rebuilding a tree from storage, where the node's shape is
    /// already decided. Returns `false` if `key` is stale or has children.
    pub fn push_leaf(&mut self, key: NodeKey, leaf: Leaf) -> bool {
        match self.get_mut(key) {
            Some(node) if node.is_leaf_bearing() => {
                node.leaves.push(leaf);
                true
            }
            _ => false,
        }
    }

    /// Remove the leaf with record id `leaf_id` stored at `position`.
    ///
    /// Nodes left empty stay in place until [`Octree::unify`] runs.
    pub fn remove_leaf(&mut self, leaf_id: RecordId, position: Point3) -> bool {
        if !self.bounds().contains(position) {
            return false;
        }
        let key = self.descend(position);
        let node = self.node_mut(key);
        let before = node.leaves.len();
        node.leaves.retain(|l| l.id != leaf_id);
        node.leaves.len() != before
    }

    /// Collapse internal nodes whose children are all empty leaf-bearing nodes.
    ///
    /// Runs bottom-up, so chains of empty nodes fold in one pass. Returns the
    /// number of nodes discarded.
    pub fn unify(&mut self) -> usize {
        self.unify_node(self.root)
    }

    /// Breadth-first traversal starting at the root, slot order within a node.
    ///
    /// Depth never decreases along the traversal.
    pub fn breadth_first(&self) -> BreadthFirst<'_> {
        let mut queue = Queue::new();
        queue.push(self.root);
        BreadthFirst { tree: self, queue }
    }

    /// Check structural invariants; returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        for (idx, slot) in self.nodes.iter().enumerate() {
            let Some(node) = slot else { continue };
            let key = NodeKey::new(idx, self.generations[idx]);
            if !node.is_leaf_bearing() && !node.leaves.is_empty() {
                return Err("internal node holds leaves");
            }
            if node.leaves.len() > self.config.capacity() {
                return Err("leaf-bearing node over capacity");
            }
            let occupancy = node.occupancy();
            for slot in 0..OCTANT_COUNT {
                if occupancy.has(slot) != node.children[slot].is_some() {
                    return Err("occupancy disagrees with child slots");
                }
                let Some(child) = node.children[slot] else {
                    continue;
                };
                let Some(c) = self.get(child) else {
                    return Err("child slot points at a dead node");
                };
                if c.parent != Some(key) {
                    return Err("child does not point back at its parent");
                }
                if c.depth != node.depth + 1 {
                    return Err("child depth is not parent depth + 1");
                }
                if c.cube != node.cube.octant(slot) {
                    return Err("child cube does not match its octant");
                }
            }
        }
        Ok(())
    }

    fn visit_leaves_in(&self, cube: &Cube, mut f: impl FnMut(&Leaf)) {
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            let Some(node) = self.get(key) else { continue };
            if !cube.intersects(&node.cube) {
                continue;
            }
            if node.is_leaf_bearing() {
                for leaf in node.leaves.iter().filter(|l| cube.contains(l.position)) {
                    f(leaf);
                }
            } else {
                stack.extend(node.children.iter().flatten());
            }
        }
    }

    /// Walk internal nodes towards `position` and return the node insertion
    /// should start from: either a leaf-bearing node, or an internal node
    /// whose matching slot is still empty.
    fn descend(&self, position: Point3) -> NodeKey {
        let mut key = self.root;
        loop {
            let node = self.node_ref(key);
            if node.is_leaf_bearing() {
                return key;
            }
            match node
                .cube
                .octant_of(position)
                .and_then(|slot| node.children[slot])
            {
                Some(child) => key = child,
                None => return key,
            }
        }
    }

    /// Simulate the cascade of splits a full node would go through and report
    /// the depth that would be exceeded, if any.
    fn check_split_depth(&self, cube: Cube, depth: u32, positions: &[Point3]) -> Result<(), u32> {
        let child_depth = depth + 1;
        if child_depth > self.config.maximum_depth {
            return Err(child_depth);
        }
        let mut groups: [Vec<Point3>; OCTANT_COUNT] = Default::default();
        for &p in positions {
            if let Some(slot) = cube.octant_of(p) {
                groups[slot].push(p);
            }
        }
        for (slot, group) in groups.iter().enumerate() {
            if group.len() > self.config.capacity() {
                self.check_split_depth(cube.octant(slot), child_depth, group)?;
            }
        }
        Ok(())
    }

    fn place(&mut self, key: NodeKey, leaf: Leaf, ids: &mut impl IdAllocator) -> NodeKey {
        let capacity = self.config.capacity();
        let node = self.node_mut(key);
        if !node.is_leaf_bearing() {
            return self.place_in_child(key, leaf, ids);
        }
        if node.leaves.len() < capacity {
            node.leaves.push(leaf);
            return key;
        }

        // Demote to an internal node: existing leaves first, then the new one,
        // so the last placement is where the new leaf ended up.
        let mut pending = mem::take(&mut node.leaves);
        pending.push(leaf);
        let mut placed = key;
        for leaf in pending {
            placed = self.place_in_child(key, leaf, ids);
        }
        placed
    }

    fn place_in_child(&mut self, parent: NodeKey, leaf: Leaf, ids: &mut impl IdAllocator) -> NodeKey {
        let (cube, depth, slot) = {
            let p = self.node_ref(parent);
            (p.cube, p.depth, p.cube.octant_of(leaf.position))
        };
        let Some(slot) = slot else {
            log::warn!(
                "dropping leaf {} at {:?}: outside node {:?}",
                leaf.id,
                leaf.position,
                cube
            );
            return parent;
        };
        let child = match self.node_ref(parent).children[slot] {
            Some(child) => child,
            None => {
                if depth + 1 > self.config.maximum_depth {
                    log::warn!("node depth {} exceeds limit {}", depth + 1, self.config.maximum_depth);
                }
                let child = self.alloc(Node::new(
                    cube.octant(slot),
                    ids.next_id(),
                    depth + 1,
                    Some(parent),
                ));
                self.node_mut(parent).children[slot] = Some(child);
                child
            }
        };
        self.place(child, leaf, ids)
    }

    fn unify_node(&mut self, key: NodeKey) -> usize {
        let children: Vec<NodeKey> = self.node_ref(key).children.iter().flatten().copied().collect();
        if children.is_empty() {
            return 0;
        }
        let mut freed = 0;
        for &child in &children {
            freed += self.unify_node(child);
        }
        let collapsible = children.iter().all(|&c| {
            let n = self.node_ref(c);
            n.is_leaf_bearing() && n.leaves.is_empty()
        });
        if collapsible {
            self.node_mut(key).children = [None; OCTANT_COUNT];
            for child in children {
                freed += self.free_subtree(child);
            }
        }
        freed
    }

    fn alloc(&mut self, node: Node) -> NodeKey {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(node);
            NodeKey::new(idx, generation)
        } else {
            let idx = self.nodes.len();
            self.nodes.push(Some(node));
            if self.generations.len() <= idx {
                self.generations.push(1);
            }
            NodeKey::new(idx, self.generations[idx])
        }
    }

    fn free_subtree(&mut self, key: NodeKey) -> usize {
        let mut freed = 0;
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key.idx()).and_then(Option::take) else {
                continue;
            };
            stack.extend(node.children.iter().flatten());
            self.free_list.push(key.idx());
            freed += 1;
        }
        freed
    }

    fn get(&self, key: NodeKey) -> Option<&Node> {
        if *self.generations.get(key.idx())? != key.1 {
            return None;
        }
        self.nodes.get(key.idx())?.as_ref()
    }

    fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        if *self.generations.get(key.idx())? != key.1 {
            return None;
        }
        self.nodes.get_mut(key.idx())?.as_mut()
    }

    /// # Panics
    ///
    /// Panics if `key` is stale. Internal callers only hold live keys.
    fn node_ref(&self, key: NodeKey) -> &Node {
        self.get(key).expect("stale node key")
    }

    fn node_mut(&mut self, key: NodeKey) -> &mut Node {
        self.get_mut(key).expect("stale node key")
    }
}

/// Breadth-first iterator returned by [`Octree::breadth_first`].
#[derive(Debug)]
pub struct BreadthFirst<'a> {
    tree: &'a Octree,
    queue: Queue<NodeKey>,
}

impl<'a> Iterator for BreadthFirst<'a> {
    type Item = NodeView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.queue.pop()?;
            let Some(view) = self.tree.node(key) else {
                continue;
            };
            self.queue.extend(view.children().map(|(_, child)| child));
            return Some(view);
        }
    }
}
