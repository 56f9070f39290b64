// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered work-node storage.
//!
//! Every logical entity owns one slot. A slot has two buffer entries, one
//! per buffered copy, held in two parallel arrays indexed identically. The
//! "alternate" of a node is the same slot in the other array, so the pairing
//! is an index computation and never a stored cycle.
//!
//! The update queues that both copies share live with the slot rather than
//! with either copy.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

use serde_json::Value;

use crate::element::{Child, Key, Props};
use crate::hooks::{CellQueue, StateCell};
use crate::lane::{Lane, Lanes};
use crate::update_queue::{SharedQueue, StateUpdate, UpdateQueue};

use super::flags::Flags;
use super::id::{Buffer, EntityId, NodeId};
use super::kind::NodeKind;

/// State owned by a node's behavior.
#[derive(Clone, Debug, Default)]
pub enum NodeState {
    /// Structural nodes carry no state.
    #[default]
    None,
    /// The root: the last rendered child description and the queue of
    /// descriptions rendered onto it.
    Root {
        /// Rendered child description.
        element: Child,
        /// Carried-over render requests.
        queue: UpdateQueue<Child, Child>,
    },
    /// A stateful component's object state.
    Stateful {
        /// Current state.
        state: Value,
        /// Carried-over state updates.
        queue: UpdateQueue<Value, StateUpdate>,
    },
    /// A function component's state cells, in call order.
    Cells(Vec<StateCell>),
}

/// Pending-update queues shared by both copies of an entity.
#[derive(Clone, Debug, Default)]
pub(crate) enum SlotQueues {
    #[default]
    None,
    Root(SharedQueue<Child>),
    Stateful(SharedQueue<StateUpdate>),
    Cells(Vec<CellQueue>),
}

impl SlotQueues {
    fn flush_interleaved(&mut self) -> bool {
        match self {
            Self::None => false,
            Self::Root(q) => q.flush_interleaved(),
            Self::Stateful(q) => q.flush_interleaved(),
            Self::Cells(cells) => cells
                .iter_mut()
                .fold(false, |moved, c| c.shared.flush_interleaved() | moved),
        }
    }

    fn has_interleaved(&self) -> bool {
        match self {
            Self::None => false,
            Self::Root(q) => !q.interleaved().is_empty(),
            Self::Stateful(q) => !q.interleaved().is_empty(),
            Self::Cells(cells) => cells.iter().any(|c| !c.shared.interleaved().is_empty()),
        }
    }
}

/// One buffered copy of a logical entity.
#[derive(Clone, Debug)]
pub struct WorkNode {
    pub(crate) kind: NodeKind,
    pub(crate) key: Option<Key>,
    pub(crate) pending_props: Props,
    pub(crate) memoized_props: Props,
    pub(crate) state: NodeState,
    pub(crate) parent: Option<NodeId>,
    pub(crate) child: Option<NodeId>,
    pub(crate) sibling: Option<NodeId>,
    pub(crate) index: u32,
    pub(crate) lanes: Lanes,
    pub(crate) child_lanes: Lanes,
    pub(crate) flags: Flags,
    pub(crate) subtree_flags: Flags,
    pub(crate) deletions: Vec<NodeId>,
}

impl WorkNode {
    fn new(kind: NodeKind, key: Option<Key>, pending_props: Props, state: NodeState) -> Self {
        Self {
            kind,
            key,
            pending_props,
            memoized_props: Props::None,
            state,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            lanes: Lanes::NONE,
            child_lanes: Lanes::NONE,
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            deletions: Vec::new(),
        }
    }

    /// Node kind and behavior.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Sibling key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Props of the last completed render of this copy.
    #[must_use]
    pub fn memoized_props(&self) -> &Props {
        &self.memoized_props
    }

    /// Behavior-owned state.
    #[must_use]
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Parent copy (non-owning).
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// First child.
    #[must_use]
    pub fn child(&self) -> Option<NodeId> {
        self.child
    }

    /// Next sibling.
    #[must_use]
    pub fn sibling(&self) -> Option<NodeId> {
        self.sibling
    }

    /// Position among siblings.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Own pending lanes.
    #[must_use]
    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    /// Pending lanes somewhere below this node.
    #[must_use]
    pub fn child_lanes(&self) -> Lanes {
        self.child_lanes
    }

    /// Effect flags from the last walk over this copy.
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Union of descendant effect flags.
    #[must_use]
    pub fn subtree_flags(&self) -> Flags {
        self.subtree_flags
    }

    /// Children scheduled for removal.
    #[must_use]
    pub fn deletions(&self) -> &[NodeId] {
        &self.deletions
    }

    /// Text content for text nodes.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match (&self.kind, &self.memoized_props) {
            (NodeKind::Text, Props::Text(t)) => Some(t),
            _ => None,
        }
    }

    /// Host attributes for host element nodes.
    #[must_use]
    pub fn attrs(&self) -> Option<&Value> {
        match (&self.kind, &self.memoized_props) {
            (NodeKind::Host(_), Props::Element(p)) => Some(&p.attrs),
            _ => None,
        }
    }
}

/// Arena of double-buffered work nodes.
///
/// Nodes are addressed by [`NodeId`]. Removed entities are recycled via a
/// free list, and generation counters let [`EntityId`] handles to removed
/// entities be detected.
#[derive(Clone, Debug)]
pub struct WorkTree {
    // -- Buffers --
    pub(crate) nodes: [Vec<Option<WorkNode>>; 2],

    // -- Per-slot --
    pub(crate) generation: Vec<u32>,
    pub(crate) live: Vec<bool>,
    pub(crate) queues: Vec<SlotQueues>,

    // -- Allocation --
    pub(crate) free_list: Vec<u32>,
    pub(crate) allocations: u64,

    // -- Roots and bookkeeping --
    pub(crate) current_root: NodeId,
    pub(crate) interleaved_slots: Vec<u32>,
}

impl Default for WorkTree {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkTree {
    /// Creates a tree holding only the root, committed with no children.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: [Vec::new(), Vec::new()],
            generation: Vec::new(),
            live: Vec::new(),
            queues: Vec::new(),
            free_list: Vec::new(),
            allocations: 0,
            current_root: NodeId::new(0, Buffer::A),
            interleaved_slots: Vec::new(),
        };
        let root = tree.create(
            NodeKind::Root,
            None,
            Props::None,
            NodeState::Root {
                element: Child::Empty,
                queue: UpdateQueue::new(Child::Empty),
            },
        );
        tree.queues[root.slot as usize] = SlotQueues::Root(SharedQueue::new());
        tree.current_root = root;
        tree
    }

    // -- Allocation --

    /// Allocates a new entity with one copy in the first buffer.
    pub(crate) fn create(
        &mut self,
        kind: NodeKind,
        key: Option<Key>,
        pending_props: Props,
        state: NodeState,
    ) -> NodeId {
        let node = WorkNode::new(kind, key, pending_props, state);
        let slot = if let Some(slot) = self.free_list.pop() {
            let i = slot as usize;
            self.live[i] = true;
            self.queues[i] = SlotQueues::None;
            self.nodes[Buffer::A.index()][i] = Some(node);
            slot
        } else {
            let slot = self.generation.len() as u32;
            self.generation.push(0);
            self.live.push(true);
            self.queues.push(SlotQueues::None);
            self.nodes[Buffer::A.index()].push(Some(node));
            self.nodes[Buffer::B.index()].push(None);
            slot
        };
        self.allocations += 1;
        NodeId::new(slot, Buffer::A)
    }

    /// Frees an entity: both copies and its shared queues.
    pub(crate) fn free_entity(&mut self, slot: u32) {
        let i = slot as usize;
        if !self.live.get(i).copied().unwrap_or(false) {
            return;
        }
        self.nodes[0][i] = None;
        self.nodes[1][i] = None;
        self.queues[i] = SlotQueues::None;
        self.live[i] = false;
        self.generation[i] = self.generation[i].wrapping_add(1);
        self.free_list.push(slot);
    }

    /// Frees `id`'s entity and every entity reachable through its child
    /// links.
    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        let mut stack = Vec::from([id]);
        while let Some(next) = stack.pop() {
            stack.extend(self.children(next));
            self.free_entity(next.slot);
        }
    }

    /// Number of buffer entries ever allocated.
    ///
    /// A tree that has held `n` entities over its lifetime never exceeds
    /// `2 * n`, however many renders it goes through.
    #[must_use]
    pub const fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }

    // -- Access --

    /// Returns the node at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not name an allocated buffer entry.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &WorkNode {
        match self.try_get(id) {
            Some(node) => node,
            None => panic!("stale NodeId {id:?}"),
        }
    }

    /// Mutable access to the node at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not name an allocated buffer entry.
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut WorkNode {
        match self.nodes[id.buffer.index()]
            .get_mut(id.slot as usize)
            .and_then(Option::as_mut)
        {
            Some(node) => node,
            None => panic!("stale NodeId {id:?}"),
        }
    }

    /// Returns the node at `id`, or `None` if that entry is empty.
    #[must_use]
    pub fn try_get(&self, id: NodeId) -> Option<&WorkNode> {
        self.nodes[id.buffer.index()]
            .get(id.slot as usize)
            .and_then(Option::as_ref)
    }

    /// The committed root.
    #[must_use]
    pub const fn current_root(&self) -> NodeId {
        self.current_root
    }

    /// Stable handle of the entity `id` belongs to.
    #[must_use]
    pub fn entity(&self, id: NodeId) -> EntityId {
        EntityId {
            idx: id.slot,
            generation: self.generation[id.slot as usize],
        }
    }

    /// Whether `entity` still names a live entity.
    #[must_use]
    pub fn is_live(&self, entity: EntityId) -> bool {
        let i = entity.idx as usize;
        self.live.get(i).copied().unwrap_or(false) && self.generation[i] == entity.generation
    }

    /// Some allocated copy of `entity`.
    #[must_use]
    pub fn any_copy(&self, entity: EntityId) -> Option<NodeId> {
        if !self.is_live(entity) {
            return None;
        }
        [Buffer::A, Buffer::B]
            .into_iter()
            .map(|b| NodeId::new(entity.idx, b))
            .find(|id| self.try_get(*id).is_some())
    }

    /// Iterates the children of `id`, in sibling order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.try_get(id).and_then(|n| n.child),
        }
    }

    /// Every node below `root` (inclusive) in pre-order, with its depth.
    #[must_use]
    pub fn preorder(&self, root: NodeId) -> Vec<(NodeId, u32)> {
        let mut out = Vec::new();
        let mut stack = Vec::from([(root, 0_u32)]);
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            let mut kids: Vec<_> = self.children(id).collect();
            kids.reverse();
            stack.extend(kids.into_iter().map(|c| (c, depth + 1)));
        }
        out
    }

    // -- Double buffering --

    /// Prepares the other copy of `current` for a walk.
    ///
    /// The first call for an entity allocates its alternate; later calls
    /// reuse it, clearing per-walk effects and refreshing the fields carried
    /// from the committed copy. The parent link is left for the caller.
    pub(crate) fn clone_for_work(&mut self, current: NodeId, pending_props: Props) -> NodeId {
        let wip = current.alternate();
        let i = current.slot as usize;
        let [a, b] = &mut self.nodes;
        let (cur, alt) = match current.buffer {
            Buffer::A => (&a[i], &mut b[i]),
            Buffer::B => (&b[i], &mut a[i]),
        };
        let Some(cur) = cur.as_ref() else {
            panic!("stale NodeId {current:?}");
        };

        let allocated = alt.is_none();
        let node = alt.get_or_insert_with(|| {
            WorkNode::new(cur.kind.clone(), cur.key.clone(), Props::None, NodeState::None)
        });
        node.pending_props = pending_props;
        node.flags = Flags::empty();
        node.subtree_flags = Flags::empty();
        node.deletions.clear();

        node.kind = cur.kind.clone();
        node.lanes = cur.lanes;
        node.child_lanes = cur.child_lanes;
        node.child = cur.child;
        node.memoized_props = cur.memoized_props.clone();
        node.state = cur.state.clone();
        node.sibling = cur.sibling;
        node.index = cur.index;

        if allocated {
            self.allocations += 1;
        }
        wip
    }

    /// Resets a node that has to be walked again within the same pass.
    ///
    /// Mirrors what [`clone_for_work`](Self::clone_for_work) would produce
    /// for `render_lanes`, keeping a pending placement and leaving sibling,
    /// parent and index untouched.
    pub(crate) fn reset_for_second_pass(&mut self, wip: NodeId, render_lanes: Lanes) {
        let current = self.try_get(wip.alternate()).map(|c| {
            (
                c.lanes,
                c.child_lanes,
                c.child,
                c.memoized_props.clone(),
                c.state.clone(),
            )
        });
        let node = self.get_mut(wip);
        node.flags &= Flags::PLACEMENT;
        node.subtree_flags = Flags::empty();
        node.deletions.clear();
        match current {
            Some((lanes, child_lanes, child, props, state)) => {
                node.lanes = lanes;
                node.child_lanes = child_lanes;
                node.child = child;
                node.memoized_props = props;
                node.state = state;
            }
            None => {
                node.lanes = render_lanes;
                node.child_lanes = Lanes::NONE;
                node.child = None;
                node.memoized_props = Props::None;
                node.state = NodeState::None;
            }
        }
    }

    // -- Queues --

    pub(crate) fn queues(&self, slot: u32) -> &SlotQueues {
        &self.queues[slot as usize]
    }

    pub(crate) fn queues_mut(&mut self, slot: u32) -> &mut SlotQueues {
        &mut self.queues[slot as usize]
    }

    pub(crate) fn take_queues(&mut self, slot: u32) -> SlotQueues {
        mem::take(&mut self.queues[slot as usize])
    }

    pub(crate) fn put_queues(&mut self, slot: u32, queues: SlotQueues) {
        self.queues[slot as usize] = queues;
    }

    /// Records that `slot` has updates waiting in its interleaved lists.
    pub(crate) fn note_interleaved(&mut self, slot: u32) {
        if !self.interleaved_slots.contains(&slot) {
            self.interleaved_slots.push(slot);
        }
    }

    /// Moves every interleaved update into its pending list.
    pub(crate) fn flush_interleaved(&mut self) {
        for slot in mem::take(&mut self.interleaved_slots) {
            if let Some(q) = self.queues.get_mut(slot as usize) {
                q.flush_interleaved();
            }
        }
    }

    /// Whether any queue still holds interleaved updates.
    pub(crate) fn has_interleaved(&self) -> bool {
        self.interleaved_slots
            .iter()
            .any(|s| self.queues.get(*s as usize).is_some_and(SlotQueues::has_interleaved))
    }

    /// Marks `lane` on both copies of `entity` and on the `child_lanes` of
    /// every ancestor. Returns `false` if the entity is gone.
    pub(crate) fn mark_update_lane(&mut self, entity: EntityId, lane: Lane) -> bool {
        let Some(start) = self.any_copy(entity) else {
            return false;
        };
        for id in [start, start.alternate()] {
            if let Some(n) = self.nodes[id.buffer.index()][id.slot as usize].as_mut() {
                n.lanes |= lane;
            }
        }
        let mut parent = self.get(start).parent;
        while let Some(p) = parent {
            for id in [p, p.alternate()] {
                if let Some(n) = self.nodes[id.buffer.index()][id.slot as usize].as_mut() {
                    n.child_lanes |= lane;
                }
            }
            parent = self.try_get(p).and_then(|n| n.parent);
        }
        true
    }

    // -- Snapshots --

    /// Structural snapshot of the committed tree.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        let nodes = self
            .preorder(self.current_root)
            .into_iter()
            .map(|(id, depth)| {
                let n = self.get(id);
                NodeSnapshot {
                    id,
                    depth,
                    kind: String::from(n.kind.name()),
                    key: n.key.clone(),
                    index: n.index,
                    parent: n.parent,
                    sibling: n.sibling,
                    props: n.memoized_props.identity(),
                    pending_props: n.pending_props.identity(),
                    state: format!("{:?}", n.state),
                    lanes: n.lanes,
                    child_lanes: n.child_lanes,
                    flags: n.flags,
                    subtree_flags: n.subtree_flags,
                    deletions: n.deletions.clone(),
                }
            })
            .collect();
        TreeSnapshot {
            root: self.current_root,
            nodes,
        }
    }
}

/// Iterator over a node's children.
#[derive(Clone, Debug)]
pub struct Children<'a> {
    tree: &'a WorkTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.try_get(id).and_then(|n| n.sibling);
        Some(id)
    }
}

/// Everything observable about one committed node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSnapshot {
    /// Node handle.
    pub id: NodeId,
    /// Depth below the root.
    pub depth: u32,
    /// Kind name.
    pub kind: String,
    /// Sibling key.
    pub key: Option<Key>,
    /// Position among siblings.
    pub index: u32,
    /// Parent link.
    pub parent: Option<NodeId>,
    /// Sibling link.
    pub sibling: Option<NodeId>,
    /// Identity of the memoized props allocation.
    pub props: usize,
    /// Identity of the pending props allocation.
    pub pending_props: usize,
    /// Rendered state.
    pub state: String,
    /// Own lanes.
    pub lanes: Lanes,
    /// Descendant lanes.
    pub child_lanes: Lanes,
    /// Effect flags.
    pub flags: Flags,
    /// Descendant effect flags.
    pub subtree_flags: Flags,
    /// Scheduled deletions.
    pub deletions: Vec<NodeId>,
}

/// Structural snapshot of a committed tree, comparable with `==`.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeSnapshot {
    /// Committed root.
    pub root: NodeId,
    /// Nodes in pre-order.
    pub nodes: Vec<NodeSnapshot>,
}
