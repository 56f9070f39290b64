// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interruptible depth-first walk that builds the work-in-progress tree.
//!
//! A walk is a sequence of units of work. Each unit begins one node
//! (processing its updates, rendering it, diffing its children) and, when
//! the node has no children left to visit, completes it and its finished
//! ancestors on the way back up. The walk may stop between any two units.
//!
//! Nothing reachable from the committed root is written while walking.
//! Queue drains and last-rendered cell values are recorded in the
//! [`WalkContext`] and applied at commit.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::mem;

use hashbrown::HashMap;
use serde_json::Value;

use crate::element::{Child, Component, ElementProps, Props, StatefulComponent};
use crate::error::WalkError;
use crate::hooks::{CellAction, CellQueue, CellReducer, HookOutcome, RenderRequest, render_function};
use crate::host::{HostKind, Mutation};
use crate::lane::{Lane, Lanes};
use crate::log::trace;
use crate::node::{CellHandle, EntityId, Flags, NodeId, NodeKind, NodeState, SlotQueues, WorkTree};
use crate::reconcile::ChildReconciler;
use crate::trace::{BailoutEvent, Tracer, WalkSummaryBuilder};
use crate::update_queue::{SharedQueue, StateUpdate, UpdateQueue, rebase};

/// Which queue of a slot a drain applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum QueueSel {
    Node,
    Cell(u32),
}

/// Everything a walk accumulates between its start and its commit or
/// abandonment.
#[derive(Debug)]
pub(crate) struct WalkContext {
    pub(crate) index: u64,
    pub(crate) render_lanes: Lanes,
    pub(crate) root: NodeId,
    pub(crate) next: Option<NodeId>,
    pub(crate) rerender_limit: u32,
    /// Slots allocated by this walk, freed if it is abandoned.
    pub(crate) created: Vec<u32>,
    /// Pending updates merged into carried-over lists, per queue.
    pub(crate) drains: HashMap<(u32, QueueSel), usize>,
    /// `(slot, cells)`: values and reducers of updated function renders.
    pub(crate) rendered: Vec<(u32, Vec<(u32, Value, CellReducer)>)>,
    /// Instance creation for newly mounted host nodes, in completion order.
    pub(crate) creations: Vec<Mutation>,
    /// Cell changes requested for other entities while rendering.
    pub(crate) outside: Vec<(CellHandle, CellAction)>,
    /// Lane marks deferred until the walk ends.
    pub(crate) deferred_marks: Vec<(EntityId, Lane)>,
    /// Lanes of updates that arrived while the walk was in progress.
    pub(crate) interleaved_lanes: Lanes,
    pub(crate) summary: WalkSummaryBuilder,
}

impl WalkContext {
    pub(crate) fn new(
        root: NodeId,
        render_lanes: Lanes,
        rerender_limit: u32,
        summary: WalkSummaryBuilder,
    ) -> Self {
        Self {
            index: summary.start().walk_index,
            render_lanes,
            root,
            next: Some(root),
            rerender_limit,
            created: Vec::new(),
            drains: HashMap::new(),
            rendered: Vec::new(),
            creations: Vec::new(),
            outside: Vec::new(),
            deferred_marks: Vec::new(),
            interleaved_lanes: Lanes::NONE,
            summary,
        }
    }
}

/// Performs units of work for one walk.
pub(crate) struct Walker<'w, 't> {
    pub(crate) tree: &'w mut WorkTree,
    pub(crate) ctx: &'w mut WalkContext,
    pub(crate) tracer: &'w mut Tracer<'t>,
}

impl Walker<'_, '_> {
    /// Runs units until the walk finishes (`Ok(true)`) or `should_yield`
    /// asks to stop (`Ok(false)`).
    pub(crate) fn run(&mut self, mut should_yield: impl FnMut() -> bool) -> Result<bool, WalkError> {
        while let Some(unit) = self.ctx.next {
            if should_yield() {
                return Ok(false);
            }
            self.perform_unit(unit)?;
        }
        Ok(true)
    }

    fn perform_unit(&mut self, unit: NodeId) -> Result<(), WalkError> {
        let next = self.begin_work(unit)?;
        self.ctx.summary.add_units(1);
        let node = self.tree.get_mut(unit);
        node.memoized_props = node.pending_props.clone();
        match next {
            Some(child) => self.ctx.next = Some(child),
            None => self.complete_unit(unit),
        }
        Ok(())
    }

    // -- Begin --

    fn begin_work(&mut self, wip: NodeId) -> Result<Option<NodeId>, WalkError> {
        let render_lanes = self.ctx.render_lanes;
        let has_current = self.tree.try_get(wip.alternate()).is_some();
        if has_current {
            let node = self.tree.get(wip);
            let props_unchanged = self.tree.get(wip.alternate()).memoized_props.same(&node.pending_props);
            if props_unchanged && !node.lanes.includes_some(render_lanes) {
                return Ok(self.bailout(wip));
            }
        }

        let node = self.tree.get_mut(wip);
        node.lanes = Lanes::NONE;
        let kind = node.kind.clone();
        match kind {
            NodeKind::Root => self.update_root(wip),
            NodeKind::Host(_) => {
                let children = self
                    .tree
                    .get(wip)
                    .pending_props
                    .element()
                    .map_or(Child::Empty, |p| p.children.clone());
                self.reconcile_children(wip, &children)
            }
            NodeKind::Text => Ok(None),
            NodeKind::Fragment => {
                let children = match &self.tree.get(wip).pending_props {
                    Props::Element(p) => p.children.clone(),
                    Props::List(list) => Child::List(Rc::clone(list)),
                    Props::None | Props::Text(_) => Child::Empty,
                };
                self.reconcile_children(wip, &children)
            }
            NodeKind::Function(component) => self.update_function(wip, &component, has_current),
            NodeKind::Stateful(component) => self.update_stateful(wip, &component, has_current),
        }
    }

    /// Skips a node whose inputs did not change. Its children are cloned
    /// when some of them have work in the render lanes.
    fn bailout(&mut self, wip: NodeId) -> Option<NodeId> {
        let skip = !self.tree.get(wip).child_lanes.includes_some(self.ctx.render_lanes);
        let entity = self.tree.entity(wip);
        trace!(?entity, skip, "bailout");
        self.tracer.bailout(&BailoutEvent {
            walk_index: self.ctx.index,
            entity,
            subtree_skipped: skip,
        });
        if skip {
            return None;
        }
        self.clone_children(wip)
    }

    fn clone_children(&mut self, wip: NodeId) -> Option<NodeId> {
        let mut current_child = self.tree.get(wip).child;
        let mut first = None;
        let mut prev: Option<NodeId> = None;
        while let Some(c) = current_child {
            let committed = self.tree.get(c);
            let pending = committed.pending_props.clone();
            current_child = committed.sibling;

            let n = self.tree.clone_for_work(c, pending);
            let node = self.tree.get_mut(n);
            node.parent = Some(wip);
            node.sibling = None;
            match prev {
                Some(p) => self.tree.get_mut(p).sibling = Some(n),
                None => first = Some(n),
            }
            prev = Some(n);
        }
        self.tree.get_mut(wip).child = first;
        first
    }

    fn reconcile_children(&mut self, wip: NodeId, children: &Child) -> Result<Option<NodeId>, WalkError> {
        ChildReconciler::new(self.tree, &mut self.ctx.created, wip, self.ctx.render_lanes).reconcile(children)
    }

    fn update_root(&mut self, wip: NodeId) -> Result<Option<NodeId>, WalkError> {
        let slot = wip.slot();
        let pending = match self.tree.queues(slot) {
            SlotQueues::Root(q) => q.pending(),
            _ => &[],
        };
        let NodeState::Root { element: prev, queue } = &self.tree.get(wip).state else {
            return Ok(None);
        };
        let prev = prev.clone();
        let rebased = rebase(queue, pending, self.ctx.render_lanes, |_, next: &Child| next.clone());
        if !pending.is_empty() {
            self.ctx.drains.insert((slot, QueueSel::Node), pending.len());
        }

        let next = rebased.state.clone();
        let node = self.tree.get_mut(wip);
        node.lanes = rebased.remaining;
        node.state = NodeState::Root {
            element: rebased.state,
            queue: rebased.queue,
        };
        if next.same(&prev) {
            return Ok(self.bailout(wip));
        }
        self.reconcile_children(wip, &next)
    }

    fn update_stateful(
        &mut self,
        wip: NodeId,
        component: &Rc<dyn StatefulComponent>,
        has_current: bool,
    ) -> Result<Option<NodeId>, WalkError> {
        let slot = wip.slot();
        let props = element_props(&self.tree.get(wip).pending_props);

        if !has_current {
            let state = component.initial_state(&props);
            let child = component.render(&props, &state);
            let node = self.tree.get_mut(wip);
            node.state = NodeState::Stateful {
                state: state.clone(),
                queue: UpdateQueue::new(state),
            };
            node.flags |= Flags::PERFORMED_WORK;
            self.tree.put_queues(slot, SlotQueues::Stateful(SharedQueue::new()));
            return self.reconcile_children(wip, &child);
        }

        let pending = match self.tree.queues(slot) {
            SlotQueues::Stateful(q) => q.pending(),
            _ => &[],
        };
        let node = self.tree.get(wip);
        let NodeState::Stateful { state: old, queue } = &node.state else {
            return Ok(None);
        };
        let mut forced = false;
        let rebased = rebase(queue, pending, self.ctx.render_lanes, |state, u: &StateUpdate| {
            forced |= u.is_force();
            u.apply(state)
        });
        let props_unchanged = self.tree.get(wip.alternate()).memoized_props.same(&node.pending_props);
        let changed = forced || rebased.state != *old || !props_unchanged;
        if !pending.is_empty() {
            self.ctx.drains.insert((slot, QueueSel::Node), pending.len());
        }

        let node = self.tree.get_mut(wip);
        node.lanes = rebased.remaining;
        node.state = NodeState::Stateful {
            state: rebased.state.clone(),
            queue: rebased.queue,
        };
        if !changed {
            return Ok(self.bailout(wip));
        }
        node.flags |= Flags::PERFORMED_WORK;
        let child = component.render(&props, &rebased.state);
        self.reconcile_children(wip, &child)
    }

    fn update_function(
        &mut self,
        wip: NodeId,
        component: &Rc<dyn Component>,
        has_current: bool,
    ) -> Result<Option<NodeId>, WalkError> {
        let slot = wip.slot();
        let entity = self.tree.entity(wip);
        let props = element_props(&self.tree.get(wip).pending_props);
        let mut cells = match mem::take(&mut self.tree.get_mut(wip).state) {
            NodeState::Cells(cells) => cells,
            _ => Vec::new(),
        };

        let queues: &[CellQueue] = match self.tree.queues(slot) {
            SlotQueues::Cells(q) => q,
            _ => &[],
        };
        let outcome = render_function(
            RenderRequest {
                entity,
                component: component.as_ref(),
                props: &props,
                queues,
                mount: !has_current,
                render_lanes: self.ctx.render_lanes,
                rerender_limit: self.ctx.rerender_limit,
            },
            &mut cells,
        );
        let HookOutcome {
            child,
            did_receive_update,
            remaining,
            consumed,
            mounted,
            rendered,
            outside,
            error,
        } = outcome;

        let node = self.tree.get_mut(wip);
        node.state = NodeState::Cells(cells);
        node.lanes = remaining;
        if let Some(e) = error {
            return Err(e);
        }
        node.flags |= Flags::PERFORMED_WORK;
        self.ctx.outside.extend(outside);

        if !has_current {
            self.tree.put_queues(slot, SlotQueues::Cells(mounted));
            return self.reconcile_children(wip, &child);
        }
        for (cell, count) in consumed {
            self.ctx.drains.insert((slot, QueueSel::Cell(cell)), count);
        }
        self.ctx.rendered.push((slot, rendered));

        let props_unchanged = self
            .tree
            .get(wip.alternate())
            .memoized_props
            .same(&self.tree.get(wip).pending_props);
        if props_unchanged && !did_receive_update {
            self.tree.get_mut(wip).flags.remove(Flags::PERFORMED_WORK);
            return Ok(self.bailout(wip));
        }
        self.reconcile_children(wip, &child)
    }

    // -- Complete --

    fn complete_unit(&mut self, unit: NodeId) {
        let mut completed = unit;
        loop {
            self.complete_work(completed);
            if completed == self.ctx.root {
                self.ctx.next = None;
                return;
            }
            let node = self.tree.get(completed);
            if let Some(sibling) = node.sibling {
                self.ctx.next = Some(sibling);
                return;
            }
            // Only the walk root may be unlinked.
            debug_assert!(node.parent.is_some(), "completed an unlinked node {completed:?}");
            match node.parent {
                Some(parent) => completed = parent,
                None => {
                    self.ctx.next = None;
                    return;
                }
            }
        }
    }

    fn complete_work(&mut self, wip: NodeId) {
        let current = self.tree.try_get(wip.alternate()).map(|c| c.memoized_props.clone());
        let node = self.tree.get(wip);
        let completion = match (&node.kind, &node.pending_props) {
            (NodeKind::Host(tag), props) => {
                let attrs = props.element().map_or(Value::Null, |p| p.attrs.clone());
                match current {
                    Some(old) if old.same(props) => Completion::Nothing,
                    Some(old) => {
                        let old_attrs = old.element().map(|p| p.attrs.clone()).unwrap_or(Value::Null);
                        if old_attrs == attrs {
                            Completion::Nothing
                        } else {
                            Completion::Update
                        }
                    }
                    None => Completion::Create(HostKind::Element {
                        tag: Rc::clone(tag),
                        attrs,
                    }),
                }
            }
            (NodeKind::Text, Props::Text(text)) => match current {
                Some(Props::Text(old)) if old == *text => Completion::Nothing,
                Some(_) => Completion::Update,
                None => Completion::Create(HostKind::Text(Rc::clone(text))),
            },
            _ => Completion::Nothing,
        };

        match completion {
            Completion::Nothing => {}
            Completion::Update => self.tree.get_mut(wip).flags |= Flags::UPDATE,
            Completion::Create(kind) => {
                let id = self.tree.entity(wip);
                self.ctx.creations.push(Mutation::Create { id, kind });
                let mut hosts = Vec::new();
                top_host_nodes(self.tree, wip, &mut hosts);
                for child in hosts {
                    self.ctx.creations.push(Mutation::AppendInitial {
                        parent: id,
                        child: self.tree.entity(child),
                    });
                }
            }
        }
        self.bubble_properties(wip);
    }

    /// Folds children's lanes and effects into `wip`.
    ///
    /// Children of a skipped subtree are committed nodes: only their lanes
    /// are read.
    fn bubble_properties(&mut self, wip: NodeId) {
        let first = self.tree.get(wip).child;
        let skipped = self
            .tree
            .try_get(wip.alternate())
            .is_some_and(|c| c.child == first);

        let mut child_lanes = Lanes::NONE;
        let mut subtree = Flags::empty();
        let mut next = first;
        while let Some(c) = next {
            if skipped {
                let n = self.tree.get(c);
                child_lanes |= n.lanes | n.child_lanes;
                next = n.sibling;
            } else {
                let n = self.tree.get_mut(c);
                child_lanes |= n.lanes | n.child_lanes;
                subtree |= n.subtree_flags | n.flags;
                n.parent = Some(wip);
                next = n.sibling;
            }
        }
        let node = self.tree.get_mut(wip);
        node.child_lanes = child_lanes;
        node.subtree_flags |= subtree;
    }
}

enum Completion {
    Nothing,
    Update,
    Create(HostKind),
}

fn element_props(props: &Props) -> Rc<ElementProps> {
    props.element().cloned().unwrap_or_default()
}

/// Collects the nearest host nodes below `id`, in order, without descending
/// into them.
pub(crate) fn top_host_nodes(tree: &WorkTree, id: NodeId, out: &mut Vec<NodeId>) {
    for child in tree.children(id) {
        if tree.get(child).kind.is_host() {
            out.push(child);
        } else {
            top_host_nodes(tree, child, out);
        }
    }
}
