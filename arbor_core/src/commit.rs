// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turning a finished walk into host mutations and swapping it in.

use alloc::vec::Vec;

use crate::host::{Mutation, Renderer};
use crate::node::{EntityId, Flags, NodeId, SlotQueues, WorkTree};
use crate::walk::{QueueSel, WalkContext, top_host_nodes};

/// Result of committing one walk.
#[derive(Debug)]
pub(crate) struct Committed {
    pub(crate) mutations: Vec<Mutation>,
    pub(crate) removed_entities: usize,
}

/// Applies the walk's deferred queue writes, hands the mutations to the
/// renderer and makes the finished tree current.
pub(crate) fn commit_walk<R: Renderer + ?Sized>(
    tree: &mut WorkTree,
    ctx: &mut WalkContext,
    renderer: &mut R,
) -> Committed {
    for ((slot, sel), count) in ctx.drains.drain() {
        match (tree.queues_mut(slot), sel) {
            (SlotQueues::Root(q), QueueSel::Node) => q.drain_processed(count),
            (SlotQueues::Stateful(q), QueueSel::Node) => q.drain_processed(count),
            (SlotQueues::Cells(cells), QueueSel::Cell(i)) => {
                if let Some(c) = cells.get_mut(i as usize) {
                    c.shared.drain_processed(count);
                }
            }
            _ => {}
        }
    }
    for (slot, rendered) in ctx.rendered.drain(..) {
        let SlotQueues::Cells(cells) = tree.queues_mut(slot) else {
            continue;
        };
        for (i, value, reducer) in rendered {
            if let Some(c) = cells.get_mut(i as usize) {
                c.last_rendered_state = value;
                c.last_rendered_reducer = reducer;
            }
        }
    }

    let mut mutations = core::mem::take(&mut ctx.creations);
    let mut deleted = Vec::new();
    commit_node(tree, ctx.root, &mut mutations, &mut deleted);
    renderer.apply(tree, &mutations);
    tree.current_root = ctx.root;

    let before = tree.live_count();
    for d in deleted {
        tree.free_subtree(d);
    }
    Committed {
        mutations,
        removed_entities: before - tree.live_count(),
    }
}

/// Deletions first, then children, then the node's own placement and
/// update.
fn commit_node(tree: &mut WorkTree, id: NodeId, out: &mut Vec<Mutation>, deleted: &mut Vec<NodeId>) {
    let node = tree.get(id);
    if !node.deletions.is_empty() {
        let parent = host_parent(tree, Some(id));
        for &d in &node.deletions {
            let mut hosts = Vec::new();
            host_nodes(tree, d, &mut hosts);
            out.extend(hosts.into_iter().map(|h| Mutation::Remove {
                id: tree.entity(h),
                parent,
            }));
            deleted.push(d);
        }
    }

    if node.subtree_flags.intersects(Flags::MUTATION_MASK) {
        let mut next = node.child;
        while let Some(c) = next {
            commit_node(tree, c, out, deleted);
            next = tree.get(c).sibling;
        }
    }

    let node = tree.get(id);
    let flags = node.flags;
    if flags.contains(Flags::PLACEMENT) {
        let parent = host_parent(tree, node.parent);
        let before = host_sibling(tree, id);
        let mut hosts = Vec::new();
        host_nodes(tree, id, &mut hosts);
        out.extend(hosts.into_iter().map(|h| Mutation::Insert {
            id: tree.entity(h),
            parent,
            before,
        }));
        tree.get_mut(id).flags.remove(Flags::PLACEMENT);
    }
    if flags.contains(Flags::UPDATE) {
        let node = tree.get(id);
        let entity = tree.entity(id);
        if let Some(text) = node.text() {
            out.push(Mutation::SetText {
                id: entity,
                text: text.into(),
            });
        } else if let Some(attrs) = node.attrs() {
            out.push(Mutation::SetAttrs {
                id: entity,
                attrs: attrs.clone(),
            });
        }
    }
}

/// `id` itself when it is a host node, otherwise its nearest host
/// descendants.
fn host_nodes(tree: &WorkTree, id: NodeId, out: &mut Vec<NodeId>) {
    if tree.get(id).kind.is_host() {
        out.push(id);
    } else {
        top_host_nodes(tree, id, out);
    }
}

/// Nearest node at or above `from` that can hold host children.
fn host_parent(tree: &WorkTree, mut from: Option<NodeId>) -> EntityId {
    while let Some(id) = from {
        let node = tree.get(id);
        if node.kind.is_host_parent() {
            return tree.entity(id);
        }
        from = node.parent;
    }
    tree.entity(tree.current_root())
}

/// First host node after `id` in document order that is already attached
/// under the same host parent.
fn host_sibling(tree: &WorkTree, id: NodeId) -> Option<EntityId> {
    let mut node = id;
    'siblings: loop {
        let sibling = loop {
            let n = tree.get(node);
            if let Some(s) = n.sibling {
                break s;
            }
            let parent = n.parent?;
            if tree.get(parent).kind.is_host_parent() {
                return None;
            }
            node = parent;
        };
        node = sibling;
        while !tree.get(node).kind.is_host() {
            let n = tree.get(node);
            if n.flags.contains(Flags::PLACEMENT) {
                continue 'siblings;
            }
            match n.child {
                Some(c) => node = c,
                None => continue 'siblings,
            }
        }
        if !tree.get(node).flags.contains(Flags::PLACEMENT) {
            return Some(tree.entity(node));
        }
    }
}
