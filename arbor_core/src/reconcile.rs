// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The child reconciler: diffs a node's committed children against a new
//! child description.
//!
//! Lists are diffed in up to three phases:
//!
//! 1. walk old and new together while keys line up,
//! 2. if the old list ran out, append the rest,
//! 3. otherwise index the remaining old children by key (or position, for
//!    unkeyed children) and look each new child up.
//!
//! A reused child whose old index is below the highest old index already
//! placed is marked [`Flags::PLACEMENT`] (a move); everything else keeps its
//! relative position. This is not an optimal move set, and is not meant to
//! be.

use alloc::rc::Rc;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use crate::element::{Child, ChildView, Element, ElementType, Key, Props};
use crate::error::WalkError;
use crate::lane::Lanes;
use crate::log::warn;
use crate::node::{Flags, NodeId, NodeKind, NodeState, WorkTree};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum MapKey {
    Key(Key),
    Index(u32),
}

/// Diffs the children of one work-in-progress node.
pub(crate) struct ChildReconciler<'a> {
    tree: &'a mut WorkTree,
    created: &'a mut Vec<u32>,
    parent: NodeId,
    render_lanes: Lanes,
    track: bool,
}

impl<'a> ChildReconciler<'a> {
    /// Sets up a diff under `parent`.
    ///
    /// Side effects (placements, deletions) are only tracked when `parent`
    /// has a committed copy; a freshly mounted subtree is inserted whole.
    pub(crate) fn new(
        tree: &'a mut WorkTree,
        created: &'a mut Vec<u32>,
        parent: NodeId,
        render_lanes: Lanes,
    ) -> Self {
        let track = tree.try_get(parent.alternate()).is_some();
        Self {
            tree,
            created,
            parent,
            render_lanes,
            track,
        }
    }

    /// Diffs `new` against the committed children and installs the result
    /// as `parent`'s child list.
    pub(crate) fn reconcile(mut self, new: &Child) -> Result<Option<NodeId>, WalkError> {
        let old_first = self
            .tree
            .try_get(self.parent.alternate())
            .and_then(|c| c.child);
        let first = self.reconcile_child(old_first, new)?;
        self.tree.get_mut(self.parent).child = first;
        Ok(first)
    }

    fn reconcile_child(
        &mut self,
        old_first: Option<NodeId>,
        new: &Child,
    ) -> Result<Option<NodeId>, WalkError> {
        // An unkeyed fragment at the top level is treated as its children.
        let new = match new {
            Child::Element(Element {
                ty: ElementType::Fragment,
                key: None,
                props,
            }) => &props.children,
            other => other,
        };
        match new.view() {
            ChildView::Element(e) => {
                let n = self.reconcile_single_element(old_first, e);
                Ok(Some(self.place_single(n)))
            }
            ChildView::Text(t) => {
                let n = self.reconcile_single_text(old_first, t);
                Ok(Some(self.place_single(n)))
            }
            ChildView::List(list) => self.reconcile_list(old_first, list),
            ChildView::Empty => {
                self.delete_remaining(old_first);
                Ok(None)
            }
            ChildView::Invalid(what) => Err(self.invalid(what)),
        }
    }

    // -- Single child --

    fn reconcile_single_element(&mut self, old_first: Option<NodeId>, element: &Element) -> NodeId {
        let mut old = old_first;
        while let Some(o) = old {
            let node = self.tree.get(o);
            let sibling = node.sibling;
            if node.key == element.key {
                if node.kind.matches(&element.ty) {
                    self.delete_remaining(sibling);
                    return self.use_node(o, Props::Element(element.props.clone()));
                }
                // Same key, different type: nothing further can match.
                self.delete_remaining(Some(o));
                break;
            }
            self.delete_child(o);
            old = sibling;
        }
        self.create_element(element)
    }

    fn reconcile_single_text(&mut self, old_first: Option<NodeId>, text: Rc<str>) -> NodeId {
        if let Some(o) = old_first {
            let node = self.tree.get(o);
            if matches!(node.kind, NodeKind::Text) {
                let sibling = node.sibling;
                self.delete_remaining(sibling);
                return self.use_node(o, Props::Text(text));
            }
        }
        self.delete_remaining(old_first);
        self.create_text(text)
    }

    fn place_single(&mut self, node: NodeId) -> NodeId {
        self.tree.get_mut(node).parent = Some(self.parent);
        if self.track && self.is_fresh(node) {
            self.tree.get_mut(node).flags |= Flags::PLACEMENT;
        }
        node
    }

    // -- Lists --

    fn reconcile_list(
        &mut self,
        old_first: Option<NodeId>,
        list: &[Child],
    ) -> Result<Option<NodeId>, WalkError> {
        if cfg!(debug_assertions) {
            let dups = duplicate_keys(list);
            if !dups.is_empty() {
                warn!(keys = ?dups, parent = ?self.parent, "duplicate keys in child list");
            }
        }

        let mut first: Option<NodeId> = None;
        let mut prev: Option<NodeId> = None;
        let mut last_placed = 0_u32;
        let mut new_idx = 0_usize;
        let mut old = old_first;

        // Phase 1: positional pairing while keys match.
        while new_idx < list.len() {
            let Some(o) = old else { break };
            let (slot_old, next_old) = if self.tree.get(o).index as usize > new_idx {
                (None, Some(o))
            } else {
                (Some(o), self.tree.get(o).sibling)
            };
            let Some(n) = self.update_slot(slot_old, &list[new_idx])? else {
                if slot_old.is_none() {
                    old = next_old;
                }
                break;
            };
            if let Some(so) = slot_old {
                if self.track && self.is_fresh(n) {
                    // Key matched but the old node could not be reused.
                    self.delete_child(so);
                }
            }
            last_placed = self.place_child(n, last_placed, new_idx as u32);
            self.link(&mut first, &mut prev, n);
            old = next_old;
            new_idx += 1;
        }

        if new_idx == list.len() {
            self.delete_remaining(old);
            return Ok(first);
        }

        // Phase 2: old children exhausted, the rest are insertions.
        if old.is_none() {
            for (i, child) in list.iter().enumerate().skip(new_idx) {
                if let Some(n) = self.create_child(child)? {
                    last_placed = self.place_child(n, last_placed, i as u32);
                    self.link(&mut first, &mut prev, n);
                }
            }
            return Ok(first);
        }

        // Phase 3: look the remaining new children up by key or position.
        let mut existing = self.map_remaining(old);
        for (i, child) in list.iter().enumerate().skip(new_idx) {
            let Some(n) = self.update_from_map(&existing, i as u32, child)? else {
                continue;
            };
            if self.track && !self.is_fresh(n) {
                let node = self.tree.get(n);
                let key = match &node.key {
                    Some(k) => MapKey::Key(k.clone()),
                    None => MapKey::Index(i as u32),
                };
                existing.remove(&key);
            }
            last_placed = self.place_child(n, last_placed, i as u32);
            self.link(&mut first, &mut prev, n);
        }

        if self.track {
            // Delete what was not claimed, in old order.
            let remaining: HashSet<NodeId> = existing.into_values().collect();
            let mut o = old;
            while let Some(id) = o {
                o = self.tree.get(id).sibling;
                if remaining.contains(&id) {
                    self.delete_child(id);
                }
            }
        }
        Ok(first)
    }

    fn update_slot(&mut self, old: Option<NodeId>, new: &Child) -> Result<Option<NodeId>, WalkError> {
        let key = old.and_then(|o| self.tree.get(o).key.clone());
        match new.view() {
            ChildView::Text(t) => Ok(if key.is_some() {
                None
            } else {
                Some(self.update_text(old, t))
            }),
            ChildView::Element(e) => Ok(if e.key == key {
                Some(self.update_element(old, e))
            } else {
                None
            }),
            ChildView::List(l) => Ok(if key.is_some() {
                None
            } else {
                Some(self.update_fragment(old, l))
            }),
            ChildView::Empty => Ok(None),
            ChildView::Invalid(what) => Err(self.invalid(what)),
        }
    }

    fn update_from_map(
        &mut self,
        existing: &HashMap<MapKey, NodeId>,
        new_idx: u32,
        new: &Child,
    ) -> Result<Option<NodeId>, WalkError> {
        let by_index = existing.get(&MapKey::Index(new_idx)).copied();
        match new.view() {
            ChildView::Text(t) => Ok(Some(self.update_text(by_index, t))),
            ChildView::Element(e) => {
                let old = match &e.key {
                    Some(k) => existing.get(&MapKey::Key(k.clone())).copied(),
                    None => by_index,
                };
                Ok(Some(self.update_element(old, e)))
            }
            ChildView::List(l) => Ok(Some(self.update_fragment(by_index, l))),
            ChildView::Empty => Ok(None),
            ChildView::Invalid(what) => Err(self.invalid(what)),
        }
    }

    /// Indexes the remaining old children. The first child holding a key
    /// wins; later duplicates can never be matched and are deleted here.
    fn map_remaining(&mut self, mut old: Option<NodeId>) -> HashMap<MapKey, NodeId> {
        let mut map = HashMap::new();
        while let Some(o) = old {
            let node = self.tree.get(o);
            let key = match &node.key {
                Some(k) => MapKey::Key(k.clone()),
                None => MapKey::Index(node.index),
            };
            old = node.sibling;
            if map.contains_key(&key) {
                self.delete_child(o);
            } else {
                map.insert(key, o);
            }
        }
        map
    }

    fn place_child(&mut self, n: NodeId, last_placed: u32, new_idx: u32) -> u32 {
        let old_index = self.tree.try_get(n.alternate()).map(|c| c.index);
        let node = self.tree.get_mut(n);
        node.index = new_idx;
        if !self.track {
            return last_placed;
        }
        match old_index {
            Some(old_index) if old_index >= last_placed => old_index,
            Some(_) => {
                node.flags |= Flags::PLACEMENT;
                last_placed
            }
            None => {
                node.flags |= Flags::PLACEMENT;
                last_placed
            }
        }
    }

    fn link(&mut self, first: &mut Option<NodeId>, prev: &mut Option<NodeId>, n: NodeId) {
        self.tree.get_mut(n).parent = Some(self.parent);
        match prev {
            Some(p) => self.tree.get_mut(*p).sibling = Some(n),
            None => *first = Some(n),
        }
        *prev = Some(n);
    }

    // -- Reuse or create --

    fn update_text(&mut self, old: Option<NodeId>, text: Rc<str>) -> NodeId {
        match old {
            Some(o) if matches!(self.tree.get(o).kind, NodeKind::Text) => self.use_node(o, Props::Text(text)),
            _ => self.create_text(text),
        }
    }

    fn update_element(&mut self, old: Option<NodeId>, element: &Element) -> NodeId {
        match old {
            Some(o) if self.tree.get(o).kind.matches(&element.ty) => {
                self.use_node(o, Props::Element(element.props.clone()))
            }
            _ => self.create_element(element),
        }
    }

    fn update_fragment(&mut self, old: Option<NodeId>, list: &Rc<[Child]>) -> NodeId {
        match old {
            Some(o) if matches!(self.tree.get(o).kind, NodeKind::Fragment) => {
                self.use_node(o, Props::List(list.clone()))
            }
            _ => self.create(NodeKind::Fragment, None, Props::List(list.clone())),
        }
    }

    fn create_child(&mut self, child: &Child) -> Result<Option<NodeId>, WalkError> {
        match child.view() {
            ChildView::Text(t) => Ok(Some(self.create_text(t))),
            ChildView::Element(e) => Ok(Some(self.create_element(e))),
            ChildView::List(l) => Ok(Some(self.create(NodeKind::Fragment, None, Props::List(l.clone())))),
            ChildView::Empty => Ok(None),
            ChildView::Invalid(what) => Err(self.invalid(what)),
        }
    }

    fn create_element(&mut self, element: &Element) -> NodeId {
        self.create(
            NodeKind::from_type(&element.ty),
            element.key.clone(),
            Props::Element(element.props.clone()),
        )
    }

    fn create_text(&mut self, text: Rc<str>) -> NodeId {
        self.create(NodeKind::Text, None, Props::Text(text))
    }

    fn create(&mut self, kind: NodeKind, key: Option<Key>, props: Props) -> NodeId {
        let id = self.tree.create(kind, key, props, NodeState::None);
        self.tree.get_mut(id).lanes = self.render_lanes;
        self.created.push(id.slot);
        id
    }

    /// Prepares the work copy of a committed child for reuse at a new
    /// position.
    fn use_node(&mut self, old: NodeId, props: Props) -> NodeId {
        let n = self.tree.clone_for_work(old, props);
        let node = self.tree.get_mut(n);
        node.index = 0;
        node.sibling = None;
        n
    }

    fn is_fresh(&self, n: NodeId) -> bool {
        self.tree.try_get(n.alternate()).is_none()
    }

    // -- Deletion --

    fn delete_child(&mut self, old: NodeId) {
        if !self.track {
            return;
        }
        let parent = self.tree.get_mut(self.parent);
        parent.deletions.push(old);
        parent.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining(&mut self, mut old: Option<NodeId>) {
        if !self.track {
            return;
        }
        while let Some(o) = old {
            old = self.tree.get(o).sibling;
            self.delete_child(o);
        }
    }

    fn invalid(&self, what: &'static str) -> WalkError {
        let parent = self.tree.get(self.parent);
        WalkError::InvalidChild {
            entity: self.tree.entity(self.parent),
            parent: parent.kind.name().into(),
            what,
        }
    }
}

/// Keys that appear more than once among the elements of `list`.
pub(crate) fn duplicate_keys(list: &[Child]) -> Vec<Key> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for child in list {
        if let Child::Element(Element { key: Some(k), .. }) = child {
            if !seen.insert(k.clone()) && !dups.contains(k) {
                dups.push(k.clone());
            }
        }
    }
    dups
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    use crate::element::ElementProps;

    /// Builds a committed parent with the given children, then a work copy
    /// of the parent ready for diffing.
    struct Fixture {
        tree: WorkTree,
        created: Vec<u32>,
        parent: NodeId,
        old: Vec<NodeId>,
    }

    impl Fixture {
        fn new(children: &[Child]) -> Self {
            let mut tree = WorkTree::new();
            let parent = tree.create(
                NodeKind::Host("ul".into()),
                None,
                Props::Element(Rc::new(ElementProps::default())),
                NodeState::None,
            );
            let mut created = Vec::new();
            // Mount: no tracking because the parent has no committed copy.
            ChildReconciler::new(&mut tree, &mut created, parent, Lanes::DEFAULT)
                .reconcile(&Child::list(children.iter().cloned()))
                .unwrap();
            let old: Vec<_> = tree.children(parent).collect();
            // Treat the mounted tree as committed and start a new walk.
            let wip = tree.clone_for_work(parent, Props::None);
            Self {
                tree,
                created: Vec::new(),
                parent: wip,
                old,
            }
        }

        fn diff(&mut self, children: &[Child]) -> Vec<NodeId> {
            ChildReconciler::new(&mut self.tree, &mut self.created, self.parent, Lanes::DEFAULT)
                .reconcile(&Child::list(children.iter().cloned()))
                .unwrap();
            self.tree.children(self.parent).collect()
        }

        fn placed(&self, ids: &[NodeId]) -> Vec<bool> {
            ids.iter()
                .map(|id| self.tree.get(*id).flags().contains(Flags::PLACEMENT))
                .collect()
        }

        fn deleted(&self) -> Vec<NodeId> {
            self.tree.get(self.parent).deletions().to_vec()
        }
    }

    fn li(key: &str) -> Child {
        Element::host("li").with_key(key).into()
    }

    fn item(tag: &str) -> Child {
        Element::host(tag).into()
    }

    #[test]
    fn mount_marks_nothing() {
        let f = Fixture::new(&[li("1"), li("2")]);
        assert_eq!(f.old.len(), 2, "two children");
        assert_eq!(f.placed(&f.old), [false, false], "mount is untracked");
    }

    #[test]
    fn identical_keyed_list_reuses_everything() {
        let mut f = Fixture::new(&[li("1"), li("2"), li("3")]);
        let new = f.diff(&[li("1"), li("2"), li("3")]);
        assert_eq!(f.placed(&new), [false, false, false], "no moves");
        assert!(f.deleted().is_empty(), "no deletions");
        assert!(f.created.is_empty(), "no creations");
        let alts: Vec<_> = new.iter().map(|n| n.alternate()).collect();
        assert_eq!(alts, f.old, "each reused its own committed node");
    }

    #[test]
    fn rotate_right_moves_the_two_that_fell_behind() {
        // [1,2,3] -> [3,1,2]: 3 keeps its old index as the high-water mark,
        // so 1 and 2 (old indices 0 and 1) are the ones marked.
        let mut f = Fixture::new(&[li("1"), li("2"), li("3")]);
        let new = f.diff(&[li("3"), li("1"), li("2")]);
        assert_eq!(f.placed(&new), [false, true, true], "placement markers");
        assert!(f.deleted().is_empty(), "no deletions");
        assert!(f.created.is_empty(), "no creations");
    }

    #[test]
    fn rotate_left_moves_one() {
        let mut f = Fixture::new(&[li("1"), li("2"), li("3")]);
        let new = f.diff(&[li("2"), li("3"), li("1")]);
        assert_eq!(f.placed(&new), [false, false, true], "only 1 moves");
    }

    #[test]
    fn unkeyed_removal_from_the_middle() {
        // Positional pairing: A stays, C's description lands on B's node,
        // and the old C is the one deleted.
        let mut f = Fixture::new(&[item("a"), item("b"), item("c")]);
        let new = f.diff(&[item("a"), item("c")]);
        assert_eq!(new.len(), 2, "two children");
        assert_eq!(f.placed(&new), [false, true], "c recreated over b's slot");
        assert_eq!(f.deleted(), [f.old[1], f.old[2]], "b replaced, c dropped");
    }

    #[test]
    fn unkeyed_same_type_removal_keeps_positions() {
        let mut f = Fixture::new(&[item("p"), item("p"), item("p")]);
        let new = f.diff(&[item("p"), item("p")]);
        assert_eq!(f.placed(&new), [false, false], "stays in place");
        assert_eq!(f.deleted(), [f.old[2]], "tail deleted");
    }

    #[test]
    fn keyed_removal_deletes_exactly_the_missing_key() {
        let mut f = Fixture::new(&[li("a"), li("b"), li("c")]);
        let new = f.diff(&[li("a"), li("c")]);
        assert_eq!(f.placed(&new), [false, false], "no markers");
        assert_eq!(f.deleted(), [f.old[1]], "b deleted");
        assert!(f.created.is_empty(), "no creations");
    }

    #[test]
    fn append_takes_the_fast_path() {
        let mut f = Fixture::new(&[li("a")]);
        let new = f.diff(&[li("a"), li("b"), li("c")]);
        assert_eq!(f.placed(&new), [false, true, true], "new ones placed");
        assert_eq!(f.created.len(), 2, "two created");
    }

    #[test]
    fn prepend_places_only_the_new_child() {
        let mut f = Fixture::new(&[li("a"), li("b")]);
        let new = f.diff(&[li("z"), li("a"), li("b")]);
        assert_eq!(f.placed(&new), [true, false, false], "only z");
        assert_eq!(f.created.len(), 1, "one created");
    }

    #[test]
    fn type_change_under_same_key_recreates() {
        let mut f = Fixture::new(&[li("a")]);
        let new = f.diff(&[Element::host("p").with_key("a").into()]);
        assert_eq!(f.placed(&new), [true], "fresh node placed");
        assert_eq!(f.deleted(), [f.old[0]], "old deleted");
    }

    #[test]
    fn single_element_scans_for_its_key() {
        let mut f = Fixture::new(&[li("a"), li("b"), li("c")]);
        ChildReconciler::new(&mut f.tree, &mut f.created, f.parent, Lanes::DEFAULT)
            .reconcile(&li("b"))
            .unwrap();
        let new: Vec<_> = f.tree.children(f.parent).collect();
        assert_eq!(new, [f.old[1].alternate()], "b reused");
        assert_eq!(f.deleted(), [f.old[0], f.old[2]], "a and c deleted");
    }

    #[test]
    fn fresh_single_child_is_linked_to_its_parent() {
        let mut f = Fixture::new(&[li("a")]);
        for child in [item("p"), Child::text("t")] {
            ChildReconciler::new(&mut f.tree, &mut f.created, f.parent, Lanes::DEFAULT)
                .reconcile(&child)
                .unwrap();
            let first = f.tree.get(f.parent).child().unwrap();
            assert!(f.tree.try_get(first.alternate()).is_none(), "freshly created");
            assert_eq!(f.tree.get(first).parent(), Some(f.parent), "linked to the parent");
        }
    }

    #[test]
    fn single_text_reuses_text_node() {
        let mut f = Fixture::new(&[Child::text("x")]);
        ChildReconciler::new(&mut f.tree, &mut f.created, f.parent, Lanes::DEFAULT)
            .reconcile(&Child::text("y"))
            .unwrap();
        let new: Vec<_> = f.tree.children(f.parent).collect();
        assert_eq!(new, [f.old[0].alternate()], "text reused");
        assert!(f.deleted().is_empty(), "nothing deleted");
    }

    #[test]
    fn empty_deletes_everything() {
        let mut f = Fixture::new(&[li("a"), li("b")]);
        ChildReconciler::new(&mut f.tree, &mut f.created, f.parent, Lanes::DEFAULT)
            .reconcile(&Child::Empty)
            .unwrap();
        assert_eq!(f.tree.get(f.parent).child(), None, "no children");
        assert_eq!(f.deleted(), f.old, "all deleted");
    }

    #[test]
    fn unkeyed_top_level_fragment_is_unwrapped() {
        let mut f = Fixture::new(&[li("a"), li("b")]);
        let frag: Child = Element::fragment(vec![li("a"), li("b")]).into();
        ChildReconciler::new(&mut f.tree, &mut f.created, f.parent, Lanes::DEFAULT)
            .reconcile(&frag)
            .unwrap();
        let new: Vec<_> = f.tree.children(f.parent).collect();
        assert_eq!(new.len(), 2, "children diffed directly");
        assert!(f.deleted().is_empty(), "matched");
    }

    #[test]
    fn nested_list_becomes_a_fragment() {
        let mut f = Fixture::new(&[li("a")]);
        let new = f.diff(&[li("a"), Child::list([item("x"), item("y")])]);
        assert!(matches!(f.tree.get(new[1]).kind(), NodeKind::Fragment), "fragment");
    }

    #[test]
    fn invalid_child_names_the_parent() {
        let mut f = Fixture::new(&[]);
        let err = ChildReconciler::new(&mut f.tree, &mut f.created, f.parent, Lanes::DEFAULT)
            .reconcile(&Child::Value(serde_json::json!({"a": 1})))
            .unwrap_err();
        assert!(
            matches!(err, WalkError::InvalidChild { ref parent, what: "object value", .. } if parent == "ul"),
            "{err:?}"
        );
    }

    #[test]
    fn empty_slots_keep_positions_for_later_children() {
        let mut f = Fixture::new(&[li("a"), Child::Empty, li("c")]);
        assert_eq!(f.tree.get(f.old[1]).index(), 2, "index counts the hole");
        let new = f.diff(&[li("a"), Child::Empty, li("c")]);
        assert_eq!(f.placed(&new), [false, false], "stable");
        assert!(f.deleted().is_empty(), "nothing deleted");
    }

    #[test]
    fn shadowed_duplicate_old_keys_are_deleted() {
        let mut f = Fixture::new(&[li("a"), li("a"), li("b")]);
        let new = f.diff(&[li("b"), li("a")]);
        let alts: Vec<_> = new.iter().map(|n| n.alternate()).collect();
        assert_eq!(alts, [f.old[2], f.old[0]], "first a wins");
        assert_eq!(f.deleted(), [f.old[1]], "second a deleted");
        assert!(f.created.is_empty(), "no creations");
    }

    #[test]
    fn duplicate_keys_are_reported_once() {
        let list = [li("a"), li("b"), li("a"), li("a")];
        let dups = duplicate_keys(&list);
        assert_eq!(dups.len(), 1, "one duplicate key");
        assert_eq!(&*dups[0], "a", "key a");
    }
}
