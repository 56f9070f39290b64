// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A renderer that applies mutations to an in-memory host tree.
//!
//! The host tree is what a real platform would show: elements with
//! attributes, text nodes, and child order. Tests compare it against the
//! expected markup with [`RecordingRenderer::markup`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use arbor_core::node::WorkTree;
use arbor_core::{EntityId, HostKind, Mutation, Renderer};
use serde_json::Value;

/// One host instance.
#[derive(Clone, Debug, PartialEq)]
pub struct HostNode {
    /// What the instance is.
    pub kind: HostKind,
    /// Attached children, in order.
    pub children: Vec<EntityId>,
    /// Parent the instance is attached to, if any.
    pub parent: Option<EntityId>,
}

/// Records every committed batch and keeps a host tree up to date.
///
/// Mutations that do not make sense for the current host tree (moving an
/// unknown instance, removing from the wrong parent) are collected in
/// [`problems`](Self::problems) instead of panicking.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    nodes: BTreeMap<EntityId, HostNode>,
    container: Option<EntityId>,
    top: Vec<EntityId>,
    batches: Vec<Vec<Mutation>>,
    problems: Vec<String>,
}

impl RecordingRenderer {
    /// Creates an empty renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch applied so far, oldest first.
    #[must_use]
    pub fn batches(&self) -> &[Vec<Mutation>] {
        &self.batches
    }

    /// The most recent batch.
    #[must_use]
    pub fn last_batch(&self) -> &[Mutation] {
        self.batches.last().map_or(&[], Vec::as_slice)
    }

    /// Inconsistencies seen while applying mutations.
    #[must_use]
    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    /// Instances attached directly to the container.
    #[must_use]
    pub fn top_level(&self) -> &[EntityId] {
        &self.top
    }

    /// Looks up a live host instance.
    #[must_use]
    pub fn node(&self, id: EntityId) -> Option<&HostNode> {
        self.nodes.get(&id)
    }

    /// Number of live host instances, attached or not.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.nodes.len()
    }

    /// Renders the attached host tree as compact markup.
    ///
    /// Elements print as `<tag attr="v">..</tag>` with attributes in key
    /// order, text prints as is.
    #[must_use]
    pub fn markup(&self) -> String {
        let mut out = String::new();
        for &id in &self.top {
            self.write_markup(id, &mut out);
        }
        out
    }

    fn write_markup(&self, id: EntityId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.kind {
            HostKind::Text(text) => out.push_str(text),
            HostKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                if let Value::Object(map) = attrs {
                    for (k, v) in map {
                        match v {
                            Value::String(s) => {
                                let _ = write!(out, " {k}=\"{s}\"");
                            }
                            other => {
                                let _ = write!(out, " {k}=\"{other}\"");
                            }
                        }
                    }
                }
                out.push('>');
                for &child in &node.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn children_of(&mut self, parent: EntityId) -> Option<&mut Vec<EntityId>> {
        if Some(parent) == self.container {
            Some(&mut self.top)
        } else {
            self.nodes.get_mut(&parent).map(|n| &mut n.children)
        }
    }

    fn detach(&mut self, id: EntityId) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(list) = self.children_of(parent) {
                list.retain(|&c| c != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    fn drop_instance(&mut self, id: EntityId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.drop_instance(child);
            }
        }
    }

    fn problem(&mut self, what: String) {
        tracing::warn!(problem = %what, "inconsistent host mutation");
        self.problems.push(what);
    }

    fn apply_one(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::Create { id, kind } => {
                if self.nodes.contains_key(id) {
                    self.problem(format!("{id:?} created twice"));
                }
                self.nodes.insert(
                    *id,
                    HostNode {
                        kind: kind.clone(),
                        children: Vec::new(),
                        parent: None,
                    },
                );
            }
            Mutation::AppendInitial { parent, child } => {
                let Some(p) = self.nodes.get_mut(parent) else {
                    self.problem(format!("append into unknown {parent:?}"));
                    return;
                };
                p.children.push(*child);
                if let Some(c) = self.nodes.get_mut(child) {
                    c.parent = Some(*parent);
                }
            }
            Mutation::Insert { id, parent, before } => {
                if !self.nodes.contains_key(id) {
                    self.problem(format!("insert of unknown {id:?}"));
                    return;
                }
                self.detach(*id);
                let Some(list) = self.children_of(*parent) else {
                    self.problem(format!("insert into unknown {parent:?}"));
                    return;
                };
                match before.and_then(|b| list.iter().position(|&c| c == b)) {
                    Some(at) => list.insert(at, *id),
                    None if before.is_some() => {
                        list.push(*id);
                        self.problem(format!("{id:?} inserted before a detached sibling"));
                    }
                    None => list.push(*id),
                }
                if let Some(node) = self.nodes.get_mut(id) {
                    node.parent = Some(*parent);
                }
            }
            Mutation::Remove { id, parent } => {
                let actual = self.nodes.get(id).and_then(|n| n.parent);
                if actual != Some(*parent) {
                    self.problem(format!("{id:?} removed from {parent:?} but attached to {actual:?}"));
                }
                self.detach(*id);
                self.drop_instance(*id);
            }
            Mutation::SetAttrs { id, attrs } => match self.nodes.get_mut(id).map(|n| &mut n.kind) {
                Some(HostKind::Element { attrs: a, .. }) => *a = attrs.clone(),
                _ => self.problem(format!("attributes set on non-element {id:?}")),
            },
            Mutation::SetText { id, text } => match self.nodes.get_mut(id).map(|n| &mut n.kind) {
                Some(HostKind::Text(t)) => *t = text.clone(),
                _ => self.problem(format!("text set on non-text {id:?}")),
            },
        }
    }
}

impl Renderer for RecordingRenderer {
    fn apply(&mut self, tree: &WorkTree, mutations: &[Mutation]) {
        self.container = Some(tree.entity(tree.current_root()));
        for m in mutations {
            self.apply_one(m);
        }
        self.batches.push(mutations.to_vec());
    }
}
