// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Indented outlines of a work tree.

use std::fmt::Write;

use arbor_core::node::{Flags, NodeId, WorkTree};

/// Renders the committed tree as an indented outline, one node per line.
///
/// Each line shows the kind name, the key, the entity, text content or
/// non-empty attributes, and any pending lanes or effect flags left on the
/// node:
///
/// ```text
/// #root @0
///   ul @1 child_lanes=Default
///     li key="a" @2 lanes=Default
///       #text @3 "a"
/// ```
#[must_use]
pub fn dump_tree(tree: &WorkTree) -> String {
    dump_subtree(tree, tree.current_root())
}

/// Like [`dump_tree`], starting at `root` (any copy, committed or not).
#[must_use]
pub fn dump_subtree(tree: &WorkTree, root: NodeId) -> String {
    let mut out = String::new();
    for (id, depth) in tree.preorder(root) {
        let node = tree.get(id);
        let entity = tree.entity(id);
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(node.kind().name());
        if let Some(key) = node.key() {
            let _ = write!(out, " key={key:?}");
        }
        let _ = write!(out, " @{}", entity.index());
        if entity.generation() > 0 {
            let _ = write!(out, "/{}", entity.generation());
        }
        if let Some(text) = node.text() {
            let _ = write!(out, " {text:?}");
        }
        if let Some(attrs) = node.attrs().filter(|a| !is_empty_attrs(a)) {
            let _ = write!(out, " {attrs}");
        }
        if !node.lanes().is_empty() {
            let _ = write!(out, " lanes={}", node.lanes());
        }
        if !node.child_lanes().is_empty() {
            let _ = write!(out, " child_lanes={}", node.child_lanes());
        }
        if !node.flags().is_empty() {
            let _ = write!(out, " flags={}", flag_names(node.flags()));
        }
        out.push('\n');
    }
    out
}

fn is_empty_attrs(attrs: &serde_json::Value) -> bool {
    attrs.is_null() || attrs.as_object().is_some_and(serde_json::Map::is_empty)
}

fn flag_names(flags: Flags) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join("|")
}
