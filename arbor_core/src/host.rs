// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interfaces to the host environment: the cooperative scheduler that
//! decides when walks run, and the renderer that applies committed
//! mutations.

use alloc::rc::Rc;

use serde_json::Value;

use crate::lane::SchedulerPriority;
use crate::node::{EntityId, WorkTree};
use crate::time::Timestamp;

/// The host's cooperative task scheduler.
pub trait HostScheduler {
    /// Requests that [`perform_work`](crate::Reconciler::perform_work) be
    /// called at or above `priority`.
    fn schedule_work(&mut self, priority: SchedulerPriority);

    /// Asked between units of work in time-sliced walks. Returning `true`
    /// makes the walk return control to the host.
    fn should_yield(&mut self) -> bool;

    /// Current time.
    fn now(&self) -> Timestamp;
}

/// What a host instance is created as.
#[derive(Clone, Debug, PartialEq)]
pub enum HostKind {
    /// An element with a tag and attributes.
    Element {
        /// Tag name.
        tag: Rc<str>,
        /// Attributes.
        attrs: Value,
    },
    /// A text node.
    Text(Rc<str>),
}

/// One host-side operation produced by a commit.
///
/// Host instances are identified by the [`EntityId`] of the node that owns
/// them; the root's entity stands for the container.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Create a detached instance.
    Create {
        /// New instance.
        id: EntityId,
        /// Instance contents.
        kind: HostKind,
    },
    /// Append `child` to the still-detached `parent` while building a new
    /// subtree.
    AppendInitial {
        /// Detached parent.
        parent: EntityId,
        /// Child to append.
        child: EntityId,
    },
    /// Insert (or move) `id` under `parent`, before `before` or at the end.
    Insert {
        /// Instance to insert.
        id: EntityId,
        /// Attached parent.
        parent: EntityId,
        /// Stable sibling to insert before.
        before: Option<EntityId>,
    },
    /// Detach `id` from `parent`.
    Remove {
        /// Instance to remove.
        id: EntityId,
        /// Parent it is removed from.
        parent: EntityId,
    },
    /// Replace an element's attributes.
    SetAttrs {
        /// Element instance.
        id: EntityId,
        /// New attributes.
        attrs: Value,
    },
    /// Replace a text node's content.
    SetText {
        /// Text instance.
        id: EntityId,
        /// New content.
        text: Rc<str>,
    },
}

impl Mutation {
    /// Instance the mutation acts on.
    #[must_use]
    pub fn target(&self) -> EntityId {
        match self {
            Self::Create { id, .. }
            | Self::Insert { id, .. }
            | Self::Remove { id, .. }
            | Self::SetAttrs { id, .. }
            | Self::SetText { id, .. } => *id,
            Self::AppendInitial { child, .. } => *child,
        }
    }
}

/// Applies committed mutations to host output.
///
/// Order matters: within one parent, removals come before insertions.
/// Nothing else about the relative order of parent and child mutations
/// should be assumed.
pub trait Renderer {
    /// Applies `mutations`. `tree` is the tree as it will be committed.
    fn apply(&mut self, tree: &WorkTree, mutations: &[Mutation]);
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn apply(&mut self, tree: &WorkTree, mutations: &[Mutation]) {
        (**self).apply(tree, mutations);
    }
}

/// A renderer that ignores every mutation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn apply(&mut self, _tree: &WorkTree, _mutations: &[Mutation]) {}
}
