// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The closed set of node kinds.

use alloc::rc::Rc;
use core::fmt;

use crate::element::{Component, ElementType, StatefulComponent, same_rc};

/// What a work node is, including the behavior it instantiates.
#[derive(Clone)]
pub enum NodeKind {
    /// The tree root. Its state holds the rendered child description.
    Root,
    /// A host element with a tag.
    Host(Rc<str>),
    /// A host text node.
    Text,
    /// A grouping node with no host presence.
    Fragment,
    /// A function component.
    Function(Rc<dyn Component>),
    /// A component with object state.
    Stateful(Rc<dyn StatefulComponent>),
}

impl NodeKind {
    /// Kind instantiated by an element type.
    #[must_use]
    pub fn from_type(ty: &ElementType) -> Self {
        match ty {
            ElementType::Host(tag) => Self::Host(Rc::clone(tag)),
            ElementType::Function(c) => Self::Function(Rc::clone(c)),
            ElementType::Stateful(c) => Self::Stateful(Rc::clone(c)),
            ElementType::Fragment => Self::Fragment,
        }
    }

    /// Whether a node of this kind can be reused for an element of `ty`.
    #[must_use]
    pub fn matches(&self, ty: &ElementType) -> bool {
        match (self, ty) {
            (Self::Host(a), ElementType::Host(b)) => a == b,
            (Self::Function(a), ElementType::Function(b)) => same_rc(a, b),
            (Self::Stateful(a), ElementType::Stateful(b)) => same_rc(a, b),
            (Self::Fragment, ElementType::Fragment) => true,
            _ => false,
        }
    }

    /// Host nodes own a host instance.
    #[must_use]
    pub const fn is_host(&self) -> bool {
        matches!(self, Self::Host(_) | Self::Text)
    }

    /// Nodes that can parent host instances.
    #[must_use]
    pub const fn is_host_parent(&self) -> bool {
        matches!(self, Self::Host(_) | Self::Root)
    }

    /// Name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Root => "#root",
            Self::Host(tag) => tag,
            Self::Text => "#text",
            Self::Fragment => "#fragment",
            Self::Function(c) => c.name(),
            Self::Stateful(c) => c.name(),
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("Root"),
            Self::Host(tag) => write!(f, "Host({tag})"),
            Self::Text => f.write_str("Text"),
            Self::Fragment => f.write_str("Fragment"),
            Self::Function(c) => write!(f, "Function({})", c.name()),
            Self::Stateful(c) => write!(f, "Stateful({})", c.name()),
        }
    }
}
