// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types reported by walks and dispatch.

use alloc::string::String;

use thiserror::Error;

use crate::node::EntityId;

/// A fatal condition that stopped a walk.
///
/// The committed tree is left as it was before the walk started.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WalkError {
    /// A function component requested a different number of state cells
    /// than on its previous render.
    #[error(
        "component `{component}` ({entity:?}) rendered {found} state cells, expected {expected}"
    )]
    HookCountMismatch {
        /// Offending entity.
        entity: EntityId,
        /// Component name.
        component: String,
        /// Cells requested on the previous render.
        expected: usize,
        /// Cells requested on this render.
        found: usize,
    },
    /// A component kept updating its own state while rendering.
    #[error("too many re-renders in `{component}` ({entity:?}): limit is {limit}")]
    TooManyRerenders {
        /// Offending entity.
        entity: EntityId,
        /// Component name.
        component: String,
        /// Configured limit.
        limit: u32,
    },
    /// Every commit scheduled another synchronous commit.
    #[error("maximum update depth exceeded: {limit} nested synchronous commits")]
    NestedUpdateLimit {
        /// Configured limit.
        limit: u32,
    },
    /// A child description was neither an element, a list nor a primitive.
    #[error("invalid child ({what}) under `{parent}` ({entity:?})")]
    InvalidChild {
        /// Parent entity.
        entity: EntityId,
        /// Parent name.
        parent: String,
        /// What was found.
        what: &'static str,
    },
}

impl WalkError {
    /// Entity the error is attributed to, if any.
    #[must_use]
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::HookCountMismatch { entity, .. }
            | Self::TooManyRerenders { entity, .. }
            | Self::InvalidChild { entity, .. } => Some(*entity),
            Self::NestedUpdateLimit { .. } => None,
        }
    }
}

/// Rejection of an update request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The target entity has been removed.
    #[error("{0:?} is not mounted")]
    Unmounted(EntityId),
    /// The target exists but has no queue of the requested kind.
    #[error("{0:?} does not accept this kind of update")]
    WrongKind(EntityId),
}
