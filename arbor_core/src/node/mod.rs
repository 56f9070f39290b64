// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The double-buffered work-node tree.

mod flags;
mod id;
mod kind;
mod store;

pub use flags::Flags;
pub use id::{CellHandle, EntityId, NodeId};
pub use kind::NodeKind;
pub use store::{Children, NodeSnapshot, NodeState, TreeSnapshot, WorkNode, WorkTree};

pub(crate) use id::Buffer;
pub(crate) use store::SlotQueues;
