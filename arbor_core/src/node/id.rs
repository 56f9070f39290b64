// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node and entity identity types.

use core::fmt;

/// One of the two buffers a logical entity can occupy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Buffer {
    A = 0,
    B = 1,
}

impl Buffer {
    #[inline]
    pub(crate) const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// A handle to one buffered copy of a work node in a
/// [`WorkTree`](super::WorkTree).
///
/// Both copies of a logical entity share a slot; they differ only in the
/// buffer. The [`alternate`](Self::alternate) of a node is therefore an
/// index computation, not a stored pointer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) slot: u32,
    pub(crate) buffer: Buffer,
}

impl NodeId {
    #[inline]
    pub(crate) const fn new(slot: u32, buffer: Buffer) -> Self {
        Self { slot, buffer }
    }

    /// The other buffered copy of the same entity.
    #[inline]
    #[must_use]
    pub const fn alternate(self) -> Self {
        Self {
            slot: self.slot,
            buffer: self.buffer.other(),
        }
    }

    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = match self.buffer {
            Buffer::A => 'a',
            Buffer::B => 'b',
        };
        write!(f, "NodeId({}{b})", self.slot)
    }
}

/// A stable handle to a logical entity, valid across renders.
///
/// The generation counter detects handles to entities that were removed
/// and whose slot was recycled. Host instances are keyed by entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl EntityId {
    /// Builds a handle from raw parts (for renderers and tests).
    #[inline]
    #[must_use]
    pub const fn from_raw(idx: u32, generation: u32) -> Self {
        Self { idx, generation }
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}@gen{})", self.idx, self.generation)
    }
}

/// Handle to one state cell of a function component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellHandle {
    /// Owning entity.
    pub entity: EntityId,
    /// Position of the cell in the component's cell list.
    pub cell: u32,
}
