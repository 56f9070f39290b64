// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending-mutation markers.

use bitflags::bitflags;

bitflags! {
    /// Effect flags on a work node.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u16 {
        /// Insert (or move) the node's host output.
        const PLACEMENT = 1 << 0;
        /// Host properties or text changed.
        const UPDATE = 1 << 1;
        /// `deletions` holds children to remove.
        const CHILD_DELETION = 1 << 2;
        /// The node's behavior ran in this walk.
        const PERFORMED_WORK = 1 << 3;

        /// Flags the commit phase acts on.
        const MUTATION_MASK = Self::PLACEMENT.bits() | Self::UPDATE.bits() | Self::CHILD_DELETION.bits();
    }
}
