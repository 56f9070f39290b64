// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Priority lanes.
//!
//! A [`Lanes`] value is a bitset of priority classes. Updates carry a single
//! [`Lane`]; nodes and roots aggregate them into sets. [`RootLanes`] holds
//! the per-root bookkeeping that decides which lanes to walk next and
//! promotes starved lanes to synchronous handling.

mod bits;
mod priority;
mod root;

pub use bits::{Lane, LaneIter, LaneMap, Lanes, TOTAL_LANES};
pub use priority::{EventPriority, SchedulerPriority};
pub use root::{RootLanes, select_next_lanes};
