// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event priorities and the scheduler priority levels they map onto.

use super::bits::{Lane, Lanes};

/// Priority of the event that caused an update.
///
/// Event priorities are coarser than lanes: each one maps to a single
/// representative lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventPriority {
    /// Clicks, key presses: each event is handled on its own.
    Discrete,
    /// Drags, scrolls, pointer moves.
    Continuous,
    /// Everything without a more specific source.
    Default,
    /// Background work.
    Idle,
}

impl EventPriority {
    /// The lane updates of this priority are assigned to.
    #[must_use]
    pub const fn lane(self) -> Lane {
        match self {
            Self::Discrete => Lanes::SYNC,
            Self::Continuous => Lanes::INPUT_CONTINUOUS,
            Self::Default => Lanes::DEFAULT,
            Self::Idle => Lanes::IDLE,
        }
    }

    /// Classifies a lane set by its highest-priority lane.
    #[must_use]
    pub const fn from_lanes(lanes: Lanes) -> Self {
        let lane = lanes.highest_priority_lane();
        if lane.is_empty() {
            Self::Idle
        } else if lane.bits() <= Lanes::SYNC.bits() {
            Self::Discrete
        } else if lane.bits() <= Lanes::INPUT_CONTINUOUS.bits() {
            Self::Continuous
        } else if lane.includes_non_idle_work() {
            Self::Default
        } else {
            Self::Idle
        }
    }
}

/// Priority levels understood by the cooperative task scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SchedulerPriority {
    /// Run before anything else.
    Immediate,
    /// Run soon; user is waiting.
    UserBlocking,
    /// Normal background rendering.
    Normal,
    /// May be delayed.
    Low,
    /// Run only when nothing else is queued.
    Idle,
}

impl SchedulerPriority {
    /// Scheduler priority for a walk over `lanes`.
    #[must_use]
    pub const fn for_lanes(lanes: Lanes) -> Self {
        match EventPriority::from_lanes(lanes) {
            EventPriority::Discrete => Self::Immediate,
            EventPriority::Continuous => Self::UserBlocking,
            EventPriority::Default => Self::Normal,
            EventPriority::Idle => Self::Idle,
        }
    }
}
