// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The lane bitset value type.

use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Number of usable lanes.
pub const TOTAL_LANES: usize = 31;

/// A set of priority lanes.
///
/// Each bit is one lane. Lower bit positions are higher priority. Some
/// classes (transitions, retries) span several adjacent bits so that
/// unrelated requests of the same class are not batched together.
///
/// A [`Lane`] is the same type restricted to a single bit by convention.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lanes(u32);

/// A single lane. See [`Lanes`].
pub type Lane = Lanes;

impl Lanes {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Synchronous, never time-sliced.
    pub const SYNC: Self = Self(0b0000000000000000000000000000001);
    /// Hydration counterpart of [`INPUT_CONTINUOUS`](Self::INPUT_CONTINUOUS).
    pub const INPUT_CONTINUOUS_HYDRATION: Self = Self(0b0000000000000000000000000000010);
    /// Continuous input (drag, scroll, pointer move).
    pub const INPUT_CONTINUOUS: Self = Self(0b0000000000000000000000000000100);
    /// Hydration counterpart of [`DEFAULT`](Self::DEFAULT).
    pub const DEFAULT_HYDRATION: Self = Self(0b0000000000000000000000000001000);
    /// Updates without a more specific priority.
    pub const DEFAULT: Self = Self(0b0000000000000000000000000010000);
    /// Hydration counterpart of the transition lanes.
    pub const TRANSITION_HYDRATION: Self = Self(0b0000000000000000000000000100000);
    /// All sixteen transition lanes.
    pub const TRANSITIONS: Self = Self(0b0000000001111111111111111000000);
    /// The first transition lane.
    pub const TRANSITION_1: Self = Self(0b0000000000000000000000001000000);
    /// All five retry lanes.
    pub const RETRIES: Self = Self(0b0000111110000000000000000000000);
    /// The first retry lane.
    pub const RETRY_1: Self = Self(0b0000000010000000000000000000000);
    /// Selective hydration.
    pub const SELECTIVE_HYDRATION: Self = Self(0b0001000000000000000000000000000);
    /// Every lane that is not idle or offscreen.
    pub const NON_IDLE: Self = Self(0b0001111111111111111111111111111);
    /// Hydration counterpart of [`IDLE`](Self::IDLE).
    pub const IDLE_HYDRATION: Self = Self(0b0010000000000000000000000000000);
    /// Work that runs only when nothing else is pending.
    pub const IDLE: Self = Self(0b0100000000000000000000000000000);
    /// Work for hidden subtrees.
    pub const OFFSCREEN: Self = Self(0b1000000000000000000000000000000);
    /// Every lane.
    pub const ALL: Self = Self(0b1111111111111111111111111111111);

    /// Lanes that render without time slicing unless configured otherwise.
    pub const SYNC_DEFAULT: Self = Self(
        Self::INPUT_CONTINUOUS_HYDRATION.0
            | Self::INPUT_CONTINUOUS.0
            | Self::DEFAULT_HYDRATION.0
            | Self::DEFAULT.0,
    );

    /// Creates a lane set from raw bits. Bits above [`TOTAL_LANES`] are dropped.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns the lane at bit position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`TOTAL_LANES`].
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        assert!(index < TOTAL_LANES, "lane index out of range");
        Self(1 << index)
    }

    /// Returns `true` if no lane is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if exactly one lane is set.
    #[inline]
    #[must_use]
    pub const fn is_single(self) -> bool {
        self.0 != 0 && self.0 & (self.0 - 1) == 0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of two sets.
    #[inline]
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// `self` without the lanes in `subset`.
    #[inline]
    #[must_use]
    pub const fn subtract(self, subset: Self) -> Self {
        Self(self.0 & !subset.0)
    }

    /// Returns `true` if every lane of `subset` is in `self`.
    ///
    /// The empty set is a subset of everything.
    #[inline]
    #[must_use]
    pub const fn is_superset_of(self, subset: Self) -> bool {
        self.0 & subset.0 == subset.0
    }

    /// Returns `true` if the sets share at least one lane.
    #[inline]
    #[must_use]
    pub const fn includes_some(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Isolates the highest-priority (lowest) bit.
    #[inline]
    #[must_use]
    pub const fn highest_priority_lane(self) -> Lane {
        Self(self.0 & self.0.wrapping_neg())
    }

    /// Returns the highest-priority lanes, widened to the whole pending group
    /// for classes that span several bits.
    ///
    /// If the highest lane is a transition lane, every transition lane in
    /// `self` is returned; likewise for retries.
    #[must_use]
    pub const fn highest_priority_lanes(self) -> Self {
        let lane = self.highest_priority_lane();
        if lane.0 & Self::TRANSITIONS.0 != 0 {
            Self(self.0 & Self::TRANSITIONS.0)
        } else if lane.0 & Self::RETRIES.0 != 0 {
            Self(self.0 & Self::RETRIES.0)
        } else {
            lane
        }
    }

    /// Returns whichever of two single lanes has higher priority.
    ///
    /// An empty lane never wins over a set one.
    #[inline]
    #[must_use]
    pub const fn higher_priority(a: Lane, b: Lane) -> Lane {
        if a.0 != 0 && a.0 < b.0 { a } else { b }
    }

    /// Bit index of the lowest-priority (highest) lane in the set.
    ///
    /// Returns `None` for the empty set.
    #[inline]
    #[must_use]
    pub const fn pick_arbitrary_index(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(31 - self.0.leading_zeros() as usize)
        }
    }

    /// The lowest-priority lane in the set.
    #[inline]
    #[must_use]
    pub const fn pick_arbitrary_lane(self) -> Lane {
        match self.pick_arbitrary_index() {
            Some(i) => Self(1 << i),
            None => Self::NONE,
        }
    }

    /// Bit index of a single lane.
    ///
    /// For a multi-lane set this is the index of the lowest-priority member.
    #[inline]
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        self.pick_arbitrary_index()
    }

    /// Number of lanes in the set.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the single lanes in the set, highest priority first.
    #[inline]
    #[must_use]
    pub fn iter(self) -> LaneIter {
        LaneIter { remaining: self }
    }

    // -- Class predicates --

    /// Includes the synchronous lane.
    #[inline]
    #[must_use]
    pub const fn includes_sync(self) -> bool {
        self.0 & Self::SYNC.0 != 0
    }

    /// Includes any non-idle lane.
    #[inline]
    #[must_use]
    pub const fn includes_non_idle_work(self) -> bool {
        self.0 & Self::NON_IDLE.0 != 0
    }

    /// Contains only retry lanes.
    #[inline]
    #[must_use]
    pub const fn includes_only_retries(self) -> bool {
        self.0 & Self::RETRIES.0 == self.0
    }

    /// Contains only transition lanes.
    #[inline]
    #[must_use]
    pub const fn includes_only_transitions(self) -> bool {
        self.0 & Self::TRANSITIONS.0 == self.0
    }

    /// Contains only lanes that may be deferred behind user input.
    #[inline]
    #[must_use]
    pub const fn includes_only_non_urgent(self) -> bool {
        let urgent = Self::SYNC.0 | Self::INPUT_CONTINUOUS.0 | Self::DEFAULT.0;
        self.0 & urgent == 0
    }

    /// Includes a lane that renders without time slicing by default.
    #[inline]
    #[must_use]
    pub const fn includes_blocking(self) -> bool {
        self.0 & Self::SYNC_DEFAULT.0 != 0
    }

    /// `true` if this single lane is a transition lane.
    #[inline]
    #[must_use]
    pub const fn is_transition(self) -> bool {
        self.0 & Self::TRANSITIONS.0 != 0
    }

    /// Short human-readable label for a single lane.
    #[must_use]
    pub fn label(self) -> &'static str {
        let lane = self.highest_priority_lane();
        if lane == Self::NONE {
            "None"
        } else if lane == Self::SYNC {
            "Sync"
        } else if lane == Self::INPUT_CONTINUOUS_HYDRATION {
            "InputContinuousHydration"
        } else if lane == Self::INPUT_CONTINUOUS {
            "InputContinuous"
        } else if lane == Self::DEFAULT_HYDRATION {
            "DefaultHydration"
        } else if lane == Self::DEFAULT {
            "Default"
        } else if lane == Self::TRANSITION_HYDRATION {
            "TransitionHydration"
        } else if lane.is_transition() {
            "Transition"
        } else if lane.includes_some(Self::RETRIES) {
            "Retry"
        } else if lane == Self::SELECTIVE_HYDRATION {
            "SelectiveHydration"
        } else if lane == Self::IDLE_HYDRATION {
            "IdleHydration"
        } else if lane == Self::IDLE {
            "Idle"
        } else {
            "Offscreen"
        }
    }
}

impl BitOr for Lanes {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl BitOrAssign for Lanes {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl BitAnd for Lanes {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        self.intersect(rhs)
    }
}

impl BitAndAssign for Lanes {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        *self = self.intersect(rhs);
    }
}

impl Not for Lanes {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lanes({:#033b})", self.0)
    }
}

impl fmt::Display for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let mut first = true;
        for lane in self.iter() {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(lane.label())?;
        }
        Ok(())
    }
}

/// Iterator over the single lanes of a [`Lanes`] set.
#[derive(Clone, Debug)]
pub struct LaneIter {
    remaining: Lanes,
}

impl Iterator for LaneIter {
    type Item = Lane;

    fn next(&mut self) -> Option<Lane> {
        if self.remaining.is_empty() {
            return None;
        }
        let lane = self.remaining.highest_priority_lane();
        self.remaining = self.remaining.subtract(lane);
        Some(lane)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for LaneIter {}

/// One value per lane, indexed by bit position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaneMap<T>([T; TOTAL_LANES]);

impl<T: Copy> LaneMap<T> {
    /// Creates a map with every entry set to `initial`.
    #[must_use]
    pub const fn new(initial: T) -> Self {
        Self([initial; TOTAL_LANES])
    }
}

impl<T> LaneMap<T> {
    /// Returns the entry for a lane index.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> &T {
        &self.0[index]
    }

    /// Returns the entry for a lane index mutably.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.0[index]
    }

    /// Iterates over `(lane, entry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Lane, &T)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, v)| (Lanes::from_index(i), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec::Vec;

    #[test]
    fn layout_matches_priority_order() {
        assert!(Lanes::SYNC < Lanes::INPUT_CONTINUOUS, "sync before input");
        assert!(Lanes::DEFAULT < Lanes::TRANSITION_1, "default before transitions");
        assert!(Lanes::RETRY_1 > Lanes::TRANSITIONS, "retries after transitions");
        assert_eq!(Lanes::TRANSITIONS.count(), 16, "sixteen transitions");
        assert_eq!(Lanes::RETRIES.count(), 5, "five retries");
        assert_eq!(Lanes::OFFSCREEN.index(), Some(30), "offscreen is the top bit");
        assert!(!Lanes::NON_IDLE.includes_some(Lanes::IDLE), "idle excluded");
    }

    #[test]
    fn highest_priority_lane_isolates_lowest_bit() {
        let set = Lanes::DEFAULT | Lanes::INPUT_CONTINUOUS | Lanes::IDLE;
        assert_eq!(set.highest_priority_lane(), Lanes::INPUT_CONTINUOUS, "lowest bit");
        assert_eq!(Lanes::NONE.highest_priority_lane(), Lanes::NONE, "empty");
    }

    #[test]
    fn highest_priority_lanes_widens_groups() {
        let t2 = Lanes::from_index(7);
        let set = Lanes::TRANSITION_1 | t2 | Lanes::IDLE;
        assert_eq!(set.highest_priority_lanes(), Lanes::TRANSITION_1 | t2, "whole transition group");
        let retries = Lanes::RETRY_1 | Lanes::from_index(23);
        assert_eq!(retries.highest_priority_lanes(), retries, "whole retry group");
        assert_eq!((Lanes::SYNC | Lanes::DEFAULT).highest_priority_lanes(), Lanes::SYNC, "single");
    }

    #[test]
    fn higher_priority_prefers_lower_bit() {
        assert_eq!(Lanes::higher_priority(Lanes::DEFAULT, Lanes::SYNC), Lanes::SYNC, "sync wins");
        assert_eq!(Lanes::higher_priority(Lanes::NONE, Lanes::IDLE), Lanes::IDLE, "empty loses");
    }

    #[test]
    fn subset_and_subtract() {
        let set = Lanes::SYNC | Lanes::DEFAULT;
        assert!(set.is_superset_of(Lanes::DEFAULT), "member");
        assert!(set.is_superset_of(Lanes::NONE), "empty subset");
        assert!(!set.is_superset_of(Lanes::IDLE), "non-member");
        assert_eq!(set.subtract(Lanes::SYNC), Lanes::DEFAULT, "subtract");
        assert_eq!(!Lanes::NON_IDLE, Lanes::IDLE_HYDRATION | Lanes::IDLE | Lanes::OFFSCREEN, "not stays in range");
    }

    #[test]
    fn iter_yields_in_priority_order() {
        let set = Lanes::IDLE | Lanes::SYNC | Lanes::DEFAULT;
        let lanes: Vec<_> = set.iter().collect();
        assert_eq!(lanes, [Lanes::SYNC, Lanes::DEFAULT, Lanes::IDLE], "ordered");
        assert_eq!(set.pick_arbitrary_lane(), Lanes::IDLE, "arbitrary picks the top bit");
    }

    #[test]
    fn display_lists_labels() {
        let set = Lanes::SYNC | Lanes::TRANSITION_1;
        assert_eq!(format!("{set}"), "Sync|Transition");
        assert_eq!(format!("{}", Lanes::NONE), "None");
    }

    #[test]
    fn lane_map_round_trips_by_index() {
        let mut map = LaneMap::new(0_u32);
        *map.get_mut(Lanes::DEFAULT.index().unwrap()) = 9;
        assert_eq!(*map.get(4), 9, "default is index 4");
        assert_eq!(map.iter().filter(|(_, v)| **v != 0).count(), 1, "one entry set");
    }

    #[test]
    #[should_panic(expected = "lane index out of range")]
    fn from_index_rejects_out_of_range() {
        let _ = Lanes::from_index(TOTAL_LANES);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn lanes() -> impl Strategy<Value = Lanes> {
            any::<u32>().prop_map(Lanes::from_bits)
        }

        proptest! {
            #[test]
            fn merge_of_subtracted_subset_restores_set(set in lanes(), mask in lanes()) {
                let a = set & mask;
                prop_assert_eq!(a.merge(set.subtract(a)), set);
            }

            #[test]
            fn highest_lane_is_single_member(set in lanes()) {
                let lane = set.highest_priority_lane();
                prop_assert!(set.is_empty() || (lane.is_single() && set.is_superset_of(lane)));
            }

            #[test]
            fn iter_partitions_the_set(set in lanes()) {
                let rebuilt = set.iter().fold(Lanes::NONE, Lanes::merge);
                prop_assert_eq!(rebuilt, set);
            }
        }
    }
}
