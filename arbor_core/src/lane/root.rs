// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-root lane bookkeeping: pending work, suspension, expiration and
//! entanglement.

use crate::config::ExpirationConfig;
use crate::time::Timestamp;

use super::bits::{Lane, LaneMap, Lanes};

/// Lane state of one tree root.
///
/// All selection decisions ([`next_lanes`](Self::next_lanes)) and the
/// starvation guard ([`mark_starved_lanes_as_expired`](Self::mark_starved_lanes_as_expired))
/// read from here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootLanes {
    /// Lanes with outstanding updates somewhere in the tree.
    pub pending: Lanes,
    /// Lanes whose last walk was parked waiting on data.
    pub suspended: Lanes,
    /// Suspended lanes that have since been told to retry.
    pub pinged: Lanes,
    /// Lanes that waited past their deadline and must render synchronously.
    pub expired: Lanes,
    /// Lanes that have entanglements recorded.
    pub entangled: Lanes,
    entanglements: LaneMap<Lanes>,
    event_times: LaneMap<Option<Timestamp>>,
    expiration_times: LaneMap<Option<Timestamp>>,
    next_transition: Lane,
    next_retry: Lane,
}

impl Default for RootLanes {
    fn default() -> Self {
        Self::new()
    }
}

impl RootLanes {
    /// Creates bookkeeping with nothing pending.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Lanes::NONE,
            suspended: Lanes::NONE,
            pinged: Lanes::NONE,
            expired: Lanes::NONE,
            entangled: Lanes::NONE,
            entanglements: LaneMap::new(Lanes::NONE),
            event_times: LaneMap::new(None),
            expiration_times: LaneMap::new(None),
            next_transition: Lanes::TRANSITION_1,
            next_retry: Lanes::RETRY_1,
        }
    }

    /// Picks the lanes to walk next.
    ///
    /// `wip` is the lane set of the walk currently in progress, or
    /// [`Lanes::NONE`]. Returning `wip` unchanged means "keep going".
    #[must_use]
    pub fn next_lanes(&self, wip: Lanes) -> Lanes {
        let next = select_next_lanes(self.pending, self.suspended, self.pinged, wip);
        if next == wip {
            return next;
        }
        self.with_entangled(next)
    }

    /// Unions the entangled partners of every lane in `lanes`.
    #[must_use]
    pub fn with_entangled(&self, mut lanes: Lanes) -> Lanes {
        let mut remaining = lanes & self.entangled;
        while let Some(index) = remaining.pick_arbitrary_index() {
            lanes |= *self.entanglements.get(index);
            remaining = remaining.subtract(Lanes::from_index(index));
        }
        lanes
    }

    /// Records a new update on `lane` at `event_time`.
    ///
    /// Any non-idle update clears the suspended and pinged sets, since the
    /// new update may unblock a suspended tree.
    pub fn mark_updated(&mut self, lane: Lane, event_time: Timestamp) {
        self.pending |= lane;
        if lane != Lanes::IDLE {
            self.suspended = Lanes::NONE;
            self.pinged = Lanes::NONE;
        }
        if let Some(index) = lane.index() {
            *self.event_times.get_mut(index) = Some(event_time);
        }
    }

    /// Parks `lanes`. Their expiration clocks are reset.
    pub fn mark_suspended(&mut self, lanes: Lanes) {
        self.suspended |= lanes;
        self.pinged = self.pinged.subtract(lanes);
        for lane in lanes.iter() {
            if let Some(index) = lane.index() {
                *self.expiration_times.get_mut(index) = None;
            }
        }
    }

    /// Marks suspended `lanes` as ready to retry.
    pub fn mark_pinged(&mut self, lanes: Lanes) {
        self.pinged |= self.suspended & lanes;
    }

    /// Records a commit. `remaining` is what is still pending afterwards.
    pub fn mark_finished(&mut self, remaining: Lanes) {
        let no_longer_pending = self.pending.subtract(remaining);
        self.pending = remaining;
        self.suspended = Lanes::NONE;
        self.pinged = Lanes::NONE;
        self.expired &= remaining;
        self.entangled &= remaining;
        for lane in no_longer_pending.iter() {
            if let Some(index) = lane.index() {
                *self.entanglements.get_mut(index) = Lanes::NONE;
                *self.event_times.get_mut(index) = None;
                *self.expiration_times.get_mut(index) = None;
            }
        }
    }

    /// Requires every lane in `lanes` to render in the same batch.
    ///
    /// Entanglement is transitive: any lane already entangled with a member
    /// of `lanes` picks up the whole set.
    pub fn mark_entangled(&mut self, lanes: Lanes) {
        self.entangled |= lanes;
        for lane in self.entangled.iter() {
            let Some(index) = lane.index() else { continue };
            let entry = self.entanglements.get_mut(index);
            if lane.includes_some(lanes) || entry.includes_some(lanes) {
                *entry |= lanes;
            }
        }
    }

    /// Starvation guard.
    ///
    /// Lanes without an expiration time get one (unless suspended and not
    /// pinged). Lanes whose time has passed join [`expired`](Self::expired).
    /// Returns the lanes that became expired in this call.
    pub fn mark_starved_lanes_as_expired(
        &mut self,
        now: Timestamp,
        config: &ExpirationConfig,
    ) -> Lanes {
        let before = self.expired;
        for lane in self.pending.iter() {
            let Some(index) = lane.index() else { continue };
            match *self.expiration_times.get(index) {
                None => {
                    if !lane.includes_some(self.suspended) || lane.includes_some(self.pinged) {
                        *self.expiration_times.get_mut(index) = config.expiration_time(lane, now);
                    }
                }
                Some(deadline) if deadline <= now => self.expired |= lane,
                Some(_) => {}
            }
        }
        self.expired.subtract(before)
    }

    /// Returns `true` if any lane in `lanes` has expired.
    #[must_use]
    pub const fn includes_expired(&self, lanes: Lanes) -> bool {
        self.expired.includes_some(lanes)
    }

    /// Lanes to retry synchronously after a walk error.
    #[must_use]
    pub fn lanes_to_retry_on_error(&self) -> Lanes {
        let everything_but_offscreen = self.pending.subtract(Lanes::OFFSCREEN);
        if !everything_but_offscreen.is_empty() {
            everything_but_offscreen
        } else if self.pending.includes_some(Lanes::OFFSCREEN) {
            Lanes::OFFSCREEN
        } else {
            Lanes::NONE
        }
    }

    /// Latest event time recorded for any lane in `lanes`.
    #[must_use]
    pub fn most_recent_event_time(&self, lanes: Lanes) -> Option<Timestamp> {
        lanes
            .iter()
            .filter_map(|lane| lane.index().and_then(|i| *self.event_times.get(i)))
            .max()
    }

    /// Expiration deadline of a single lane, if one has been set.
    #[must_use]
    pub fn expiration_time(&self, lane: Lane) -> Option<Timestamp> {
        lane.index().and_then(|i| *self.expiration_times.get(i))
    }

    /// Lanes entangled with `lane`.
    #[must_use]
    pub fn entanglements_of(&self, lane: Lane) -> Lanes {
        lane.index()
            .map_or(Lanes::NONE, |i| *self.entanglements.get(i))
    }

    // -- Lane claiming --

    /// Hands out transition lanes round-robin so unrelated transitions do
    /// not batch together.
    pub fn claim_next_transition_lane(&mut self) -> Lane {
        let lane = self.next_transition;
        self.next_transition = Lanes::from_bits(lane.bits() << 1);
        if !self.next_transition.includes_some(Lanes::TRANSITIONS) {
            self.next_transition = Lanes::TRANSITION_1;
        }
        lane
    }

    /// Hands out retry lanes round-robin.
    pub fn claim_next_retry_lane(&mut self) -> Lane {
        let lane = self.next_retry;
        self.next_retry = Lanes::from_bits(lane.bits() << 1);
        if !self.next_retry.includes_some(Lanes::RETRIES) {
            self.next_retry = Lanes::RETRY_1;
        }
        lane
    }
}

/// Lane selection without entanglement.
///
/// Prefers non-idle work, then unsuspended over pinged lanes. A walk in
/// progress on `wip` keeps going unless the new choice is strictly higher
/// priority (and a default update never interrupts a transition). When
/// continuous input is selected, pending default work joins the batch.
#[must_use]
pub fn select_next_lanes(pending: Lanes, suspended: Lanes, pinged: Lanes, wip: Lanes) -> Lanes {
    if pending.is_empty() {
        return Lanes::NONE;
    }

    let non_idle_pending = pending & Lanes::NON_IDLE;
    let mut next = if !non_idle_pending.is_empty() {
        let unblocked = non_idle_pending.subtract(suspended);
        if !unblocked.is_empty() {
            unblocked.highest_priority_lanes()
        } else {
            (non_idle_pending & pinged).highest_priority_lanes()
        }
    } else {
        let unblocked = pending.subtract(suspended);
        if !unblocked.is_empty() {
            unblocked.highest_priority_lanes()
        } else {
            pinged.highest_priority_lanes()
        }
    };

    if next.is_empty() {
        return Lanes::NONE;
    }

    if !wip.is_empty() && wip != next && !wip.includes_some(suspended) {
        let next_lane = next.highest_priority_lane();
        let wip_lane = wip.highest_priority_lane();
        if next_lane >= wip_lane
            || (next_lane == Lanes::DEFAULT && wip_lane.includes_some(Lanes::TRANSITIONS))
        {
            return wip;
        }
    }

    if next.includes_some(Lanes::INPUT_CONTINUOUS) {
        next |= pending & Lanes::DEFAULT;
    }
    next
}
