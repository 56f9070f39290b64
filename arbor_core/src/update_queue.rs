// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update queues and priority rebasing.
//!
//! Every stateful thing in the tree (the root, a stateful component, each
//! state cell of a function component) keeps two lists:
//!
//! - a [`SharedQueue`] of updates not yet merged into any committed result,
//!   owned by the entity and shared by both buffered copies;
//! - an [`UpdateQueue`] of *base* updates carried over from a previous pass
//!   because their lane was not rendered, together with the state the
//!   carried-over list starts from.
//!
//! [`rebase`] merges the two for one pass. Updates whose lane is outside
//! the render lanes are deferred with their lane intact; once one update is
//! deferred, every later update is also copied into the deferred list (with
//! its lane cleared), so replaying the deferred list from the saved base
//! state reproduces insertion order exactly.
//!
//! ```text
//!  base: [A1 B2]  pending: [C1 D2]  render lanes: 1
//!
//!   state  = A·C applied            (B and D skipped)
//!   base'  = state after A
//!   list'  = [B2 C0 D2]             (C re-queued with lane 0 = always applies)
//! ```

use alloc::vec::Vec;
use core::fmt;

use serde_json::Value;

use crate::lane::{Lane, Lanes};

/// One queued change.
///
/// Immutable once queued except for the lane, which is cleared to
/// [`Lanes::NONE`] ("always applies") when the change is re-queued after
/// being applied once.
#[derive(Clone, Debug, PartialEq)]
pub struct Update<A> {
    /// Priority of the change.
    pub lane: Lane,
    /// Payload.
    pub action: A,
}

impl<A> Update<A> {
    /// Creates an update.
    #[must_use]
    pub const fn new(lane: Lane, action: A) -> Self {
        Self { lane, action }
    }
}

/// Updates waiting to be picked up by a walk.
///
/// While a walk is in progress, new updates go to the interleaved list so
/// the walk's view of `pending` stays fixed. The interleaved list is merged
/// into `pending` at the end of every pass.
#[derive(Clone, Debug)]
pub struct SharedQueue<A> {
    pending: Vec<Update<A>>,
    interleaved: Vec<Update<A>>,
    lanes: Lanes,
}

impl<A> Default for SharedQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> SharedQueue<A> {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            interleaved: Vec::new(),
            lanes: Lanes::NONE,
        }
    }

    /// Appends an update, to the interleaved list if a walk is running.
    pub fn enqueue(&mut self, update: Update<A>, walk_in_progress: bool) {
        if walk_in_progress {
            self.interleaved.push(update);
        } else {
            self.pending.push(update);
        }
    }

    /// Updates visible to the current walk, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[Update<A>] {
        &self.pending
    }

    /// Updates that arrived during the current walk.
    #[must_use]
    pub fn interleaved(&self) -> &[Update<A>] {
        &self.interleaved
    }

    /// Removes the first `count` pending updates after a commit merged them
    /// into the base list.
    pub fn drain_processed(&mut self, count: usize) {
        let count = count.min(self.pending.len());
        self.pending.drain(..count);
    }

    /// Moves interleaved updates to the end of `pending`. Returns `true` if
    /// anything moved.
    pub fn flush_interleaved(&mut self) -> bool {
        if self.interleaved.is_empty() {
            return false;
        }
        self.pending.append(&mut self.interleaved);
        true
    }

    /// `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.interleaved.is_empty()
    }

    /// Transition lanes this queue has been entangled with.
    #[must_use]
    pub const fn lanes(&self) -> Lanes {
        self.lanes
    }

    /// Records a transition update on this queue.
    ///
    /// Transitions on the same queue must commit together, so the lanes
    /// still pending on the root are kept and joined with `lane`. Returns the
    /// set to entangle on the root, or `None` for non-transition lanes.
    pub fn entangle_transition(&mut self, lane: Lane, root_pending: Lanes) -> Option<Lanes> {
        if !lane.is_transition() {
            return None;
        }
        self.lanes = (self.lanes & root_pending) | lane;
        Some(self.lanes)
    }
}

/// Carried-over updates and the state they start from.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateQueue<S, A> {
    /// State before the first carried-over update.
    pub base_state: S,
    /// Updates deferred by an earlier pass, in insertion order.
    pub base: Vec<Update<A>>,
}

impl<S, A> UpdateQueue<S, A> {
    /// A queue with nothing carried over.
    #[must_use]
    pub const fn new(base_state: S) -> Self {
        Self {
            base_state,
            base: Vec::new(),
        }
    }

    /// Lanes of the carried-over updates.
    #[must_use]
    pub fn base_lanes(&self) -> Lanes {
        self.base.iter().fold(Lanes::NONE, |acc, u| acc | u.lane)
    }
}

/// Result of one [`rebase`] pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Rebased<S, A> {
    /// State after applying every update with sufficient priority.
    pub state: S,
    /// Queue to carry into the next pass.
    pub queue: UpdateQueue<S, A>,
    /// Lanes of the deferred updates.
    pub remaining: Lanes,
}

/// Merges `pending` onto the carried-over list and applies it for
/// `render_lanes`.
///
/// Convergence: however the lanes are split across passes, once every lane
/// has been rendered the final state equals applying all updates in order
/// from the original base state.
pub fn rebase<S, A>(
    queue: &UpdateQueue<S, A>,
    pending: &[Update<A>],
    render_lanes: Lanes,
    mut reduce: impl FnMut(&S, &A) -> S,
) -> Rebased<S, A>
where
    S: Clone,
    A: Clone,
{
    let mut state = queue.base_state.clone();
    let mut new_base_state = None;
    let mut deferred: Vec<Update<A>> = Vec::new();
    let mut remaining = Lanes::NONE;

    for update in queue.base.iter().chain(pending) {
        if !render_lanes.is_superset_of(update.lane) {
            if deferred.is_empty() {
                new_base_state = Some(state.clone());
            }
            deferred.push(update.clone());
            remaining |= update.lane;
        } else {
            if !deferred.is_empty() {
                deferred.push(Update::new(Lanes::NONE, update.action.clone()));
            }
            state = reduce(&state, &update.action);
        }
    }

    let base_state = new_base_state.unwrap_or_else(|| state.clone());
    Rebased {
        state,
        queue: UpdateQueue {
            base_state,
            base: deferred,
        },
        remaining,
    }
}

/// A change to a stateful component's object state.
#[derive(Clone)]
pub enum StateUpdate {
    /// Shallow-merge a partial object into the state.
    Merge(Value),
    /// Replace the state.
    Replace(Value),
    /// Compute a partial object from the previous state and merge it.
    MergeWith(alloc::rc::Rc<dyn Fn(&Value) -> Value>),
    /// Re-render even if the state is unchanged.
    Force,
}

impl StateUpdate {
    /// Applies this update to `prev`.
    ///
    /// A `null` partial leaves the state as is; a non-object partial
    /// replaces it.
    #[must_use]
    pub fn apply(&self, prev: &Value) -> Value {
        match self {
            Self::Merge(partial) => merge_partial(prev, partial),
            Self::Replace(next) => next.clone(),
            Self::MergeWith(f) => merge_partial(prev, &f(prev)),
            Self::Force => prev.clone(),
        }
    }

    /// `true` for [`Force`](Self::Force).
    #[must_use]
    pub const fn is_force(&self) -> bool {
        matches!(self, Self::Force)
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge(v) => write!(f, "Merge({v})"),
            Self::Replace(v) => write!(f, "Replace({v})"),
            Self::MergeWith(_) => f.write_str("MergeWith(..)"),
            Self::Force => f.write_str("Force"),
        }
    }
}

fn merge_partial(prev: &Value, partial: &Value) -> Value {
    match (prev, partial) {
        (_, Value::Null) => prev.clone(),
        (Value::Object(base), Value::Object(delta)) => {
            let mut merged = base.clone();
            for (k, v) in delta {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => partial.clone(),
    }
}
