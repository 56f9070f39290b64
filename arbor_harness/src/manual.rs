// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A host scheduler driven entirely by the test.

use arbor_core::{Duration, HostScheduler, SchedulerPriority, Timestamp};

/// Deterministic [`HostScheduler`] with a virtual clock and scripted
/// yields.
///
/// Work requests are recorded, not run: the test decides when to call
/// [`Reconciler::perform_work`](arbor_core::Reconciler::perform_work).
///
/// ```
/// use arbor_harness::ManualScheduler;
/// use arbor_core::{HostScheduler, Timestamp};
///
/// let mut s = ManualScheduler::new();
/// s.yield_after(2);
/// assert!(!s.should_yield());
/// assert!(!s.should_yield());
/// assert!(s.should_yield());
/// s.advance_ms(16);
/// assert_eq!(s.now(), Timestamp(16));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    now: Timestamp,
    budget: Option<u32>,
    unit_cost: Duration,
    requests: Vec<SchedulerPriority>,
}

impl ManualScheduler {
    /// A scheduler at time zero that never asks to yield.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `units` more units of work run, then yields until the budget is
    /// reset.
    pub fn yield_after(&mut self, units: u32) {
        self.budget = Some(units);
    }

    /// Never yields.
    pub fn never_yield(&mut self) {
        self.budget = None;
    }

    /// Advances the clock by `cost` every time the reconciler checks for a
    /// yield.
    pub fn set_unit_cost(&mut self, cost: Duration) {
        self.unit_cost = cost;
    }

    /// Moves the clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.now = self.now + by;
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance_ms(&mut self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Every `schedule_work` call so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> &[SchedulerPriority] {
        &self.requests
    }

    /// The most recent `schedule_work` priority.
    #[must_use]
    pub fn last_request(&self) -> Option<SchedulerPriority> {
        self.requests.last().copied()
    }

    /// Forgets recorded requests, returning them.
    pub fn take_requests(&mut self) -> Vec<SchedulerPriority> {
        core::mem::take(&mut self.requests)
    }
}

impl HostScheduler for ManualScheduler {
    fn schedule_work(&mut self, priority: SchedulerPriority) {
        self.requests.push(priority);
    }

    fn should_yield(&mut self) -> bool {
        self.now = self.now + self.unit_cost;
        match self.budget.as_mut() {
            None => false,
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
        }
    }

    fn now(&self) -> Timestamp {
        self.now
    }
}
