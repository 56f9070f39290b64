// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciler configuration.
//!
//! [`ExpirationConfig`] is the lane-class timeout table used by the
//! starvation guard. [`ReconcilerConfig`] bundles it with the walk limits.

use crate::lane::{Lane, Lanes};
use crate::time::{Duration, Timestamp};

/// How long each lane class may wait before it is forced to render
/// synchronously.
///
/// `None` means the class never expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpirationConfig {
    /// Sync and continuous input (and their hydration lanes).
    pub sync: Option<Duration>,
    /// Default and default hydration.
    pub default: Option<Duration>,
    /// Transition lanes and transition hydration.
    pub transition: Option<Duration>,
    /// Retry lanes.
    pub retry: Option<Duration>,
    /// Selective hydration, idle and offscreen lanes.
    pub idle: Option<Duration>,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpirationConfig {
    /// Interactive classes expire after 250 ms, default and transition work
    /// after 5 s, the rest never.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sync: Some(Duration(250)),
            default: Some(Duration(5_000)),
            transition: Some(Duration(5_000)),
            retry: None,
            idle: None,
        }
    }

    /// A table where nothing expires.
    #[must_use]
    pub const fn never() -> Self {
        Self {
            sync: None,
            default: None,
            transition: None,
            retry: None,
            idle: None,
        }
    }

    /// Overrides the sync/continuous timeout.
    #[must_use]
    pub const fn with_sync(mut self, timeout: Option<Duration>) -> Self {
        self.sync = timeout;
        self
    }

    /// Overrides the default-lane timeout.
    #[must_use]
    pub const fn with_default(mut self, timeout: Option<Duration>) -> Self {
        self.default = timeout;
        self
    }

    /// Overrides the transition timeout.
    #[must_use]
    pub const fn with_transition(mut self, timeout: Option<Duration>) -> Self {
        self.transition = timeout;
        self
    }

    /// Overrides the retry timeout.
    #[must_use]
    pub const fn with_retry(mut self, timeout: Option<Duration>) -> Self {
        self.retry = timeout;
        self
    }

    /// Overrides the timeout for idle and offscreen lanes.
    #[must_use]
    pub const fn with_idle(mut self, timeout: Option<Duration>) -> Self {
        self.idle = timeout;
        self
    }

    /// Timeout for a single lane.
    #[must_use]
    pub const fn timeout_for(&self, lane: Lane) -> Option<Duration> {
        let bits = lane.bits();
        if bits == 0 {
            None
        } else if bits <= Lanes::INPUT_CONTINUOUS.bits() {
            self.sync
        } else if bits <= Lanes::DEFAULT.bits() {
            self.default
        } else if bits == Lanes::TRANSITION_HYDRATION.bits() || lane.is_transition() {
            self.transition
        } else if lane.includes_some(Lanes::RETRIES) {
            self.retry
        } else {
            self.idle
        }
    }

    /// Deadline for `lane` if it becomes pending at `now`.
    #[must_use]
    pub const fn expiration_time(&self, lane: Lane, now: Timestamp) -> Option<Timestamp> {
        match self.timeout_for(lane) {
            Some(timeout) => Some(now.saturating_add(timeout)),
            None => None,
        }
    }
}

/// Top-level reconciler configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconcilerConfig {
    /// Lane expiration table.
    pub expiration: ExpirationConfig,
    /// Time-slice default and continuous-input walks instead of running
    /// them to completion.
    pub time_slice_default_updates: bool,
    /// Maximum consecutive re-renders of one component caused by updates it
    /// schedules on itself while rendering.
    pub rerender_limit: u32,
    /// Maximum consecutive synchronous commits each caused by updates
    /// scheduled during the previous walk.
    pub nested_update_limit: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcilerConfig {
    /// Default limits: 25 re-renders, 50 nested updates.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            expiration: ExpirationConfig::new(),
            time_slice_default_updates: false,
            rerender_limit: 25,
            nested_update_limit: 50,
        }
    }

    /// Configuration that time-slices every non-sync walk.
    #[must_use]
    pub const fn concurrent() -> Self {
        Self {
            time_slice_default_updates: true,
            ..Self::new()
        }
    }
}
