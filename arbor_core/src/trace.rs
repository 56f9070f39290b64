// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for walks and commits.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! the driver calls as walks start, yield, get abandoned and commit. All
//! method bodies default to no-ops, so implementing only the events you care
//! about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`WalkSummaryBuilder`] collects counters while a walk runs and produces a
//! [`WalkSummary`] when it ends.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): adds the full mutation list of every
//!   commit via [`TraceSink::on_mutations`].

use crate::lane::Lanes;
use crate::node::EntityId;
use crate::time::{Duration, Timestamp};

#[cfg(feature = "trace-rich")]
use crate::host::Mutation;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a walk ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WalkEnd {
    /// The walk finished and its result was committed.
    Committed,
    /// The walk was discarded in favor of different lanes.
    Abandoned,
    /// The walk stopped on a fatal error.
    Failed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a fresh walk begins.
#[derive(Clone, Copy, Debug)]
pub struct WalkStartEvent {
    /// Monotonic walk counter.
    pub walk_index: u64,
    /// Lanes being rendered.
    pub lanes: Lanes,
    /// Whether the walk runs without yielding.
    pub sync: bool,
    /// Whether this is the synchronous retry after an error.
    pub retry: bool,
    /// Host time at the start.
    pub now: Timestamp,
}

/// Emitted when a time-sliced walk returns control to the host.
#[derive(Clone, Copy, Debug)]
pub struct WalkYieldEvent {
    /// Walk counter.
    pub walk_index: u64,
    /// Lanes being rendered.
    pub lanes: Lanes,
    /// Units of work done so far.
    pub units: u32,
    /// Host time of the yield.
    pub now: Timestamp,
}

/// Emitted when an in-progress walk is discarded.
#[derive(Clone, Copy, Debug)]
pub struct WalkAbandonEvent {
    /// Walk counter.
    pub walk_index: u64,
    /// Lanes that were being rendered.
    pub lanes: Lanes,
    /// Lanes that will be rendered instead (empty if none).
    pub next: Lanes,
    /// Units of work thrown away.
    pub units: u32,
    /// Host time of the abandonment.
    pub now: Timestamp,
}

/// Emitted after a walk's mutations were applied.
#[derive(Clone, Copy, Debug)]
pub struct CommitEvent {
    /// Walk counter.
    pub walk_index: u64,
    /// Lanes that were rendered.
    pub lanes: Lanes,
    /// Number of host mutations applied.
    pub mutations: u32,
    /// Number of entities removed.
    pub removed_entities: u32,
    /// Lanes still pending after the commit.
    pub remaining: Lanes,
    /// Host time of the commit.
    pub now: Timestamp,
}

/// Emitted when a node's work is skipped because nothing it depends on
/// changed.
#[derive(Clone, Copy, Debug)]
pub struct BailoutEvent {
    /// Walk counter.
    pub walk_index: u64,
    /// Entity that bailed out.
    pub entity: EntityId,
    /// Whether its whole subtree was skipped too.
    pub subtree_skipped: bool,
}

/// Emitted when lanes waited past their deadline and were forced to render
/// synchronously.
#[derive(Clone, Copy, Debug)]
pub struct LanesExpiredEvent {
    /// Lanes that just expired.
    pub lanes: Lanes,
    /// Host time of the check.
    pub now: Timestamp,
}

/// Per-walk summary produced by [`WalkSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct WalkSummary {
    /// Walk counter.
    pub walk_index: u64,
    /// Lanes rendered.
    pub lanes: Lanes,
    /// Whether the walk ran without yielding.
    pub sync: bool,
    /// Units of work performed.
    pub units: u32,
    /// Number of times the walk yielded.
    pub yields: u32,
    /// Host time at the start.
    pub started_at: Timestamp,
    /// Wall time from start to end, yields included.
    pub duration: Duration,
    /// How the walk ended.
    pub end: WalkEnd,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the driver.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a fresh walk begins.
    fn on_walk_start(&mut self, e: &WalkStartEvent) {
        _ = e;
    }

    /// Called when a walk yields to the host.
    fn on_walk_yield(&mut self, e: &WalkYieldEvent) {
        _ = e;
    }

    /// Called when a walk is abandoned.
    fn on_walk_abandon(&mut self, e: &WalkAbandonEvent) {
        _ = e;
    }

    /// Called after a commit.
    fn on_commit(&mut self, e: &CommitEvent) {
        _ = e;
    }

    /// Called when a node bails out.
    fn on_bailout(&mut self, e: &BailoutEvent) {
        _ = e;
    }

    /// Called when lanes expire.
    fn on_lanes_expired(&mut self, e: &LanesExpiredEvent) {
        _ = e;
    }

    /// Called with a per-walk summary when a walk ends.
    fn on_walk_summary(&mut self, s: &WalkSummary) {
        _ = s;
    }

    /// Called with every mutation of a commit (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_mutations(&mut self, walk_index: u64, mutations: &[Mutation]) {
        _ = (walk_index, mutations);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`WalkStartEvent`].
    #[inline]
    pub fn walk_start(&mut self, e: &WalkStartEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_walk_start(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`WalkYieldEvent`].
    #[inline]
    pub fn walk_yield(&mut self, e: &WalkYieldEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_walk_yield(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`WalkAbandonEvent`].
    #[inline]
    pub fn walk_abandon(&mut self, e: &WalkAbandonEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_walk_abandon(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CommitEvent`].
    #[inline]
    pub fn commit(&mut self, e: &CommitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_commit(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`BailoutEvent`].
    #[inline]
    pub fn bailout(&mut self, e: &BailoutEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_bailout(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LanesExpiredEvent`].
    #[inline]
    pub fn lanes_expired(&mut self, e: &LanesExpiredEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_lanes_expired(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`WalkSummary`].
    #[inline]
    pub fn walk_summary(&mut self, s: &WalkSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_walk_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits the mutations of a commit (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn mutations(&mut self, walk_index: u64, mutations: &[Mutation]) {
        if let Some(s) = &mut self.sink {
            s.on_mutations(walk_index, mutations);
        }
    }
}

// ---------------------------------------------------------------------------
// WalkSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects counters during a walk and produces a [`WalkSummary`].
#[derive(Clone, Copy, Debug)]
pub struct WalkSummaryBuilder {
    start: WalkStartEvent,
    units: u32,
    yields: u32,
    sync: bool,
}

impl WalkSummaryBuilder {
    /// Starts building a summary for the given walk.
    #[must_use]
    pub fn new(start: &WalkStartEvent) -> Self {
        Self {
            start: *start,
            units: 0,
            yields: 0,
            sync: start.sync,
        }
    }

    /// Records units of work.
    pub fn add_units(&mut self, units: u32) {
        self.units = self.units.saturating_add(units);
    }

    /// Records a yield.
    pub fn record_yield(&mut self) {
        self.yields = self.yields.saturating_add(1);
    }

    /// Records that the walk switched to running without yielding.
    pub fn set_sync(&mut self) {
        self.sync = true;
    }

    /// Units recorded so far.
    #[must_use]
    pub const fn units(&self) -> u32 {
        self.units
    }

    /// Start event the builder was created from.
    #[must_use]
    pub const fn start(&self) -> &WalkStartEvent {
        &self.start
    }

    /// Consumes the builder and produces the final [`WalkSummary`].
    #[must_use]
    pub fn finish(self, end: WalkEnd, now: Timestamp) -> WalkSummary {
        WalkSummary {
            walk_index: self.start.walk_index,
            lanes: self.start.lanes,
            sync: self.sync,
            units: self.units,
            yields: self.yields,
            started_at: self.start.now,
            duration: now.saturating_duration_since(self.start.now),
            end,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
