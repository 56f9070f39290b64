// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Mutation lists ([`on_mutations`](TraceSink::on_mutations)) store only the
//! count.

use arbor_core::time::{Duration, Timestamp};
use arbor_core::trace::{
    BailoutEvent, CommitEvent, LanesExpiredEvent, TraceSink, WalkAbandonEvent, WalkEnd,
    WalkStartEvent, WalkSummary, WalkYieldEvent,
};
use arbor_core::{EntityId, Lanes, Mutation};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_WALK_START: u8 = 1;
const TAG_WALK_YIELD: u8 = 2;
const TAG_WALK_ABANDON: u8 = 3;
const TAG_COMMIT: u8 = 4;
const TAG_BAILOUT: u8 = 5;
const TAG_LANES_EXPIRED: u8 = 6;
const TAG_WALK_SUMMARY: u8 = 7;
const TAG_MUTATIONS_COUNT: u8 = 8;

const FLAG_SYNC: u8 = 0b01;
const FLAG_RETRY: u8 = 0b10;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_lanes(&mut self, lanes: Lanes) {
        self.write_u32(lanes.bits());
    }

    fn write_time(&mut self, t: Timestamp) {
        self.write_u64(t.millis());
    }

    fn write_end(&mut self, end: WalkEnd) {
        self.write_u8(match end {
            WalkEnd::Committed => 0,
            WalkEnd::Abandoned => 1,
            WalkEnd::Failed => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_walk_start(&mut self, e: &WalkStartEvent) {
        self.write_u8(TAG_WALK_START);
        self.write_u64(e.walk_index);
        self.write_lanes(e.lanes);
        let mut flags = 0;
        if e.sync {
            flags |= FLAG_SYNC;
        }
        if e.retry {
            flags |= FLAG_RETRY;
        }
        self.write_u8(flags);
        self.write_time(e.now);
    }

    fn on_walk_yield(&mut self, e: &WalkYieldEvent) {
        self.write_u8(TAG_WALK_YIELD);
        self.write_u64(e.walk_index);
        self.write_lanes(e.lanes);
        self.write_u32(e.units);
        self.write_time(e.now);
    }

    fn on_walk_abandon(&mut self, e: &WalkAbandonEvent) {
        self.write_u8(TAG_WALK_ABANDON);
        self.write_u64(e.walk_index);
        self.write_lanes(e.lanes);
        self.write_lanes(e.next);
        self.write_u32(e.units);
        self.write_time(e.now);
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.write_u8(TAG_COMMIT);
        self.write_u64(e.walk_index);
        self.write_lanes(e.lanes);
        self.write_u32(e.mutations);
        self.write_u32(e.removed_entities);
        self.write_lanes(e.remaining);
        self.write_time(e.now);
    }

    fn on_bailout(&mut self, e: &BailoutEvent) {
        self.write_u8(TAG_BAILOUT);
        self.write_u64(e.walk_index);
        self.write_u32(e.entity.index());
        self.write_u32(e.entity.generation());
        self.write_u8(u8::from(e.subtree_skipped));
    }

    fn on_lanes_expired(&mut self, e: &LanesExpiredEvent) {
        self.write_u8(TAG_LANES_EXPIRED);
        self.write_lanes(e.lanes);
        self.write_time(e.now);
    }

    fn on_walk_summary(&mut self, s: &WalkSummary) {
        self.write_u8(TAG_WALK_SUMMARY);
        self.write_u64(s.walk_index);
        self.write_lanes(s.lanes);
        self.write_u8(u8::from(s.sync));
        self.write_u32(s.units);
        self.write_u32(s.yields);
        self.write_time(s.started_at);
        self.write_u64(s.duration.millis());
        self.write_end(s.end);
    }

    fn on_mutations(&mut self, walk_index: u64, mutations: &[Mutation]) {
        self.write_u8(TAG_MUTATIONS_COUNT);
        self.write_u64(walk_index);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "mutation count capped at u32::MAX for recording"
        )]
        self.write_u32(mutations.len().min(u32::MAX as usize) as u32);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`WalkStartEvent`].
    WalkStart(WalkStartEvent),
    /// A [`WalkYieldEvent`].
    WalkYield(WalkYieldEvent),
    /// A [`WalkAbandonEvent`].
    WalkAbandon(WalkAbandonEvent),
    /// A [`CommitEvent`].
    Commit(CommitEvent),
    /// A [`BailoutEvent`].
    Bailout(BailoutEvent),
    /// A [`LanesExpiredEvent`].
    LanesExpired(LanesExpiredEvent),
    /// A [`WalkSummary`].
    WalkSummary(WalkSummary),
    /// Mutation count of a commit.
    MutationsCount {
        /// Walk counter.
        walk_index: u64,
        /// Number of mutations.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_lanes(&mut self) -> Option<Lanes> {
        self.read_u32().map(Lanes::from_bits)
    }

    fn read_time(&mut self) -> Option<Timestamp> {
        self.read_u64().map(Timestamp)
    }

    fn read_end(&mut self) -> Option<WalkEnd> {
        Some(match self.read_u8()? {
            0 => WalkEnd::Committed,
            1 => WalkEnd::Abandoned,
            _ => WalkEnd::Failed,
        })
    }

    fn decode_walk_start(&mut self) -> Option<RecordedEvent> {
        let walk_index = self.read_u64()?;
        let lanes = self.read_lanes()?;
        let flags = self.read_u8()?;
        Some(RecordedEvent::WalkStart(WalkStartEvent {
            walk_index,
            lanes,
            sync: flags & FLAG_SYNC != 0,
            retry: flags & FLAG_RETRY != 0,
            now: self.read_time()?,
        }))
    }

    fn decode_walk_yield(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WalkYield(WalkYieldEvent {
            walk_index: self.read_u64()?,
            lanes: self.read_lanes()?,
            units: self.read_u32()?,
            now: self.read_time()?,
        }))
    }

    fn decode_walk_abandon(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WalkAbandon(WalkAbandonEvent {
            walk_index: self.read_u64()?,
            lanes: self.read_lanes()?,
            next: self.read_lanes()?,
            units: self.read_u32()?,
            now: self.read_time()?,
        }))
    }

    fn decode_commit(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Commit(CommitEvent {
            walk_index: self.read_u64()?,
            lanes: self.read_lanes()?,
            mutations: self.read_u32()?,
            removed_entities: self.read_u32()?,
            remaining: self.read_lanes()?,
            now: self.read_time()?,
        }))
    }

    fn decode_bailout(&mut self) -> Option<RecordedEvent> {
        let walk_index = self.read_u64()?;
        let idx = self.read_u32()?;
        let generation = self.read_u32()?;
        Some(RecordedEvent::Bailout(BailoutEvent {
            walk_index,
            entity: EntityId::from_raw(idx, generation),
            subtree_skipped: self.read_u8()? != 0,
        }))
    }

    fn decode_lanes_expired(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::LanesExpired(LanesExpiredEvent {
            lanes: self.read_lanes()?,
            now: self.read_time()?,
        }))
    }

    fn decode_walk_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WalkSummary(WalkSummary {
            walk_index: self.read_u64()?,
            lanes: self.read_lanes()?,
            sync: self.read_u8()? != 0,
            units: self.read_u32()?,
            yields: self.read_u32()?,
            started_at: self.read_time()?,
            duration: Duration::from_millis(self.read_u64()?),
            end: self.read_end()?,
        }))
    }

    fn decode_mutations_count(&mut self) -> Option<RecordedEvent> {
        let walk_index = self.read_u64()?;
        let count = self.read_u32()?;
        Some(RecordedEvent::MutationsCount { walk_index, count })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_WALK_START => self.decode_walk_start(),
            TAG_WALK_YIELD => self.decode_walk_yield(),
            TAG_WALK_ABANDON => self.decode_walk_abandon(),
            TAG_COMMIT => self.decode_commit(),
            TAG_BAILOUT => self.decode_bailout(),
            TAG_LANES_EXPIRED => self.decode_lanes_expired(),
            TAG_WALK_SUMMARY => self.decode_walk_summary(),
            TAG_MUTATIONS_COUNT => self.decode_mutations_count(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
