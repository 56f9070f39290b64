// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Host times
//! are printed in milliseconds.

use std::io::Write;

use arbor_core::Mutation;
use arbor_core::trace::{
    BailoutEvent, CommitEvent, LanesExpiredEvent, TraceSink, WalkAbandonEvent, WalkEnd,
    WalkStartEvent, WalkSummary, WalkYieldEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    bailouts: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("bailouts", &self.bailouts)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            bailouts: false,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            bailouts: false,
        }
    }

    /// Also prints a line per bailed-out node. Off by default; bailouts are
    /// frequent on large trees.
    #[must_use]
    pub fn with_bailouts(mut self, on: bool) -> Self {
        self.bailouts = on;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn end_name(end: WalkEnd) -> &'static str {
    match end {
        WalkEnd::Committed => "committed",
        WalkEnd::Abandoned => "abandoned",
        WalkEnd::Failed => "failed",
    }
}

fn mutation_name(m: &Mutation) -> &'static str {
    match m {
        Mutation::Create { .. } => "create",
        Mutation::AppendInitial { .. } => "append",
        Mutation::Insert { .. } => "insert",
        Mutation::Remove { .. } => "remove",
        Mutation::SetAttrs { .. } => "attrs",
        Mutation::SetText { .. } => "text",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_walk_start(&mut self, e: &WalkStartEvent) {
        let mode = if e.sync { "sync" } else { "sliced" };
        let retry = if e.retry { " retry" } else { "" };
        let _ = writeln!(
            self.writer,
            "[walk:start] walk={} lanes={} {mode}{retry} at {}ms",
            e.walk_index,
            e.lanes,
            e.now.millis(),
        );
    }

    fn on_walk_yield(&mut self, e: &WalkYieldEvent) {
        let _ = writeln!(
            self.writer,
            "[walk:yield] walk={} lanes={} units={} at {}ms",
            e.walk_index,
            e.lanes,
            e.units,
            e.now.millis(),
        );
    }

    fn on_walk_abandon(&mut self, e: &WalkAbandonEvent) {
        let _ = writeln!(
            self.writer,
            "[walk:abandon] walk={} lanes={} next={} wasted={} at {}ms",
            e.walk_index,
            e.lanes,
            e.next,
            e.units,
            e.now.millis(),
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        let _ = writeln!(
            self.writer,
            "[commit] walk={} lanes={} mutations={} removed={} remaining={} at {}ms",
            e.walk_index,
            e.lanes,
            e.mutations,
            e.removed_entities,
            e.remaining,
            e.now.millis(),
        );
    }

    fn on_bailout(&mut self, e: &BailoutEvent) {
        if !self.bailouts {
            return;
        }
        let scope = if e.subtree_skipped { "subtree" } else { "node" };
        let _ = writeln!(
            self.writer,
            "[bailout] walk={} entity={}@{} {scope}",
            e.walk_index,
            e.entity.index(),
            e.entity.generation(),
        );
    }

    fn on_lanes_expired(&mut self, e: &LanesExpiredEvent) {
        let _ = writeln!(
            self.writer,
            "[expired] lanes={} at {}ms",
            e.lanes,
            e.now.millis(),
        );
    }

    fn on_walk_summary(&mut self, s: &WalkSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] walk={} lanes={} sync={} units={} yields={} took={}ms {}",
            s.walk_index,
            s.lanes,
            s.sync,
            s.units,
            s.yields,
            s.duration.millis(),
            end_name(s.end),
        );
    }

    fn on_mutations(&mut self, walk_index: u64, mutations: &[Mutation]) {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for m in mutations {
            let name = mutation_name(m);
            match counts.iter_mut().find(|(n, _)| *n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
        let parts: Vec<String> = counts.iter().map(|(n, c)| format!("{n}={c}")).collect();
        let _ = writeln!(self.writer, "[mutations] walk={walk_index} {}", parts.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::time::{Duration, Timestamp};
    use arbor_core::{EntityId, Lanes};

    fn output(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn walk_lines_name_lanes_and_mode() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_walk_start(&WalkStartEvent {
            walk_index: 2,
            lanes: Lanes::SYNC | Lanes::DEFAULT,
            sync: true,
            retry: true,
            now: Timestamp(40),
        });
        sink.on_walk_summary(&WalkSummary {
            walk_index: 2,
            lanes: Lanes::SYNC,
            sync: true,
            units: 9,
            yields: 0,
            started_at: Timestamp(40),
            duration: Duration::from_millis(3),
            end: WalkEnd::Committed,
        });
        let out = output(sink);
        assert!(out.contains("[walk:start] walk=2 lanes=Sync|Default sync retry at 40ms"), "got: {out}");
        assert!(out.contains("took=3ms committed"), "got: {out}");
    }

    #[test]
    fn bailouts_are_opt_in() {
        let event = BailoutEvent {
            walk_index: 1,
            entity: EntityId::from_raw(4, 1),
            subtree_skipped: true,
        };
        let mut quiet = PrettyPrintSink::with_writer(Vec::<u8>::new());
        quiet.on_bailout(&event);
        assert!(output(quiet).is_empty());

        let mut loud = PrettyPrintSink::with_writer(Vec::<u8>::new()).with_bailouts(true);
        loud.on_bailout(&event);
        assert_eq!(output(loud), "[bailout] walk=1 entity=4@1 subtree\n");
    }

    #[test]
    fn mutations_are_counted_by_kind() {
        let a = EntityId::from_raw(1, 0);
        let b = EntityId::from_raw(2, 0);
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_mutations(
            5,
            &[
                Mutation::Remove { id: a, parent: b },
                Mutation::SetText { id: b, text: "x".into() },
                Mutation::Remove { id: b, parent: a },
            ],
        );
        assert_eq!(output(sink), "[mutations] walk=5 remove=2 text=1\n");
    }
}
