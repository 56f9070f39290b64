// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Each walk becomes a `B`/`E` span from its start event to its summary.
//! Yields, abandonments, commits and expirations are instant events.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use arbor_core::time::Timestamp;
use arbor_core::trace::WalkEnd;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Bailouts and mutation counts carry no time of their own.
    let mut last_ts = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::WalkStart(e) => {
                last_ts = to_us(e.now);
                events.push(json!({
                    "ph": "B",
                    "name": format!("walk {}", e.lanes),
                    "cat": "Walk",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "walk_index": e.walk_index,
                        "sync": e.sync,
                        "retry": e.retry,
                    }
                }));
            }
            RecordedEvent::WalkYield(e) => {
                last_ts = to_us(e.now);
                events.push(json!({
                    "ph": "i",
                    "name": "Yield",
                    "cat": "Walk",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "walk_index": e.walk_index,
                        "units": e.units,
                    }
                }));
            }
            RecordedEvent::WalkAbandon(e) => {
                last_ts = to_us(e.now);
                events.push(json!({
                    "ph": "i",
                    "name": "Abandon",
                    "cat": "Walk",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "walk_index": e.walk_index,
                        "next": e.next.to_string(),
                        "wasted_units": e.units,
                    }
                }));
            }
            RecordedEvent::Commit(e) => {
                last_ts = to_us(e.now);
                events.push(json!({
                    "ph": "i",
                    "name": "Commit",
                    "cat": "Commit",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "walk_index": e.walk_index,
                        "lanes": e.lanes.to_string(),
                        "mutations": e.mutations,
                        "removed_entities": e.removed_entities,
                        "remaining": e.remaining.to_string(),
                    }
                }));
            }
            RecordedEvent::Bailout(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Bailout",
                    "cat": "Rich",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "walk_index": e.walk_index,
                        "entity": e.entity.index(),
                        "generation": e.entity.generation(),
                        "subtree_skipped": e.subtree_skipped,
                    }
                }));
            }
            RecordedEvent::LanesExpired(e) => {
                last_ts = to_us(e.now);
                events.push(json!({
                    "ph": "i",
                    "name": "LanesExpired",
                    "cat": "Scheduler",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "lanes": e.lanes.to_string(),
                    }
                }));
            }
            RecordedEvent::WalkSummary(s) => {
                last_ts = to_us(s.started_at + s.duration);
                events.push(json!({
                    "ph": "E",
                    "name": format!("walk {}", s.lanes),
                    "cat": "Walk",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "walk_index": s.walk_index,
                        "units": s.units,
                        "yields": s.yields,
                        "sync": s.sync,
                        "end": end_name(s.end),
                    }
                }));
            }
            RecordedEvent::MutationsCount { walk_index, count } => {
                events.push(json!({
                    "ph": "i",
                    "name": "Mutations",
                    "cat": "Rich",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "walk_index": walk_index,
                        "count": count,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_us(t: Timestamp) -> f64 {
    t.millis() as f64 * 1000.0
}

fn end_name(end: WalkEnd) -> &'static str {
    match end {
        WalkEnd::Committed => "Committed",
        WalkEnd::Abandoned => "Abandoned",
        WalkEnd::Failed => "Failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use arbor_core::Lanes;
    use arbor_core::time::Duration;
    use arbor_core::trace::{CommitEvent, TraceSink, WalkStartEvent, WalkSummary};

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_walk_start(&WalkStartEvent {
            walk_index: 0,
            lanes: Lanes::SYNC,
            sync: true,
            retry: false,
            now: Timestamp(2),
        });
        rec.on_commit(&CommitEvent {
            walk_index: 0,
            lanes: Lanes::SYNC,
            mutations: 3,
            removed_entities: 0,
            remaining: Lanes::NONE,
            now: Timestamp(3),
        });
        rec.on_walk_summary(&WalkSummary {
            walk_index: 0,
            lanes: Lanes::SYNC,
            sync: true,
            units: 5,
            yields: 0,
            started_at: Timestamp(2),
            duration: Duration::from_millis(1),
            end: WalkEnd::Committed,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "walk Sync");
        assert_eq!(parsed[0]["ts"], 2000.0);

        assert_eq!(parsed[1]["ph"], "i");
        assert_eq!(parsed[1]["name"], "Commit");
        assert_eq!(parsed[1]["args"]["remaining"], "None");

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["name"], "walk Sync");
        assert_eq!(parsed[2]["ts"], 3000.0);
        assert_eq!(parsed[2]["args"]["end"], "Committed");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty());
    }
}
