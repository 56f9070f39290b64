// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trace sinks observe a real mount, preemption and follow-up walk.

use arbor_core::trace::{TraceSink, Tracer, WalkEnd};
use arbor_core::{Child, Element, Lanes, Reconciler, ReconcilerConfig};
use arbor_debug::chrome;
use arbor_debug::pretty::PrettyPrintSink;
use arbor_debug::recorder::{RecordedEvent, RecorderSink, decode};
use arbor_harness::{ManualScheduler, RecordingRenderer};
use serde_json::Value;

fn list(keys: &[&str]) -> Child {
    Element::host("ul")
        .with_children(
            keys.iter()
                .map(|k| Element::host("li").with_key(*k).with_children(*k))
                .collect::<Vec<Element>>(),
        )
        .into()
}

/// Mounts `a b c`, starts a sliced reorder, preempts it with a sync update
/// and flushes the rest.
fn preempted_reorder(sink: &mut dyn TraceSink) -> RecordingRenderer {
    let mut r = Reconciler::with_config(ReconcilerConfig::concurrent(), ManualScheduler::new());
    let mut out = RecordingRenderer::new();
    let mut tracer = Tracer::new(sink);

    r.render(list(&["a", "b", "c"]), Lanes::SYNC);
    r.flush_sync(&mut out, &mut tracer).unwrap();

    r.render(list(&["c", "b", "a"]), Lanes::DEFAULT);
    r.scheduler_mut().yield_after(2);
    r.perform_work(&mut out, &mut tracer).unwrap();
    assert!(r.walk_lanes().is_some(), "sliced walk still in progress");

    r.render(list(&["a"]), Lanes::SYNC);
    r.scheduler_mut().never_yield();
    r.perform_work(&mut out, &mut tracer).unwrap();
    r.flush_sync(&mut out, &mut tracer).unwrap();
    out
}

fn outline(bytes: &[u8]) -> Vec<String> {
    decode(bytes)
        .filter_map(|e| match e {
            RecordedEvent::WalkStart(e) => Some(format!("start {} {}", e.walk_index, e.lanes)),
            RecordedEvent::WalkYield(e) => Some(format!("yield {}", e.walk_index)),
            RecordedEvent::WalkAbandon(e) => Some(format!("abandon {} for {}", e.walk_index, e.next)),
            RecordedEvent::Commit(e) => Some(format!("commit {}", e.walk_index)),
            RecordedEvent::MutationsCount { walk_index, .. } => Some(format!("mutations {walk_index}")),
            RecordedEvent::WalkSummary(s) => Some(format!("end {} {:?}", s.walk_index, s.end)),
            RecordedEvent::Bailout(_) | RecordedEvent::LanesExpired(_) => None,
        })
        .collect()
}

#[test]
fn recorder_sees_every_walk_in_order() {
    let mut rec = RecorderSink::new();
    let out = preempted_reorder(&mut rec);
    assert_eq!(out.markup(), "<ul><li>a</li></ul>");

    assert_eq!(
        outline(rec.as_bytes()),
        [
            "start 1 Sync",
            "commit 1",
            "mutations 1",
            "end 1 Committed",
            "start 2 Default",
            "yield 2",
            "abandon 2 for Sync",
            "end 2 Abandoned",
            "start 3 Sync",
            "commit 3",
            "mutations 3",
            "end 3 Committed",
            "start 4 Default",
            "commit 4",
            "mutations 4",
            "end 4 Committed",
        ]
    );

    let abandoned = decode(rec.as_bytes()).find_map(|e| match e {
        RecordedEvent::WalkSummary(s) if s.end == WalkEnd::Abandoned => Some(s),
        _ => None,
    });
    let abandoned = abandoned.expect("abandoned summary");
    assert!(abandoned.units >= 2, "work done before the yield is counted");
    assert_eq!(abandoned.yields, 1);
}

#[test]
fn pretty_printer_narrates_the_preemption() {
    let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
    preempted_reorder(&mut sink);
    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert!(text.contains("[walk:yield] walk=2 lanes=Default"), "got:\n{text}");
    assert!(text.contains("[walk:abandon] walk=2 lanes=Default next=Sync"), "got:\n{text}");
    assert!(text.contains("[commit] walk=3 lanes=Sync"), "got:\n{text}");
    assert!(!text.contains("[bailout]"), "bailouts are off by default");
}

#[test]
fn chrome_export_balances_walk_spans() {
    let mut rec = RecorderSink::new();
    preempted_reorder(&mut rec);
    let mut json = Vec::new();
    chrome::export(rec.as_bytes(), &mut json).unwrap();
    let events: Vec<Value> = serde_json::from_slice(&json).unwrap();
    let begins = events.iter().filter(|e| e["ph"] == "B").count();
    let ends = events.iter().filter(|e| e["ph"] == "E").count();
    assert_eq!(begins, 4);
    assert_eq!(ends, 4);
    assert!(
        events.iter().any(|e| e["name"] == "Abandon" && e["args"]["next"] == "Sync"),
        "abandon instant present"
    );
}
