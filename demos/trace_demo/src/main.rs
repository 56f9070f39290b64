// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drives a keyed list of counters through a cooperative task scheduler and
//! prints every walk.
//!
//! Four phases run back to back: a synchronous mount, a time-sliced keyed
//! reorder, a reorder preempted by a discrete click, and a long transition
//! that starves until it expires. Events go to both a
//! [`PrettyPrintSink`](arbor_debug::pretty::PrettyPrintSink) on stdout and a
//! [`RecorderSink`](arbor_debug::recorder::RecorderSink), which is exported
//! as Chrome trace JSON at the end.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::rc::Rc;

use arbor_core::time::Duration;
use arbor_core::trace::{
    BailoutEvent, CommitEvent, LanesExpiredEvent, TraceSink, Tracer, WalkAbandonEvent,
    WalkStartEvent, WalkSummary, WalkYieldEvent,
};
use arbor_core::{
    CellAction, CellHandle, Child, Component, Element, ElementProps, EventPriority, FnComponent,
    Hooks, Lanes, Mutation, Reconciler, ReconcilerConfig,
};
use arbor_debug::dump::dump_tree;
use arbor_debug::pretty::PrettyPrintSink;
use arbor_debug::recorder::RecorderSink;
use arbor_harness::{RecordingRenderer, TaskScheduler};
use serde_json::{Value, json};

/// Gap between frames.
const FRAME_GAP: Duration = Duration::from_millis(16);
const MAX_FRAMES: u32 = 1_000;

type Cells = Rc<RefCell<BTreeMap<String, CellHandle>>>;

/// Forwards every event to the pretty printer and the recorder.
struct Sinks {
    pretty: PrettyPrintSink,
    recorder: RecorderSink,
}

impl TraceSink for Sinks {
    fn on_walk_start(&mut self, e: &WalkStartEvent) {
        self.pretty.on_walk_start(e);
        self.recorder.on_walk_start(e);
    }

    fn on_walk_yield(&mut self, e: &WalkYieldEvent) {
        self.pretty.on_walk_yield(e);
        self.recorder.on_walk_yield(e);
    }

    fn on_walk_abandon(&mut self, e: &WalkAbandonEvent) {
        self.pretty.on_walk_abandon(e);
        self.recorder.on_walk_abandon(e);
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.pretty.on_commit(e);
        self.recorder.on_commit(e);
    }

    fn on_bailout(&mut self, e: &BailoutEvent) {
        self.pretty.on_bailout(e);
        self.recorder.on_bailout(e);
    }

    fn on_lanes_expired(&mut self, e: &LanesExpiredEvent) {
        self.pretty.on_lanes_expired(e);
        self.recorder.on_lanes_expired(e);
    }

    fn on_walk_summary(&mut self, s: &WalkSummary) {
        self.pretty.on_walk_summary(s);
        self.recorder.on_walk_summary(s);
    }

    fn on_mutations(&mut self, walk_index: u64, mutations: &[Mutation]) {
        self.pretty.on_mutations(walk_index, mutations);
        self.recorder.on_mutations(walk_index, mutations);
    }
}

/// `<li>label: n</li>` with its count in a state cell.
fn counter(cells: &Cells) -> Rc<dyn Component> {
    let cells = Rc::clone(cells);
    FnComponent::new("Counter", move |props: &ElementProps, hooks: &mut Hooks<'_>| {
        let (count, cell) = hooks.use_state(|| json!(0));
        let label = props.get("label").and_then(Value::as_str).unwrap_or("?");
        cells.borrow_mut().insert(label.to_owned(), cell);
        Element::host("li")
            .with_children(Child::text(&format!("{label}: {count}")))
            .into()
    })
}

fn counters(component: &Rc<dyn Component>, labels: &[String]) -> Element {
    Element::host("ul").with_children(
        labels
            .iter()
            .map(|label| {
                Element::function(component)
                    .with_key(label.as_str())
                    .with_attrs(json!({ "label": label }))
            })
            .collect::<Vec<Element>>(),
    )
}

fn labels(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("c{i:02}")).collect()
}

fn increment() -> CellAction {
    CellAction::update(|v: &Value| json!(v.as_i64().unwrap_or(0) + 1))
}

fn banner(title: &str) {
    println!("\n== {title} ==");
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .init();

    // -- sinks -------------------------------------------------------------
    let mut sinks = Sinks {
        pretty: PrettyPrintSink::new(Box::new(std::io::stdout())),
        recorder: RecorderSink::new(),
    };

    // -- reconciler --------------------------------------------------------
    let cells: Cells = Rc::default();
    let component = counter(&cells);
    let mut r = Reconciler::with_config(ReconcilerConfig::concurrent(), TaskScheduler::new());
    let mut host = RecordingRenderer::new();

    {
        let mut tracer = Tracer::new(&mut sinks);

        // 1. Mount synchronously.
        banner("mount");
        let mut order = labels(6);
        r.render(counters(&component, &order), Lanes::SYNC);
        TaskScheduler::run_until_idle(&mut r, &mut host, &mut tracer, FRAME_GAP, MAX_FRAMES)?;

        // 2. Reverse at default priority; the walk is sliced across frames.
        banner("keyed reorder");
        order.reverse();
        let lane = r.request_update_lane(EventPriority::Default);
        r.render(counters(&component, &order), lane);
        let frames =
            TaskScheduler::run_until_idle(&mut r, &mut host, &mut tracer, FRAME_GAP, MAX_FRAMES)?;
        println!("reorder took {} frames, {} instances", frames.len(), host.instance_count());

        // 3. Start another reorder, then click a counter mid-walk.
        banner("preemption");
        order.rotate_left(2);
        r.render(counters(&component, &order), lane);
        TaskScheduler::run_frame(&mut r, &mut host, &mut tracer)?;
        let clicked = cells.borrow().get("c03").copied();
        if let Some(cell) = clicked {
            let click = r.request_update_lane(EventPriority::Discrete);
            let outcome = r.dispatch(cell, increment(), click)?;
            println!("click on c03: {outcome:?}");
        }
        TaskScheduler::run_until_idle(&mut r, &mut host, &mut tracer, FRAME_GAP, MAX_FRAMES)?;

        // 4. A long transition whose frames are spaced out until it expires.
        banner("starvation");
        let transition = r.claim_transition_lane();
        r.render(counters(&component, &labels(200)), transition);
        TaskScheduler::run_until_idle(
            &mut r,
            &mut host,
            &mut tracer,
            Duration::from_millis(1_000),
            MAX_FRAMES,
        )?;
    }

    banner("committed tree (first lines)");
    for line in dump_tree(r.tree()).lines().take(8) {
        println!("{line}");
    }
    if !host.problems().is_empty() {
        tracing::warn!(problems = ?host.problems(), "host tree diverged");
    }

    // -- export Chrome trace -----------------------------------------------
    let path = "trace.json";
    let mut writer = BufWriter::new(File::create(path)?);
    arbor_debug::chrome::export(sinks.recorder.as_bytes(), &mut writer)?;
    println!("Wrote {path}");
    Ok(())
}
