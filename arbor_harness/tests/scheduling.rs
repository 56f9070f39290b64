// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The harness collaborators driving a real reconciler.

use arbor_core::trace::Tracer;
use arbor_core::{Child, Element, Lanes, Reconciler, ReconcilerConfig, SchedulerPriority};
use arbor_core::time::Duration;
use arbor_harness::{FrameReport, ManualScheduler, RecordingRenderer, TaskScheduler};
use proptest::prelude::*;

fn list<S: AsRef<str>>(keys: &[S]) -> Child {
    Element::host("ul")
        .with_children(
            keys.iter()
                .map(|k| Element::host("li").with_key(k.as_ref()).with_children(k.as_ref()))
                .collect::<Vec<Element>>(),
        )
        .into()
}

fn markup<S: AsRef<str>>(keys: &[S]) -> String {
    let items: String = keys.iter().map(|k| format!("<li>{}</li>", k.as_ref())).collect();
    format!("<ul>{items}</ul>")
}

fn idle(
    r: &mut Reconciler<TaskScheduler>,
    out: &mut RecordingRenderer,
) -> Vec<FrameReport> {
    TaskScheduler::run_until_idle(r, out, &mut Tracer::none(), Duration::from_millis(16), 500)
        .unwrap()
}

#[test]
fn default_walks_are_sliced_and_urgent_renders_jump_ahead() {
    let keys: Vec<String> = (0..10).map(|i| format!("k{i}")).collect();
    let mut r = Reconciler::with_config(ReconcilerConfig::concurrent(), TaskScheduler::new());
    let mut out = RecordingRenderer::new();
    r.render(list(&keys), Lanes::SYNC);
    idle(&mut r, &mut out);
    assert_eq!(out.markup(), markup(&keys));

    let mut reversed = keys.clone();
    reversed.reverse();
    r.render(list(&reversed), Lanes::DEFAULT);
    let first = TaskScheduler::run_frame(&mut r, &mut out, &mut Tracer::none()).unwrap();
    assert_eq!(first.yields, 1, "a 5 ms frame cannot fit the whole walk");
    assert!(first.commits.is_empty(), "nothing committed mid-walk");
    assert!(first.more, "the walk continues in a later frame");
    assert_eq!(out.markup(), markup(&keys), "host untouched while sliced");

    r.render(list(&["x"]), Lanes::SYNC);
    let commits: Vec<_> = idle(&mut r, &mut out)
        .into_iter()
        .flat_map(|f| f.commits)
        .collect();
    assert_eq!(commits.first().map(|c| c.lanes), Some(Lanes::SYNC), "urgent first");
    assert_eq!(commits.last().map(|c| c.lanes), Some(Lanes::DEFAULT), "then the rest");
    assert_eq!(out.markup(), "<ul><li>x</li></ul>");
    assert!(out.problems().is_empty(), "{:?}", out.problems());
}

#[test]
fn callbacks_can_schedule_renders() {
    let mut r = Reconciler::new(TaskScheduler::new());
    let mut out = RecordingRenderer::new();
    r.scheduler_mut()
        .schedule_callback(SchedulerPriority::UserBlocking, |r| r.render(list(&["late"]), Lanes::SYNC));
    let frames = idle(&mut r, &mut out);
    assert_eq!(frames.iter().map(|f| f.tasks_run).sum::<u32>(), 2, "callback then render");
    assert_eq!(out.markup(), "<ul><li>late</li></ul>");
}

#[test]
fn manual_scheduler_sees_render_requests() {
    let mut r = Reconciler::new(ManualScheduler::new());
    r.render(list(&["a"]), Lanes::DEFAULT);
    assert_eq!(r.scheduler().last_request(), Some(SchedulerPriority::Normal));
    let mut out = RecordingRenderer::new();
    r.perform_work(&mut out, &mut Tracer::none()).unwrap();
    assert_eq!(out.markup(), "<ul><li>a</li></ul>");
}

fn key_list() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(vec!["a", "b", "c", "d", "e", "f"], 0..=6).prop_shuffle()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn host_tree_tracks_every_commit(rounds in prop::collection::vec(key_list(), 1..10)) {
        let mut r = Reconciler::new(ManualScheduler::new());
        let mut out = RecordingRenderer::new();
        for keys in rounds {
            r.render(list(&keys), Lanes::SYNC);
            r.flush_sync(&mut out, &mut Tracer::none()).unwrap();
            prop_assert_eq!(out.markup(), markup(&keys));
            prop_assert_eq!(out.instance_count(), 1 + 2 * keys.len());
            prop_assert!(out.problems().is_empty(), "{:?}", out.problems());
        }
    }
}
