// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end behavior of the reconciler driver.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbor_core::trace::Tracer;
use arbor_core::{
    CellAction, CellHandle, Child, Component, DispatchError, DispatchOutcome, Element, ElementProps,
    FnComponent, Hooks, Lanes, Mutation, Reconciler, ReconcilerConfig, SchedulerPriority, StateUpdate,
    StatefulComponent, WalkError, WorkOutcome,
};
use serde_json::{Value, json};

use common::{Host, Log, count, entities_at, is_created_element, keys_at, list, text_at};

fn reconciler() -> Reconciler<Host> {
    Reconciler::new(Host::default())
}

fn concurrent() -> Reconciler<Host> {
    Reconciler::with_config(ReconcilerConfig::concurrent(), Host::default())
}

fn flush(r: &mut Reconciler<Host>, log: &mut Log) -> Vec<arbor_core::CommitSummary> {
    r.flush_sync(log, &mut Tracer::none()).expect("walks succeed")
}

/// A function component showing one string cell in a `<span>`.
fn text_cell(handles: &Rc<RefCell<Vec<CellHandle>>>, init: Value) -> Rc<dyn Component> {
    let handles = Rc::clone(handles);
    FnComponent::new("TextCell", move |_props: &ElementProps, hooks: &mut Hooks<'_>| {
        let (value, handle) = hooks.use_state(|| init.clone());
        handles.borrow_mut().push(handle);
        Element::host("span").with_children(Child::Value(value)).into()
    })
}

fn append(s: &'static str) -> CellAction {
    CellAction::update(move |v: &Value| json!(format!("{}{s}", v.as_str().unwrap_or(""))))
}

#[test]
fn mount_then_keyed_reorder_moves_without_recreating() {
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(list(&["a", "b", "c"]), Lanes::SYNC);
    let commits = flush(&mut r, &mut log);
    assert_eq!(commits.len(), 1, "one commit");
    assert_eq!(keys_at(&r, &[0]), ["a", "b", "c"], "mounted in order");
    let [a, b, c] = entities_at(&r, &[0])[..] else {
        panic!("three items");
    };

    r.render(list(&["c", "a", "b"]), Lanes::SYNC);
    let commits = flush(&mut r, &mut log);
    let batch = &commits[0].mutations;
    assert_eq!(entities_at(&r, &[0]), vec![c, a, b], "entities follow keys");
    assert_eq!(count(batch, |m| matches!(m, Mutation::Insert { .. })), 2, "a and b move");
    assert_eq!(count(batch, |m| matches!(m, Mutation::Create { .. })), 0, "nothing created");
    assert_eq!(count(batch, |m| matches!(m, Mutation::Remove { .. })), 0, "nothing removed");
}

#[test]
fn single_child_chains_mount_completely() {
    let mut r = reconciler();
    let mut log = Log::default();
    // `h1` holds exactly one fresh child; its sibling `p` must still be
    // visited once `em` completes.
    r.render(
        Element::host("div").with_children(Vec::<Child>::from([
            Element::host("h1").with_children(Element::host("em").with_children("x")).into(),
            Element::host("p").with_children("y").into(),
        ])),
        Lanes::SYNC,
    );
    let commits = flush(&mut r, &mut log);
    let batch = &commits[0].mutations;
    for tag in ["div", "h1", "em", "p"] {
        assert_eq!(count(batch, |m| is_created_element(m, tag)), 1, "{tag} created");
    }
    assert_eq!(count(batch, |m| matches!(m, Mutation::Insert { .. })), 1, "div inserted");
    assert_eq!(text_at(&r, &[0, 1]).as_deref(), Some("y"), "sibling committed");

    r.render(Element::host("p").with_children("z"), Lanes::SYNC);
    let commits = flush(&mut r, &mut log);
    let batch = &commits[0].mutations;
    assert_eq!(count(batch, |m| is_created_element(m, "p")), 1, "p created");
    assert_eq!(count(batch, |m| matches!(m, Mutation::Insert { .. })), 1, "p inserted");
    assert_eq!(count(batch, |m| matches!(m, Mutation::Remove { .. })), 1, "div removed");
    assert_eq!(text_at(&r, &[]).as_deref(), Some("z"), "text committed");
}

#[test]
fn type_change_under_the_same_key_recreates() {
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(Element::host("p").with_key("x").with_children("t"), Lanes::SYNC);
    flush(&mut r, &mut log);
    let before = r.find_entity(&[0]).expect("mounted");

    r.render(Element::host("div").with_key("x").with_children("t"), Lanes::SYNC);
    let commits = flush(&mut r, &mut log);
    let after = r.find_entity(&[0]).expect("mounted");
    assert_ne!(before, after, "new entity");
    assert!(!r.tree().is_live(before), "old entity freed");
    let batch = &commits[0].mutations;
    assert!(
        batch.iter().any(|m| matches!(m, Mutation::Remove { id, .. } if *id == before)),
        "p removed"
    );
    assert!(batch.iter().any(|m| is_created_element(m, "div")), "div created");
}

#[test]
fn removed_entities_reject_later_updates() {
    let handles = Rc::new(RefCell::new(Vec::new()));
    let cell = text_cell(&handles, json!("x"));
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(Element::function(&cell).with_key("k"), Lanes::SYNC);
    flush(&mut r, &mut log);
    let handle = handles.borrow()[0];

    r.render(Child::Empty, Lanes::SYNC);
    let commits = flush(&mut r, &mut log);
    assert_eq!(commits[0].removed_entities, 3, "component, span and text");
    assert_eq!(
        r.dispatch(handle, CellAction::Set(json!("y")), Lanes::SYNC),
        Err(DispatchError::Unmounted(handle.entity)),
        "stale handle"
    );
}

#[test]
fn dispatch_updates_text_and_equal_values_bail_out_eagerly() {
    let handles = Rc::new(RefCell::new(Vec::new()));
    let cell = text_cell(&handles, json!("0"));
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(Element::function(&cell), Lanes::SYNC);
    flush(&mut r, &mut log);
    let handle = handles.borrow()[0];
    let requests = r.scheduler().requests.len();

    assert_eq!(
        r.dispatch(handle, CellAction::Set(json!("0")), Lanes::SYNC),
        Ok(DispatchOutcome::EagerBailout),
        "same value"
    );
    assert_eq!(r.scheduler().requests.len(), requests, "no work requested");
    assert!(r.root_lanes().pending.is_empty(), "nothing pending");
    assert!(flush(&mut r, &mut log).is_empty(), "nothing to commit");

    assert_eq!(
        r.dispatch(handle, CellAction::Set(json!("1")), Lanes::SYNC),
        Ok(DispatchOutcome::Scheduled),
        "new value"
    );
    assert_eq!(r.scheduler().requests.last(), Some(&SchedulerPriority::Immediate), "sync task");
    let commits = flush(&mut r, &mut log);
    assert_eq!(commits.len(), 1, "one commit");
    assert!(
        matches!(&commits[0].mutations[..], [Mutation::SetText { text, .. }] if &**text == "1"),
        "only the text changes: {:?}",
        commits[0].mutations
    );
    assert_eq!(text_at(&r, &[]).as_deref(), Some("1"), "committed");
}

#[test]
fn lower_priority_updates_are_rebased_after_urgent_ones() {
    let handles = Rc::new(RefCell::new(Vec::new()));
    let cell = text_cell(&handles, json!("_"));
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(Element::function(&cell), Lanes::SYNC);
    flush(&mut r, &mut log);
    let handle = handles.borrow()[0];

    r.dispatch(handle, append("a"), Lanes::DEFAULT).expect("mounted");
    r.dispatch(handle, append("b"), Lanes::SYNC).expect("mounted");
    r.dispatch(handle, append("c"), Lanes::DEFAULT).expect("mounted");

    let commits = flush(&mut r, &mut log);
    assert_eq!(commits.len(), 2, "urgent pass then the rest");
    assert_eq!(commits[0].lanes, Lanes::SYNC, "sync first");
    assert!(
        matches!(&commits[0].mutations[..], [Mutation::SetText { text, .. }] if &**text == "_b"),
        "only b is visible at first"
    );
    assert_eq!(commits[0].remaining, Lanes::DEFAULT, "default left");
    assert!(
        matches!(&commits[1].mutations[..], [Mutation::SetText { text, .. }] if &**text == "_abc"),
        "replayed in insertion order"
    );
    assert!(r.root_lanes().pending.is_empty(), "all done");
}

struct Profile;

impl StatefulComponent for Profile {
    fn name(&self) -> &str {
        "Profile"
    }

    fn initial_state(&self, _props: &ElementProps) -> Value {
        json!({"name": "ada", "visits": 0})
    }

    fn render(&self, _props: &ElementProps, state: &Value) -> Child {
        let line = format!("{} {}", state["name"].as_str().unwrap_or(""), state["visits"]);
        Element::host("p").with_children(line.as_str()).into()
    }
}

#[test]
fn stateful_updates_merge_and_force() {
    let profile: Rc<dyn StatefulComponent> = Rc::new(Profile);
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(Element::stateful(&profile), Lanes::SYNC);
    flush(&mut r, &mut log);
    assert_eq!(text_at(&r, &[]).as_deref(), Some("ada 0"), "initial state");
    let entity = r.find_entity(&[0]).expect("mounted");

    r.set_state(entity, StateUpdate::Merge(json!({"visits": 1})), Lanes::SYNC)
        .expect("stateful");
    flush(&mut r, &mut log);
    assert_eq!(text_at(&r, &[]).as_deref(), Some("ada 1"), "partial merge keeps name");

    r.set_state(entity, StateUpdate::Force, Lanes::SYNC).expect("stateful");
    let commits = flush(&mut r, &mut log);
    assert_eq!(commits.len(), 1, "forced walk commits");
    assert!(commits[0].mutations.is_empty(), "output unchanged");

    let host = r.find_entity(&[0, 0]).expect("p");
    assert_eq!(
        r.set_state(host, StateUpdate::Force, Lanes::SYNC),
        Err(DispatchError::WrongKind(host)),
        "host nodes have no state"
    );
}

#[test]
fn failed_mount_commits_nothing_and_frees_what_it_created() {
    let looping = FnComponent::new("Loop", |_props: &ElementProps, hooks: &mut Hooks<'_>| {
        let (_, handle) = hooks.use_state(|| json!(0));
        hooks.update(handle, CellAction::update(|v: &Value| json!(v.as_i64().unwrap_or(0) + 1)));
        Child::Empty
    });
    let mut r = reconciler();
    let mut log = Log::default();
    let before = r.snapshot();
    r.render(Element::host("div").with_children(Element::function(&looping)), Lanes::SYNC);
    let err = r.flush_sync(&mut log, &mut Tracer::none()).expect_err("loops forever");
    assert!(
        matches!(&err, WalkError::TooManyRerenders { component, limit: 25, .. } if component == "Loop"),
        "{err}"
    );
    assert!(log.0.is_empty(), "nothing reached the renderer");
    assert_eq!(r.tree().live_count(), 1, "only the root is left");
    assert_eq!(r.snapshot().nodes.len(), before.nodes.len(), "committed tree is still empty");
    assert!(r.root_lanes().suspended.includes_some(Lanes::SYNC), "failed lane parked");
}

#[test]
fn failed_walk_is_retried_once_and_commits_the_second_pass() {
    let renders = Rc::new(Cell::new(0_u32));
    let count_renders = Rc::clone(&renders);
    let flaky = FnComponent::new("Flaky", move |_props: &ElementProps, _hooks: &mut Hooks<'_>| {
        count_renders.set(count_renders.get() + 1);
        if count_renders.get() == 1 {
            Child::Value(json!({"not": "a child"}))
        } else {
            Element::host("b").into()
        }
    });
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(
        Element::host("div").with_children(Vec::<Child>::from([Element::host("p").into(), Element::function(&flaky).into()])),
        Lanes::SYNC,
    );
    let commits = flush(&mut r, &mut log);

    assert_eq!(renders.get(), 2, "rendered once per pass");
    assert_eq!(commits.len(), 1, "only the retry commits");
    assert!(commits[0].retry, "commit came from the retry pass");
    assert_eq!(log.0.len(), 1, "one batch reached the renderer");
    let batch = &commits[0].mutations;
    for tag in ["div", "p", "b"] {
        assert_eq!(count(batch, |m| is_created_element(m, tag)), 1, "{tag} created once");
    }

    // Root, div, p, Flaky and b. The first pass's div, p and Flaky were
    // freed, so their slots come back one generation later.
    let tree = r.tree();
    assert_eq!(tree.live_count(), 5, "nothing from the failed pass is live");
    let reused = tree
        .preorder(tree.current_root())
        .into_iter()
        .filter(|(n, _)| tree.entity(*n).generation() == 1)
        .count();
    assert_eq!(reused, 3, "failed pass entities were freed and their slots reused");
    assert!(r.root_lanes().suspended.is_empty(), "nothing parked");
}

#[test]
fn hook_count_change_is_fatal_and_recoverable_by_a_new_render() {
    let extra = Rc::new(Cell::new(false));
    let flag = Rc::clone(&extra);
    let flaky = FnComponent::new("Flaky", move |props: &ElementProps, hooks: &mut Hooks<'_>| {
        hooks.use_state(|| json!(1));
        if flag.get() {
            hooks.use_state(|| json!(2));
        }
        props.children.clone()
    });
    let view = |label: &str| Element::function(&flaky).with_children(Element::host("b").with_children(label));
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(view("one"), Lanes::SYNC);
    flush(&mut r, &mut log);

    extra.set(true);
    r.render(view("two"), Lanes::SYNC);
    let committed = r.snapshot();
    let err = r.flush_sync(&mut log, &mut Tracer::none()).expect_err("cell count changed");
    assert!(
        matches!(err, WalkError::HookCountMismatch { expected: 1, found: 2, .. }),
        "{err}"
    );
    assert_eq!(r.snapshot(), committed, "committed tree untouched");

    extra.set(false);
    r.render(view("three"), Lanes::SYNC);
    flush(&mut r, &mut log);
    assert_eq!(text_at(&r, &[]).as_deref(), Some("three"), "a fresh update recovers");
}

#[test]
fn invalid_children_are_reported() {
    let mut r = reconciler();
    let mut log = Log::default();
    r.render(Element::host("div").with_children(Child::Value(json!({"not": "a child"}))), Lanes::SYNC);
    let err = r.flush_sync(&mut log, &mut Tracer::none()).expect_err("objects are not children");
    assert!(matches!(err, WalkError::InvalidChild { ref parent, .. } if parent == "div"), "{err}");
    assert!(log.0.is_empty(), "nothing committed");
}

#[test]
fn urgent_update_abandons_the_walk_in_progress() {
    let mut r = concurrent();
    let mut log = Log::default();
    r.render(list(&["a", "b"]), Lanes::SYNC);
    flush(&mut r, &mut log);

    r.render(list(&["a", "b", "c", "d"]), Lanes::DEFAULT);
    let committed = r.snapshot();
    r.scheduler_mut().budget = Some(4);
    let outcome = r.perform_work(&mut log, &mut Tracer::none()).expect("no error");
    assert_eq!(outcome, WorkOutcome::Yielded, "time slice used up");
    assert_eq!(r.walk_lanes(), Some(Lanes::DEFAULT), "walk in progress");
    assert_eq!(r.snapshot(), committed, "committed tree untouched mid-walk");

    r.render(list(&["z"]), Lanes::SYNC);
    assert_eq!(r.walk_lanes(), Some(Lanes::DEFAULT), "nothing abandoned yet");
    let outcome = r.perform_work(&mut log, &mut Tracer::none()).expect("no error");
    let WorkOutcome::Committed(summary) = outcome else {
        panic!("sync walk runs to completion: {outcome:?}");
    };
    assert_eq!(summary.lanes, Lanes::SYNC, "urgent lane only");
    assert_eq!(keys_at(&r, &[0]), ["z"], "urgent content");
    assert_eq!(summary.remaining, Lanes::DEFAULT, "default still pending");

    r.scheduler_mut().budget = None;
    let commits = flush(&mut r, &mut log);
    assert_eq!(commits.len(), 1, "default replays");
    assert_eq!(keys_at(&r, &[0]), ["z"], "last render wins");
    assert_eq!(r.tree().live_count(), 4, "root, ul, z and its text");
}

#[test]
fn explicit_abandon_restores_allocations() {
    let mut r = concurrent();
    let mut log = Log::default();
    r.render(list(&["a", "b"]), Lanes::SYNC);
    flush(&mut r, &mut log);
    let live = r.tree().live_count();

    r.render(list(&["a", "b", "c", "d"]), Lanes::DEFAULT);
    let committed = r.snapshot();
    r.scheduler_mut().budget = Some(6);
    let outcome = r.perform_work(&mut log, &mut Tracer::none()).expect("no error");
    assert_eq!(outcome, WorkOutcome::Yielded, "partial walk");
    r.abandon();
    assert_eq!(r.walk_lanes(), None, "no walk");
    assert_eq!(r.tree().live_count(), live, "created nodes freed");
    assert_eq!(r.snapshot(), committed, "committed tree untouched");
    assert_eq!(r.root_lanes().pending, Lanes::DEFAULT, "work still pending");

    r.scheduler_mut().budget = None;
    flush(&mut r, &mut log);
    assert_eq!(keys_at(&r, &[0]), ["a", "b", "c", "d"], "completed later");
}

#[test]
fn starved_lanes_expire_and_finish_synchronously() {
    let mut r = concurrent();
    let mut log = Log::default();
    r.render(list(&["a", "b", "c"]), Lanes::DEFAULT);
    r.scheduler_mut().budget = Some(0);
    let outcome = r.perform_work(&mut log, &mut Tracer::none()).expect("no error");
    assert_eq!(outcome, WorkOutcome::Yielded, "host always busy");
    assert_eq!(r.scheduler().requests.last(), Some(&SchedulerPriority::Normal), "normal task");

    r.scheduler_mut().now = 6_000;
    let outcome = r.perform_work(&mut log, &mut Tracer::none()).expect("no error");
    let WorkOutcome::Committed(summary) = outcome else {
        panic!("expired lanes ignore the host: {outcome:?}");
    };
    assert_eq!(summary.yields, 1, "one earlier yield");
    assert_eq!(keys_at(&r, &[0]), ["a", "b", "c"], "committed");
    assert!(r.root_lanes().expired.is_empty(), "expiry cleared on commit");
}

#[test]
fn transitions_on_one_queue_are_entangled() {
    let mut r = reconciler();
    let mut log = Log::default();
    let t1 = r.claim_transition_lane();
    let t2 = r.claim_transition_lane();
    assert_ne!(t1, t2, "round-robin");
    r.render(list(&["a"]), t1);
    r.render(list(&["b"]), t2);
    assert_eq!(r.root_lanes().entangled, t1 | t2, "both entangled");
    assert_eq!(r.root_lanes().with_entangled(t1), t1 | t2, "one pulls in the other");

    let commits = flush(&mut r, &mut log);
    assert_eq!(commits.len(), 1, "committed together");
    assert_eq!(commits[0].lanes, t1 | t2, "both lanes");
    assert_eq!(keys_at(&r, &[0]), ["b"], "latest transition");
    assert!(r.root_lanes().entangled.is_empty(), "cleared");
}

#[test]
fn runaway_cross_updates_hit_the_nested_limit() {
    let ping_cell: Rc<Cell<Option<CellHandle>>> = Rc::new(Cell::new(None));
    let pong_cell: Rc<Cell<Option<CellHandle>>> = Rc::new(Cell::new(None));
    let bump = || CellAction::update(|v: &Value| json!(v.as_i64().unwrap_or(0) + 1));

    let (mine, theirs) = (Rc::clone(&ping_cell), Rc::clone(&pong_cell));
    let ping = FnComponent::new("Ping", move |_props: &ElementProps, hooks: &mut Hooks<'_>| {
        let (_, handle) = hooks.use_state(|| json!(0));
        mine.set(Some(handle));
        if let Some(other) = theirs.get() {
            hooks.update(other, bump());
        }
        Child::Empty
    });
    let (mine, theirs) = (Rc::clone(&pong_cell), Rc::clone(&ping_cell));
    let pong = FnComponent::new("Pong", move |_props: &ElementProps, hooks: &mut Hooks<'_>| {
        let (_, handle) = hooks.use_state(|| json!(0));
        mine.set(Some(handle));
        if let Some(other) = theirs.get() {
            hooks.update(other, bump());
        }
        Child::Empty
    });

    let config = ReconcilerConfig {
        nested_update_limit: 5,
        ..ReconcilerConfig::new()
    };
    let mut r = Reconciler::with_config(config, Host::default());
    let mut log = Log::default();
    r.render(
        vec![Element::function(&ping), Element::function(&pong)],
        Lanes::SYNC,
    );
    let err = r.flush_sync(&mut log, &mut Tracer::none()).expect_err("never settles");
    assert_eq!(err, WalkError::NestedUpdateLimit { limit: 5 }, "limit reported");
    assert_eq!(log.0.len(), 6, "commits up to the limit went through");
    assert!(
        r.flush_sync(&mut log, &mut Tracer::none()).expect("parked").is_empty(),
        "stuck lanes are parked"
    );
}

#[test]
fn copies_per_entity_are_bounded_by_two() {
    let mut r = reconciler();
    let mut log = Log::default();
    let orders: [&[&str]; 4] = [&["a", "b", "c"], &["c", "b", "a"], &["b", "c", "a"], &["a", "b", "c"]];
    for round in 0..10 {
        r.render(list(orders[round % orders.len()]), Lanes::SYNC);
        flush(&mut r, &mut log);
    }
    let entities = r.tree().live_count() as u64;
    assert_eq!(entities, 8, "root, ul, three items and their text");
    assert!(
        r.tree().allocations() <= 2 * entities,
        "{} allocations for {entities} entities",
        r.tree().allocations()
    );
}

#[test]
fn update_lanes_map_to_scheduler_priorities() {
    let mut r = reconciler();
    let lane = r.request_update_lane(arbor_core::EventPriority::Continuous);
    assert_eq!(lane, Lanes::INPUT_CONTINUOUS, "continuous input lane");
    r.render(list(&["a"]), lane);
    assert_eq!(r.scheduler().requests, [SchedulerPriority::UserBlocking], "one request");
    r.render(list(&["b"]), Lanes::SYNC);
    assert_eq!(
        r.scheduler().requests,
        [SchedulerPriority::UserBlocking, SchedulerPriority::Immediate],
        "upgraded"
    );
    r.render(list(&["c"]), Lanes::DEFAULT);
    assert_eq!(r.scheduler().requests.len(), 2, "already scheduled at a higher priority");
}
