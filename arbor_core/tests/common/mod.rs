// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared host stand-ins for the integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use arbor_core::node::WorkTree;
use arbor_core::{
    Child, Element, EntityId, HostKind, HostScheduler, Mutation, Reconciler, Renderer, SchedulerPriority,
    Timestamp,
};

/// Virtual clock that yields after a scripted number of units.
#[derive(Debug, Default)]
pub struct Host {
    pub now: u64,
    pub budget: Option<u32>,
    pub requests: Vec<SchedulerPriority>,
}

impl HostScheduler for Host {
    fn schedule_work(&mut self, priority: SchedulerPriority) {
        self.requests.push(priority);
    }

    fn should_yield(&mut self) -> bool {
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
        Timestamp(self.now)
    }
}

/// Keeps every committed batch.
#[derive(Debug, Default)]
pub struct Log(pub Vec<Vec<Mutation>>);

impl Renderer for Log {
    fn apply(&mut self, _tree: &WorkTree, mutations: &[Mutation]) {
        self.0.push(mutations.to_vec());
    }
}

/// `<ul>` with one keyed `<li>` per key, each holding its key as text.
pub fn list(keys: &[&str]) -> Child {
    Element::host("ul")
        .with_children(
            keys.iter()
                .map(|k| Element::host("li").with_key(*k).with_children(*k))
                .collect::<Vec<Element>>(),
        )
        .into()
}

/// Keys of the committed children of the node at `path`.
pub fn keys_at<S: HostScheduler>(r: &Reconciler<S>, path: &[usize]) -> Vec<String> {
    let tree = r.tree();
    let mut id = tree.current_root();
    for &i in path {
        id = tree.children(id).nth(i).expect("path exists");
    }
    tree.children(id)
        .map(|c| tree.get(c).key().unwrap_or("").to_owned())
        .collect()
}

/// Entities of the committed children of the node at `path`.
pub fn entities_at<S: HostScheduler>(r: &Reconciler<S>, path: &[usize]) -> Vec<EntityId> {
    let tree = r.tree();
    let mut id = tree.current_root();
    for &i in path {
        id = tree.children(id).nth(i).expect("path exists");
    }
    tree.children(id).map(|c| tree.entity(c)).collect()
}

/// Text content of the first text node at or below `path`.
pub fn text_at<S: HostScheduler>(r: &Reconciler<S>, path: &[usize]) -> Option<String> {
    let tree = r.tree();
    let mut id = tree.current_root();
    for &i in path {
        id = tree.children(id).nth(i)?;
    }
    tree.preorder(id)
        .into_iter()
        .find_map(|(n, _)| tree.get(n).text().map(str::to_owned))
}

pub fn count(batch: &[Mutation], pred: impl Fn(&Mutation) -> bool) -> usize {
    batch.iter().filter(|m| pred(m)).count()
}

pub fn is_created_element(m: &Mutation, tag: &str) -> bool {
    matches!(m, Mutation::Create { kind: HostKind::Element { tag: t, .. }, .. } if &**t == tag)
}
