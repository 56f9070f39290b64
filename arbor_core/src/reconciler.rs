// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The public driver: accepts updates, picks lanes, runs and commits walks.

use alloc::vec::Vec;

use crate::commit::commit_walk;
use crate::config::ReconcilerConfig;
use crate::element::{Child, Props};
use crate::error::{DispatchError, WalkError};
use crate::hooks::{CellAction, CellUpdate};
use crate::host::{HostScheduler, Mutation, Renderer};
use crate::lane::{EventPriority, Lane, Lanes, RootLanes, SchedulerPriority};
use crate::log::{debug, warn};
use crate::node::{CellHandle, EntityId, NodeId, SlotQueues, TreeSnapshot, WorkNode, WorkTree};
use crate::time::Timestamp;
use crate::trace::{
    CommitEvent, LanesExpiredEvent, Tracer, WalkAbandonEvent, WalkEnd, WalkStartEvent, WalkSummaryBuilder,
    WalkYieldEvent,
};
use crate::update_queue::{StateUpdate, Update};
use crate::walk::{QueueSel, WalkContext, Walker};

/// What a call to [`Reconciler::perform_work`] achieved.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkOutcome {
    /// Nothing was pending.
    Idle,
    /// A time-sliced walk returned control to the host. Another call
    /// resumes it.
    Yielded,
    /// A walk finished and was committed.
    Committed(CommitSummary),
}

/// Description of one commit.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitSummary {
    /// Lanes the walk rendered.
    pub lanes: Lanes,
    /// Mutations handed to the renderer, in order.
    pub mutations: Vec<Mutation>,
    /// Entities freed because they were removed.
    pub removed_entities: usize,
    /// Lanes still pending afterwards.
    pub remaining: Lanes,
    /// Units of work the walk performed.
    pub units: u32,
    /// Times the walk yielded before finishing.
    pub yields: u32,
    /// Whether this was the synchronous retry of a failed walk.
    pub retry: bool,
}

/// Result of [`Reconciler::dispatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The update was queued and a walk was requested.
    Scheduled,
    /// The update cannot change the rendered value. It was queued but no
    /// walk was requested.
    EagerBailout,
}

/// An incremental, priority-scheduled tree reconciler.
///
/// Updates are assigned [`Lanes`]. The reconciler asks its
/// [`HostScheduler`] for time, walks the tree for the most urgent lanes
/// (yielding between units when the walk is time-sliced) and commits
/// finished walks through a [`Renderer`].
#[derive(Debug)]
pub struct Reconciler<S> {
    tree: WorkTree,
    lanes: RootLanes,
    config: ReconcilerConfig,
    scheduler: S,
    walk: Option<WalkContext>,
    walk_counter: u64,
    scheduled: Option<SchedulerPriority>,
    nested_updates: u32,
}

impl<S: HostScheduler> Reconciler<S> {
    /// Creates a reconciler with the default configuration.
    #[must_use]
    pub fn new(scheduler: S) -> Self {
        Self::with_config(ReconcilerConfig::new(), scheduler)
    }

    /// Creates a reconciler with an explicit configuration.
    #[must_use]
    pub fn with_config(config: ReconcilerConfig, scheduler: S) -> Self {
        Self {
            tree: WorkTree::new(),
            lanes: RootLanes::new(),
            config,
            scheduler,
            walk: None,
            walk_counter: 0,
            scheduled: None,
            nested_updates: 0,
        }
    }

    // -- Accessors --

    /// The node store, including the committed tree.
    #[must_use]
    pub fn tree(&self) -> &WorkTree {
        &self.tree
    }

    /// Root lane bookkeeping.
    #[must_use]
    pub fn root_lanes(&self) -> &RootLanes {
        &self.lanes
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// The host scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The host scheduler, mutably.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Lanes of the walk in progress, if any.
    #[must_use]
    pub fn walk_lanes(&self) -> Option<Lanes> {
        self.walk.as_ref().map(|w| w.render_lanes)
    }

    /// Structural snapshot of the committed tree.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        self.tree.snapshot()
    }

    /// Follows child positions from the committed root.
    ///
    /// `&[0, 2]` is the third child of the root's first child.
    #[must_use]
    pub fn find_entity(&self, path: &[usize]) -> Option<EntityId> {
        let mut id = self.tree.current_root();
        for &position in path {
            id = self.tree.children(id).nth(position)?;
        }
        Some(self.tree.entity(id))
    }

    /// The committed copy of `entity`, if it is mounted.
    #[must_use]
    pub fn committed(&self, entity: EntityId) -> Option<&WorkNode> {
        self.committed_id(entity).map(|id| self.tree.get(id))
    }

    fn committed_id(&self, entity: EntityId) -> Option<NodeId> {
        if !self.tree.is_live(entity) {
            return None;
        }
        self.tree
            .preorder(self.tree.current_root())
            .into_iter()
            .map(|(id, _)| id)
            .find(|id| id.slot() == entity.index())
    }

    // -- Lanes --

    /// Lane for an update caused by an event of `priority`.
    #[must_use]
    pub fn request_update_lane(&self, priority: EventPriority) -> Lane {
        priority.lane()
    }

    /// Claims the next transition lane, round-robin.
    pub fn claim_transition_lane(&mut self) -> Lane {
        self.lanes.claim_next_transition_lane()
    }

    /// Claims the next retry lane, round-robin.
    pub fn claim_retry_lane(&mut self) -> Lane {
        self.lanes.claim_next_retry_lane()
    }

    /// Parks `lanes` until they are pinged or a new update arrives.
    pub fn mark_suspended(&mut self, lanes: Lanes) {
        self.lanes.mark_suspended(lanes);
        self.ensure_scheduled();
    }

    /// Makes suspended `lanes` eligible again.
    pub fn mark_pinged(&mut self, lanes: Lanes) {
        self.lanes.mark_pinged(lanes);
        self.ensure_scheduled();
    }

    // -- Updates --

    /// Renders `child` as the root's content on `lane`.
    pub fn render(&mut self, child: impl Into<Child>, lane: Lane) {
        let root = self.tree.current_root();
        let slot = root.slot();
        let walking = self.walk.is_some();
        if let SlotQueues::Root(q) = self.tree.queues_mut(slot) {
            q.enqueue(Update::new(lane, child.into()), walking);
        }
        let entity = self.tree.entity(root);
        self.schedule_update(entity, slot, lane);
        self.entangle(slot, QueueSel::Node, lane);
    }

    /// Queues a change to a stateful component's state.
    pub fn set_state(&mut self, entity: EntityId, update: StateUpdate, lane: Lane) -> Result<(), DispatchError> {
        let slot = self.tree.any_copy(entity).ok_or(DispatchError::Unmounted(entity))?.slot();
        let walking = self.walk.is_some();
        let SlotQueues::Stateful(q) = self.tree.queues_mut(slot) else {
            return Err(DispatchError::WrongKind(entity));
        };
        q.enqueue(Update::new(lane, update), walking);
        self.schedule_update(entity, slot, lane);
        self.entangle(slot, QueueSel::Node, lane);
        Ok(())
    }

    /// Queues a change to a function component's state cell.
    ///
    /// When the entity has no pending work, the new value is computed right
    /// away; if it equals the last rendered value no walk is requested.
    pub fn dispatch(&mut self, cell: CellHandle, action: CellAction, lane: Lane) -> Result<DispatchOutcome, DispatchError> {
        self.enqueue_cell(cell, action, lane, true)
    }

    fn enqueue_cell(
        &mut self,
        cell: CellHandle,
        action: CellAction,
        lane: Lane,
        allow_eager: bool,
    ) -> Result<DispatchOutcome, DispatchError> {
        let entity = cell.entity;
        let copy = self.tree.any_copy(entity).ok_or(DispatchError::Unmounted(entity))?;
        let slot = copy.slot();
        let idle = [copy, copy.alternate()]
            .into_iter()
            .all(|id| self.tree.try_get(id).is_none_or(|n| n.lanes().is_empty()));
        let walking = self.walk.is_some();

        let SlotQueues::Cells(cells) = self.tree.queues_mut(slot) else {
            return Err(DispatchError::WrongKind(entity));
        };
        let q = cells
            .get_mut(cell.cell as usize)
            .ok_or(DispatchError::WrongKind(entity))?;

        let mut eager = None;
        if allow_eager && idle {
            let value = q.eager_state(&action);
            if value == q.last_rendered_state {
                q.shared.enqueue(
                    Update::new(lane, CellUpdate { action, eager: Some(value) }),
                    walking,
                );
                if walking {
                    self.tree.note_interleaved(slot);
                }
                debug!(?entity, cell = cell.cell, "eager bailout");
                return Ok(DispatchOutcome::EagerBailout);
            }
            eager = Some(value);
        }
        q.shared.enqueue(Update::new(lane, CellUpdate { action, eager }), walking);
        self.schedule_update(entity, slot, lane);
        self.entangle(slot, QueueSel::Cell(cell.cell), lane);
        Ok(DispatchOutcome::Scheduled)
    }

    fn schedule_update(&mut self, entity: EntityId, slot: u32, lane: Lane) {
        let now = self.scheduler.now();
        match self.walk.as_mut() {
            Some(ctx) => {
                ctx.deferred_marks.push((entity, lane));
                ctx.interleaved_lanes |= lane;
                self.tree.note_interleaved(slot);
            }
            None => {
                self.tree.mark_update_lane(entity, lane);
            }
        }
        self.lanes.mark_updated(lane, now);
        self.ensure_scheduled();
    }

    fn entangle(&mut self, slot: u32, sel: QueueSel, lane: Lane) {
        if !lane.is_transition() {
            return;
        }
        let pending = self.lanes.pending;
        let entangled = match (self.tree.queues_mut(slot), sel) {
            (SlotQueues::Root(q), QueueSel::Node) => q.entangle_transition(lane, pending),
            (SlotQueues::Stateful(q), QueueSel::Node) => q.entangle_transition(lane, pending),
            (SlotQueues::Cells(cells), QueueSel::Cell(i)) => cells
                .get_mut(i as usize)
                .and_then(|c| c.shared.entangle_transition(lane, pending)),
            _ => None,
        };
        if let Some(lanes) = entangled {
            self.lanes.mark_entangled(lanes);
        }
    }

    /// Requests a host task for the most urgent pending lanes.
    fn ensure_scheduled(&mut self) {
        let wip = self.walk_lanes().unwrap_or(Lanes::NONE);
        let next = self.lanes.next_lanes(wip);
        if next.is_empty() {
            self.scheduled = None;
            return;
        }
        let priority = SchedulerPriority::for_lanes(next);
        if self.scheduled != Some(priority) {
            self.scheduler.schedule_work(priority);
            self.scheduled = Some(priority);
        }
    }

    // -- Work --

    /// Runs one host task: starts or resumes a walk for the most urgent
    /// lanes and commits it when it finishes.
    pub fn perform_work<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        tracer: &mut Tracer<'_>,
    ) -> Result<WorkOutcome, WalkError> {
        self.scheduled = None;
        let outcome = self.run(renderer, tracer, false);
        self.ensure_scheduled();
        outcome
    }

    /// Runs walks without yielding until nothing is pending.
    pub fn flush_sync<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        tracer: &mut Tracer<'_>,
    ) -> Result<Vec<CommitSummary>, WalkError> {
        self.scheduled = None;
        let mut commits = Vec::new();
        let result = loop {
            match self.run(renderer, tracer, true) {
                Ok(WorkOutcome::Committed(summary)) => commits.push(summary),
                Ok(WorkOutcome::Idle) => break Ok(commits),
                Ok(WorkOutcome::Yielded) => {}
                Err(e) => break Err(e),
            }
        };
        self.ensure_scheduled();
        result
    }

    /// Discards the walk in progress, if any.
    pub fn abandon(&mut self) {
        self.abandon_walk(Lanes::NONE, &mut Tracer::none());
        self.ensure_scheduled();
    }

    fn run<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        tracer: &mut Tracer<'_>,
        force_sync: bool,
    ) -> Result<WorkOutcome, WalkError> {
        if self.nested_updates > self.config.nested_update_limit {
            let limit = self.config.nested_update_limit;
            self.nested_updates = 0;
            self.abandon_walk(Lanes::NONE, tracer);
            let stuck = self.lanes.next_lanes(Lanes::NONE);
            self.lanes.mark_suspended(stuck);
            warn!(limit, "nested update limit exceeded");
            return Err(WalkError::NestedUpdateLimit { limit });
        }

        let now = self.scheduler.now();
        let expired = self.lanes.mark_starved_lanes_as_expired(now, &self.config.expiration);
        if !expired.is_empty() {
            debug!(lanes = %expired, "lanes expired");
            tracer.lanes_expired(&LanesExpiredEvent { lanes: expired, now });
        }

        let wip = self.walk_lanes().unwrap_or(Lanes::NONE);
        let next = self.lanes.next_lanes(wip);
        if next.is_empty() {
            self.abandon_walk(Lanes::NONE, tracer);
            return Ok(WorkOutcome::Idle);
        }
        if self.walk.is_some() && next != wip {
            self.abandon_walk(next, tracer);
        }
        let sync = force_sync || self.is_sync(next);
        if self.walk.is_none() {
            self.prepare_walk(next, sync, false, now, tracer);
        }

        let result = self.work(sync, tracer);
        match result {
            Ok(true) => Ok(match self.walk.take() {
                Some(ctx) => WorkOutcome::Committed(self.finish_walk(ctx, renderer, tracer)),
                None => WorkOutcome::Idle,
            }),
            Ok(false) => {
                let now = self.scheduler.now();
                if let Some(ctx) = self.walk.as_mut() {
                    ctx.summary.record_yield();
                    let units = ctx.summary.units();
                    debug!(lanes = %ctx.render_lanes, units, "walk yielded");
                    tracer.walk_yield(&WalkYieldEvent {
                        walk_index: ctx.index,
                        lanes: ctx.render_lanes,
                        units,
                        now,
                    });
                }
                Ok(WorkOutcome::Yielded)
            }
            Err(e) => self.recover(e, renderer, tracer),
        }
    }

    fn is_sync(&self, lanes: Lanes) -> bool {
        lanes.includes_sync()
            || self.lanes.includes_expired(lanes)
            || (!self.config.time_slice_default_updates && lanes.includes_blocking())
    }

    fn prepare_walk(&mut self, lanes: Lanes, sync: bool, retry: bool, now: Timestamp, tracer: &mut Tracer<'_>) {
        self.walk_counter += 1;
        let root = self.tree.current_root();
        let wip = if retry {
            let wip = root.alternate();
            self.tree.reset_for_second_pass(wip, lanes);
            wip
        } else {
            self.tree.clone_for_work(root, Props::None)
        };
        let start = WalkStartEvent {
            walk_index: self.walk_counter,
            lanes,
            sync,
            retry,
            now,
        };
        debug!(walk = self.walk_counter, lanes = %lanes, sync, retry, "walk started");
        tracer.walk_start(&start);
        self.walk = Some(WalkContext::new(
            wip,
            lanes,
            self.config.rerender_limit,
            WalkSummaryBuilder::new(&start),
        ));
    }

    /// Performs units until the walk finishes or the host asks to yield.
    fn work(&mut self, sync: bool, tracer: &mut Tracer<'_>) -> Result<bool, WalkError> {
        let Some(ctx) = self.walk.as_mut() else {
            return Ok(true);
        };
        if sync {
            ctx.summary.set_sync();
        }
        let scheduler = &mut self.scheduler;
        let mut walker = Walker {
            tree: &mut self.tree,
            ctx,
            tracer,
        };
        walker.run(|| !sync && scheduler.should_yield())
    }

    fn finish_walk<R: Renderer + ?Sized>(
        &mut self,
        mut ctx: WalkContext,
        renderer: &mut R,
        tracer: &mut Tracer<'_>,
    ) -> CommitSummary {
        let sync = ctx.summary.start().sync || self.is_sync(ctx.render_lanes);
        let caused_more = !ctx.interleaved_lanes.is_empty() || !ctx.outside.is_empty();
        let committed = commit_walk(&mut self.tree, &mut ctx, renderer);
        let root = self.tree.get(ctx.root);
        let remaining = root.lanes() | root.child_lanes() | ctx.interleaved_lanes;
        self.lanes.mark_finished(remaining);
        self.end_pass(&mut ctx);
        self.nested_updates = if sync && caused_more {
            self.nested_updates + 1
        } else {
            0
        };

        let now = self.scheduler.now();
        let remaining = self.lanes.pending;
        debug!(
            lanes = %ctx.render_lanes,
            mutations = committed.mutations.len(),
            remaining = %remaining,
            "walk committed"
        );
        tracer.commit(&CommitEvent {
            walk_index: ctx.index,
            lanes: ctx.render_lanes,
            mutations: u32::try_from(committed.mutations.len()).unwrap_or(u32::MAX),
            removed_entities: u32::try_from(committed.removed_entities).unwrap_or(u32::MAX),
            remaining,
            now,
        });
        #[cfg(feature = "trace-rich")]
        tracer.mutations(ctx.index, &committed.mutations);
        let summary = ctx.summary.finish(WalkEnd::Committed, now);
        tracer.walk_summary(&summary);

        CommitSummary {
            lanes: ctx.render_lanes,
            mutations: committed.mutations,
            removed_entities: committed.removed_entities,
            remaining,
            units: summary.units,
            yields: summary.yields,
            retry: ctx.summary.start().retry,
        }
    }

    /// Retries a failed walk once, synchronously, over every lane that can
    /// be retried. A second failure is reported.
    fn recover<R: Renderer + ?Sized>(
        &mut self,
        error: WalkError,
        renderer: &mut R,
        tracer: &mut Tracer<'_>,
    ) -> Result<WorkOutcome, WalkError> {
        let Some(mut ctx) = self.walk.take() else {
            return Err(error);
        };
        let failed_lanes = ctx.render_lanes;
        self.discard(&mut ctx);
        let now = self.scheduler.now();
        tracer.walk_summary(&ctx.summary.finish(WalkEnd::Failed, now));

        if ctx.summary.start().retry {
            warn!(%error, "walk failed again after retry");
            self.lanes.mark_suspended(failed_lanes);
            self.nested_updates = 0;
            return Err(error);
        }

        let retry = match self.lanes.lanes_to_retry_on_error() {
            lanes if lanes.is_empty() => failed_lanes,
            lanes => lanes,
        };
        warn!(%error, lanes = %retry, "walk failed, retrying synchronously");
        self.prepare_walk(retry, true, true, now, tracer);
        match self.work(true, tracer) {
            Ok(_) => Ok(match self.walk.take() {
                Some(ctx) => WorkOutcome::Committed(self.finish_walk(ctx, renderer, tracer)),
                None => WorkOutcome::Idle,
            }),
            Err(second) => self.recover(second, renderer, tracer),
        }
    }

    fn abandon_walk(&mut self, next: Lanes, tracer: &mut Tracer<'_>) {
        let Some(mut ctx) = self.walk.take() else {
            return;
        };
        self.discard(&mut ctx);
        let now = self.scheduler.now();
        let units = ctx.summary.units();
        debug!(lanes = %ctx.render_lanes, next = %next, units, "walk abandoned");
        tracer.walk_abandon(&WalkAbandonEvent {
            walk_index: ctx.index,
            lanes: ctx.render_lanes,
            next,
            units,
            now,
        });
        tracer.walk_summary(&ctx.summary.finish(WalkEnd::Abandoned, now));
    }

    /// Frees what a discarded walk created and ends its pass.
    fn discard(&mut self, ctx: &mut WalkContext) {
        for slot in ctx.created.drain(..) {
            self.tree.free_entity(slot);
        }
        self.end_pass(ctx);
    }

    /// Work shared by every pass end: interleaved updates become pending,
    /// deferred lane marks land and render-phase updates to other entities
    /// are queued.
    fn end_pass(&mut self, ctx: &mut WalkContext) {
        self.tree.flush_interleaved();
        for (entity, lane) in ctx.deferred_marks.drain(..) {
            self.tree.mark_update_lane(entity, lane);
        }
        let lane = ctx.render_lanes.pick_arbitrary_lane();
        for (cell, action) in ctx.outside.drain(..) {
            let queued = self.enqueue_cell(cell, action, lane, false);
            if queued.is_err() {
                warn!(result = ?queued, "dropped render-phase update");
            }
        }
    }
}
