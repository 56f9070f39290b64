// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A cooperative priority task scheduler with a virtual clock.
//!
//! Tasks wait in a min-heap ordered by `(expiration, id)`. The expiration
//! is the enqueue time plus a per-priority timeout, so an old low-priority
//! task eventually outranks newer urgent ones. A frame runs tasks until the
//! heap is empty or the frame's time slice is used up; tasks that are
//! already expired still run past the slice.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;

use arbor_core::trace::Tracer;
use arbor_core::{
    CommitSummary, Duration, HostScheduler, Reconciler, Renderer, SchedulerPriority, Timestamp, WalkError,
    WorkOutcome,
};

/// Host work queued on a [`TaskScheduler`] that is not a render.
pub type HostCallback = Box<dyn FnOnce(&mut Reconciler<TaskScheduler>)>;

/// Timeout of idle tasks: effectively never.
pub const IDLE_TIMEOUT_MS: i64 = 1_073_741_823;

/// Default frame time slice.
pub const FRAME_YIELD_MS: u64 = 5;

/// Milliseconds a task of `priority` may wait before it counts as expired.
#[must_use]
pub const fn timeout_ms(priority: SchedulerPriority) -> i64 {
    match priority {
        SchedulerPriority::Immediate => -1,
        SchedulerPriority::UserBlocking => 250,
        SchedulerPriority::Normal => 5_000,
        SchedulerPriority::Low => 10_000,
        SchedulerPriority::Idle => IDLE_TIMEOUT_MS,
    }
}

/// Handle to a queued task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

enum Job {
    Render,
    Callback(HostCallback),
}

struct Task {
    priority: SchedulerPriority,
    expiration: i64,
    job: Job,
}

#[derive(Clone, Copy, Debug)]
struct Running {
    id: u64,
    priority: SchedulerPriority,
    expiration: i64,
}

/// What one frame did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Tasks run, render and callback.
    pub tasks_run: u32,
    /// Renders that yielded.
    pub yields: u32,
    /// Commits, in order.
    pub commits: Vec<CommitSummary>,
    /// Tasks are still queued.
    pub more: bool,
}

/// Priority task scheduler that implements [`HostScheduler`].
///
/// The reconciler's work requests become render tasks. Only one render task
/// is queued at a time: a request at a new priority replaces it, and a
/// request made while the render task is running at the same priority
/// continues that task (same id, same expiration).
pub struct TaskScheduler {
    now: Timestamp,
    frame_start: Timestamp,
    yield_interval: Duration,
    unit_cost: Duration,
    heap: BinaryHeap<Reverse<(i64, u64)>>,
    tasks: BTreeMap<u64, Task>,
    next_id: u64,
    render_task: Option<u64>,
    running: Option<Running>,
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("now", &self.now)
            .field("queued", &self.tasks.len())
            .field("render_task", &self.render_task)
            .finish_non_exhaustive()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    /// A scheduler at time zero with a 5 ms frame slice and 1 ms per unit
    /// of work.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Timestamp::ZERO,
            frame_start: Timestamp::ZERO,
            yield_interval: Duration::from_millis(FRAME_YIELD_MS),
            unit_cost: Duration::from_millis(1),
            heap: BinaryHeap::new(),
            tasks: BTreeMap::new(),
            next_id: 1,
            render_task: None,
            running: None,
        }
    }

    /// Sets the simulated cost of one unit of work.
    #[must_use]
    pub fn with_unit_cost(mut self, cost: Duration) -> Self {
        self.unit_cost = cost;
        self
    }

    /// Sets the frame time slice.
    #[must_use]
    pub fn with_yield_interval(mut self, interval: Duration) -> Self {
        self.yield_interval = interval;
        self
    }

    /// Moves the clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.now = self.now + by;
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tasks.len()
    }

    /// The queued render task, if any.
    #[must_use]
    pub fn render_task(&self) -> Option<TaskId> {
        self.render_task.map(TaskId)
    }

    /// Queues `callback` at `priority`.
    pub fn schedule_callback(
        &mut self,
        priority: SchedulerPriority,
        callback: impl FnOnce(&mut Reconciler<Self>) + 'static,
    ) -> TaskId {
        TaskId(self.push(priority, Job::Callback(Box::new(callback))))
    }

    /// Drops a queued task. Returns `false` when it already ran.
    pub fn cancel(&mut self, task: TaskId) -> bool {
        if self.render_task == Some(task.0) {
            self.render_task = None;
        }
        self.tasks.remove(&task.0).is_some()
    }

    fn now_ms(&self) -> i64 {
        i64::try_from(self.now.millis()).unwrap_or(i64::MAX)
    }

    fn push(&mut self, priority: SchedulerPriority, job: Job) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let expiration = self.now_ms().saturating_add(timeout_ms(priority));
        self.insert(id, priority, expiration, job);
        id
    }

    fn insert(&mut self, id: u64, priority: SchedulerPriority, expiration: i64, job: Job) {
        self.heap.push(Reverse((expiration, id)));
        self.tasks.insert(
            id,
            Task {
                priority,
                expiration,
                job,
            },
        );
    }

    /// Earliest live task, discarding cancelled heap entries.
    fn peek(&mut self) -> Option<(u64, i64)> {
        while let Some(&Reverse((expiration, id))) = self.heap.peek() {
            if self.tasks.get(&id).is_some_and(|t| t.expiration == expiration) {
                return Some((id, expiration));
            }
            self.heap.pop();
        }
        None
    }

    fn frame_elapsed(&self) -> bool {
        self.now.saturating_duration_since(self.frame_start) >= self.yield_interval
    }

    /// Runs one frame of tasks against `reconciler`.
    pub fn run_frame<R: Renderer + ?Sized>(
        reconciler: &mut Reconciler<Self>,
        renderer: &mut R,
        tracer: &mut Tracer<'_>,
    ) -> Result<FrameReport, WalkError> {
        let mut report = FrameReport::default();
        {
            let s = reconciler.scheduler_mut();
            s.frame_start = s.now;
        }
        loop {
            let s = reconciler.scheduler_mut();
            let Some((id, expiration)) = s.peek() else {
                break;
            };
            if expiration > s.now_ms() && s.frame_elapsed() {
                break;
            }
            s.heap.pop();
            let Some(task) = s.tasks.remove(&id) else {
                continue;
            };
            report.tasks_run += 1;
            match task.job {
                Job::Render => {
                    if s.render_task == Some(id) {
                        s.render_task = None;
                    }
                    s.running = Some(Running {
                        id,
                        priority: task.priority,
                        expiration,
                    });
                    tracing::trace!(task = id, priority = ?task.priority, "render task");
                    let outcome = reconciler.perform_work(renderer, tracer);
                    reconciler.scheduler_mut().running = None;
                    match outcome? {
                        WorkOutcome::Committed(summary) => report.commits.push(summary),
                        WorkOutcome::Yielded => report.yields += 1,
                        WorkOutcome::Idle => {}
                    }
                }
                Job::Callback(callback) => callback(reconciler),
            }
        }
        report.more = reconciler.scheduler_mut().peek().is_some();
        Ok(report)
    }

    /// Runs frames until nothing is queued or `max_frames` frames ran,
    /// advancing the clock by `gap` between frames.
    pub fn run_until_idle<R: Renderer + ?Sized>(
        reconciler: &mut Reconciler<Self>,
        renderer: &mut R,
        tracer: &mut Tracer<'_>,
        gap: Duration,
        max_frames: u32,
    ) -> Result<Vec<FrameReport>, WalkError> {
        let mut frames = Vec::new();
        for _ in 0..max_frames {
            let report = Self::run_frame(reconciler, renderer, tracer)?;
            let more = report.more;
            frames.push(report);
            if !more {
                break;
            }
            reconciler.scheduler_mut().advance(gap);
        }
        Ok(frames)
    }
}

impl HostScheduler for TaskScheduler {
    fn schedule_work(&mut self, priority: SchedulerPriority) {
        if let Some(running) = self.running.take_if(|r| r.priority == priority) {
            if let Some(old) = self.render_task.take() {
                self.tasks.remove(&old);
            }
            self.insert(running.id, priority, running.expiration, Job::Render);
            self.render_task = Some(running.id);
            return;
        }
        if let Some(old) = self.render_task.take() {
            self.tasks.remove(&old);
        }
        self.render_task = Some(self.push(priority, Job::Render));
    }

    fn should_yield(&mut self) -> bool {
        self.now = self.now + self.unit_cost;
        self.frame_elapsed()
    }

    fn now(&self) -> Timestamp {
        self.now
    }
}
