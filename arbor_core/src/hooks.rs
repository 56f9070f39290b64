// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! State cells for function components.
//!
//! A function component asks for its cells through [`Hooks`] in the same
//! order on every render. Each cell carries its own rebasing queue (see
//! [`rebase`]), so cells of one component are processed independently.
//!
//! Nothing shared with the committed tree is written while rendering: the
//! processed-update counts and last-rendered values are reported back in a
//! [`HookOutcome`] and applied when the walk commits.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use serde_json::Value;

use crate::element::{Child, Component, ElementProps};
use crate::error::WalkError;
use crate::lane::Lanes;
use crate::node::{CellHandle, EntityId};
use crate::update_queue::{SharedQueue, UpdateQueue, rebase};

/// A reducer: `(state, action) -> state`.
pub type Reducer = Rc<dyn Fn(&Value, &Value) -> Value>;

/// A change to one state cell.
#[derive(Clone)]
pub enum CellAction {
    /// Replace the value.
    Set(Value),
    /// Compute the value from the previous one.
    Update(Rc<dyn Fn(&Value) -> Value>),
    /// Feed an action through the cell's reducer.
    Dispatch(Value),
}

impl CellAction {
    /// An [`Update`](Self::Update) from a closure.
    #[must_use]
    pub fn update(f: impl Fn(&Value) -> Value + 'static) -> Self {
        Self::Update(Rc::new(f))
    }
}

impl fmt::Debug for CellAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(v) => write!(f, "Set({v})"),
            Self::Update(_) => f.write_str("Update(..)"),
            Self::Dispatch(v) => write!(f, "Dispatch({v})"),
        }
    }
}

/// How a cell turns actions into values.
#[derive(Clone, Default)]
pub enum CellReducer {
    /// `use_state`: a dispatched value replaces the state.
    #[default]
    Basic,
    /// `use_reducer`.
    Custom(Reducer),
}

impl CellReducer {
    /// Applies `action` to `state`.
    #[must_use]
    pub fn reduce(&self, state: &Value, action: &CellAction) -> Value {
        match (self, action) {
            (_, CellAction::Set(v)) => v.clone(),
            (_, CellAction::Update(f)) => f(state),
            (Self::Basic, CellAction::Dispatch(v)) => v.clone(),
            (Self::Custom(r), CellAction::Dispatch(a)) => r(state, a),
        }
    }
}

impl fmt::Debug for CellReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("Basic"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A queued cell change, with the state computed eagerly at dispatch time
/// when one was.
#[derive(Clone, Debug)]
pub struct CellUpdate {
    /// The change.
    pub action: CellAction,
    /// Value computed at dispatch time against the last rendered state.
    pub eager: Option<Value>,
}

/// One state cell as stored on a work node.
#[derive(Clone, Debug)]
pub struct StateCell {
    pub(crate) memoized: Value,
    pub(crate) queue: UpdateQueue<Value, CellUpdate>,
}

impl StateCell {
    fn new(value: Value) -> Self {
        Self {
            memoized: value.clone(),
            queue: UpdateQueue::new(value),
        }
    }

    /// Value produced by the last render.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.memoized
    }

    /// Carried-over updates.
    #[must_use]
    pub fn queue(&self) -> &UpdateQueue<Value, CellUpdate> {
        &self.queue
    }
}

/// Pending updates of one cell, shared by both copies of its entity.
#[derive(Clone, Debug)]
pub(crate) struct CellQueue {
    pub(crate) shared: SharedQueue<CellUpdate>,
    pub(crate) last_rendered_reducer: CellReducer,
    pub(crate) last_rendered_state: Value,
}

impl CellQueue {
    fn new(reducer: CellReducer, state: Value) -> Self {
        Self {
            shared: SharedQueue::new(),
            last_rendered_reducer: reducer,
            last_rendered_state: state,
        }
    }

    /// Result of applying `action` to the last committed render.
    pub(crate) fn eager_state(&self, action: &CellAction) -> Value {
        self.last_rendered_reducer
            .reduce(&self.last_rendered_state, action)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Mount,
    Update,
    Rerender,
}

/// Render-time access to a function component's state cells.
pub struct Hooks<'a> {
    entity: EntityId,
    component: &'a str,
    cells: &'a mut Vec<StateCell>,
    queues: &'a [CellQueue],
    mode: Mode,
    cursor: usize,
    render_lanes: Lanes,
    remaining: Lanes,
    did_receive_update: bool,
    consumed: Vec<(u32, usize)>,
    reducers: Vec<CellReducer>,
    render_phase: Vec<(u32, CellAction)>,
    replay: Vec<(u32, CellAction)>,
    outside: Vec<(CellHandle, CellAction)>,
    error: Option<WalkError>,
}

impl fmt::Debug for Hooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("entity", &self.entity)
            .field("mode", &self.mode)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl<'a> Hooks<'a> {
    fn new(
        entity: EntityId,
        component: &'a str,
        cells: &'a mut Vec<StateCell>,
        queues: &'a [CellQueue],
        mount: bool,
        render_lanes: Lanes,
    ) -> Self {
        Self {
            entity,
            component,
            cells,
            queues,
            mode: if mount { Mode::Mount } else { Mode::Update },
            cursor: 0,
            render_lanes,
            remaining: Lanes::NONE,
            did_receive_update: false,
            consumed: Vec::new(),
            reducers: Vec::new(),
            render_phase: Vec::new(),
            replay: Vec::new(),
            outside: Vec::new(),
            error: None,
        }
    }

    /// Entity being rendered.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Lanes of the walk rendering this component.
    #[must_use]
    pub fn render_lanes(&self) -> Lanes {
        self.render_lanes
    }

    /// Declares the next cell, holding a plain value.
    pub fn use_state(&mut self, init: impl FnOnce() -> Value) -> (Value, CellHandle) {
        self.use_cell(CellReducer::Basic, init)
    }

    /// Declares the next cell, driven by `reducer`.
    pub fn use_reducer(
        &mut self,
        reducer: &Reducer,
        init: impl FnOnce() -> Value,
    ) -> (Value, CellHandle) {
        self.use_cell(CellReducer::Custom(Rc::clone(reducer)), init)
    }

    /// Requests a change while rendering.
    ///
    /// Changes to this component's own cells re-run the render immediately
    /// with the change applied. Changes to other entities are queued as if
    /// they arrived during the walk.
    pub fn update(&mut self, cell: CellHandle, action: CellAction) {
        if cell.entity == self.entity {
            self.render_phase.push((cell.cell, action));
        } else {
            self.outside.push((cell, action));
        }
    }

    fn use_cell(&mut self, reducer: CellReducer, init: impl FnOnce() -> Value) -> (Value, CellHandle) {
        let idx = self.cursor;
        self.cursor += 1;
        let handle = CellHandle {
            entity: self.entity,
            cell: idx as u32,
        };
        if self.reducers.len() <= idx {
            self.reducers.resize(idx + 1, CellReducer::Basic);
        }
        self.reducers[idx] = reducer.clone();

        match self.mode {
            Mode::Mount => {
                let cell = StateCell::new(init());
                let value = cell.memoized.clone();
                self.cells.push(cell);
                (value, handle)
            }
            Mode::Update => {
                let Some(cell) = self.cells.get_mut(idx) else {
                    return (Value::Null, handle);
                };
                let pending = self.queues.get(idx).map_or(&[][..], |q| q.shared.pending());
                let rebased = rebase(&cell.queue, pending, self.render_lanes, |state, u| {
                    match &u.eager {
                        Some(eager) => eager.clone(),
                        None => reducer.reduce(state, &u.action),
                    }
                });
                if rebased.state != cell.memoized {
                    self.did_receive_update = true;
                }
                if !pending.is_empty() {
                    self.consumed.push((handle.cell, pending.len()));
                }
                self.remaining |= rebased.remaining;
                cell.memoized = rebased.state;
                cell.queue = rebased.queue;
                (cell.memoized.clone(), handle)
            }
            Mode::Rerender => {
                let Some(cell) = self.cells.get_mut(idx) else {
                    return (Value::Null, handle);
                };
                let mut next = cell.memoized.clone();
                for (_, action) in self.replay.iter().filter(|(c, _)| *c == handle.cell) {
                    next = reducer.reduce(&next, action);
                }
                if next != cell.memoized {
                    self.did_receive_update = true;
                    cell.memoized = next;
                    if cell.queue.base.is_empty() {
                        cell.queue.base_state = cell.memoized.clone();
                    }
                }
                (cell.memoized.clone(), handle)
            }
        }
    }

    fn finish_pass(&mut self) {
        if self.error.is_some() || self.cursor == self.cells.len() {
            return;
        }
        self.error = Some(WalkError::HookCountMismatch {
            entity: self.entity,
            component: self.component.into(),
            expected: self.cells.len(),
            found: self.cursor,
        });
    }

    fn start_rerender(&mut self) {
        self.replay = core::mem::take(&mut self.render_phase);
        self.mode = Mode::Rerender;
        self.cursor = 0;
    }
}

/// What a function component's render left to apply.
#[derive(Debug)]
pub(crate) struct HookOutcome {
    /// Children produced by the final render pass.
    pub(crate) child: Child,
    /// Any cell changed value.
    pub(crate) did_receive_update: bool,
    /// Lanes of updates left in the cells' carried-over lists.
    pub(crate) remaining: Lanes,
    /// `(cell, count)`: pending updates merged into the carried-over lists.
    pub(crate) consumed: Vec<(u32, usize)>,
    /// Queues for cells created by a mount.
    pub(crate) mounted: Vec<CellQueue>,
    /// `(cell, value, reducer)` of the final render pass.
    pub(crate) rendered: Vec<(u32, Value, CellReducer)>,
    /// Changes requested for other entities.
    pub(crate) outside: Vec<(CellHandle, CellAction)>,
    /// Fatal error.
    pub(crate) error: Option<WalkError>,
}

/// Inputs for rendering one function component.
pub(crate) struct RenderRequest<'a> {
    pub(crate) entity: EntityId,
    pub(crate) component: &'a dyn Component,
    pub(crate) props: &'a ElementProps,
    pub(crate) queues: &'a [CellQueue],
    pub(crate) mount: bool,
    pub(crate) render_lanes: Lanes,
    pub(crate) rerender_limit: u32,
}

/// Renders a function component, re-running it while it keeps scheduling
/// changes to its own cells.
pub(crate) fn render_function(req: RenderRequest<'_>, cells: &mut Vec<StateCell>) -> HookOutcome {
    let name = req.component.name();
    let mut hooks = Hooks::new(req.entity, name, cells, req.queues, req.mount, req.render_lanes);
    let mut child = req.component.render(req.props, &mut hooks);
    hooks.finish_pass();

    let mut rerenders = 0_u32;
    while hooks.error.is_none() && !hooks.render_phase.is_empty() {
        rerenders += 1;
        if rerenders >= req.rerender_limit {
            hooks.error = Some(WalkError::TooManyRerenders {
                entity: req.entity,
                component: name.into(),
                limit: req.rerender_limit,
            });
            break;
        }
        hooks.start_rerender();
        child = req.component.render(req.props, &mut hooks);
        hooks.finish_pass();
    }

    let Hooks {
        cells,
        mode: _,
        did_receive_update,
        remaining,
        consumed,
        reducers,
        outside,
        error,
        ..
    } = hooks;

    let rendered: Vec<_> = cells
        .iter()
        .zip(reducers)
        .enumerate()
        .map(|(i, (cell, reducer))| (i as u32, cell.memoized.clone(), reducer))
        .collect();
    let mounted = if req.mount {
        rendered
            .iter()
            .map(|(_, value, reducer)| CellQueue::new(reducer.clone(), value.clone()))
            .collect()
    } else {
        Vec::new()
    };

    HookOutcome {
        child,
        did_receive_update,
        remaining,
        consumed,
        mounted,
        rendered,
        outside,
        error,
    }
}
