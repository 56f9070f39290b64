// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental, priority-scheduled reconciliation of a tree of nodes.
//!
//! `arbor_core` keeps a committed tree of nodes and turns descriptions of
//! what the tree should look like into an ordered list of host mutations.
//! Work is split into units so a walk can be paused between nodes, resumed
//! later, or thrown away when something more urgent arrives. It is `no_std`
//! compatible (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   render / set_state / dispatch ──► lanes marked on nodes + RootLanes
//!                                            │
//!   HostScheduler::schedule_work ◄───────────┘
//!          │
//!          ▼
//!   Reconciler::perform_work ──► next_lanes ──► walk (begin / complete)
//!          ▲                                      │        │
//!          │ should_yield between units ◄─────────┘        ▼
//!          │                                        commit: Vec<Mutation>
//!          └──────────── remaining lanes ◄───────── Renderer::apply
//! ```
//!
//! **[`lane`]**: the 31-bit priority lane model and per-root bookkeeping
//! (pending, suspended, pinged, expired, entangled lanes).
//!
//! **[`node`]**: the double-buffered node store. Every entity has at most
//! two copies, the committed one and the one being worked on, and they
//! swap roles on commit.
//!
//! **[`update_queue`]**: ordered update queues with lane-aware rebasing.
//! Updates skipped for lack of priority are replayed later from the state
//! they were first skipped at.
//!
//! **[`hooks`]**: state cells of function components.
//!
//! **[`element`]**: child descriptions diffed against the tree.
//!
//! **[`host`]**: the [`HostScheduler`] and [`Renderer`] traits.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types
//! with the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `serde` (disabled by default): Serialization of configuration types.
//! - `tracing` (disabled by default): Log walk progress through `tracing`.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Adds the full
//!   mutation list of every commit.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

mod log;

mod commit;
mod reconcile;
mod walk;

pub mod config;
pub mod element;
pub mod error;
pub mod hooks;
pub mod host;
pub mod lane;
pub mod node;
pub mod reconciler;
pub mod time;
pub mod trace;
pub mod update_queue;

pub use config::{ExpirationConfig, ReconcilerConfig};
pub use element::{
    Child, Component, Element, ElementProps, ElementType, FnComponent, Key, StatefulComponent,
};
pub use error::{DispatchError, WalkError};
pub use hooks::{CellAction, Hooks, Reducer};
pub use host::{HostKind, HostScheduler, Mutation, NullRenderer, Renderer};
pub use lane::{EventPriority, Lane, Lanes, SchedulerPriority};
pub use node::{CellHandle, EntityId};
pub use reconciler::{CommitSummary, DispatchOutcome, Reconciler, WorkOutcome};
pub use time::{Duration, Timestamp};
pub use update_queue::StateUpdate;
