// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic collaborators for driving an arbor reconciler in tests and
//! demos.
//!
//! - [`ManualScheduler`]: a virtual clock with scripted yields. Work
//!   requests are recorded and the test calls `perform_work` itself.
//! - [`TaskScheduler`]: a cooperative priority task queue with frame time
//!   slices, expiration-ordered tasks and render-task continuations.
//! - [`RecordingRenderer`]: applies committed mutations to an in-memory host
//!   tree and prints it as markup.

mod manual;
mod recording;
mod task;

pub use manual::ManualScheduler;
pub use recording::{HostNode, RecordingRenderer};
pub use task::{FRAME_YIELD_MS, FrameReport, HostCallback, IDLE_TIMEOUT_MS, TaskId, TaskScheduler, timeout_ms};
