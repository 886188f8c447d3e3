// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The VajraPulse execution engine.
//!
//! One engine drives one run: a single scheduling loop samples the
//! [`pattern::LoadPattern`], releases iterations through the [`pacer`], and
//! dispatches each released iteration onto the concurrency substrate chosen
//! by the task's [`task::ConcurrencyHint`]. Workers execute user code,
//! convert panics to failures, and record to the shared aggregator.
//!
//! Shutdown is bounded: `stop()` ceases releases, a drain window lets
//! in-flight iterations finish, a force window cancels stragglers (recorded
//! as cancelled failures), and only then is the substrate torn down.

pub mod adaptive;
pub mod engine;
pub mod error;
pub mod pacer;
pub mod pattern;
pub mod task;

pub use engine::{
    BackpressurePolicy, EngineBuilder, EngineState, EngineStats, ExecutionEngine, StopReason,
};
pub use error::Error;
pub use task::{ConcurrencyHint, Task, TaskError, TaskOutcome};
