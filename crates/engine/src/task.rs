// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The task contract.
//!
//! The engine knows nothing about what a task does; it knows the lifecycle
//! (`init` once, `execute` per iteration, `teardown` once) and the outcome
//! sum type. Success payloads are the task's business and are discarded;
//! failure reasons are kept only long enough to log them.

use async_trait::async_trait;

/// Declares which concurrency substrate suits the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyHint {
    /// The task mostly waits on I/O: many iterations may be in flight,
    /// bounded by the engine's `max_in_flight` option.
    #[default]
    IoBound,
    /// The task burns CPU: in-flight iterations are capped at the available
    /// processor count.
    CpuBound,
}

impl ConcurrencyHint {
    /// Stable label used as the substrate metric tag.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ConcurrencyHint::IoBound => "io",
            ConcurrencyHint::CpuBound => "cpu",
        }
    }
}

/// The outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The iteration succeeded. Any payload the task produced is its own
    /// concern; the engine discards it.
    Success,
    /// The iteration failed.
    Failure {
        /// An opaque message, retained for logging only.
        reason: String,
    },
}

impl TaskOutcome {
    /// Builds a failure outcome from any displayable reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        TaskOutcome::Failure { reason: reason.into() }
    }

    /// Whether this outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// An error from `init` or `teardown`. Fatal for the run.
#[derive(thiserror::Error, Debug)]
#[error("{details}")]
pub struct TaskError {
    /// What went wrong.
    pub details: String,
}

impl TaskError {
    /// Builds an error from any displayable cause.
    pub fn new(details: impl Into<String>) -> Self {
        Self { details: details.into() }
    }
}

/// A unit of user work driven by the engine.
///
/// The engine calls `init` exactly once before the first dispatch,
/// `execute` once per iteration (possibly many concurrently), and
/// `teardown` exactly once after the final completion or on error. A panic
/// inside `execute` is converted to a failure outcome; errors from `init`
/// or `teardown` abort the run.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Which substrate the engine should use.
    fn concurrency_hint(&self) -> ConcurrencyHint {
        ConcurrencyHint::default()
    }

    /// One-time setup before the first iteration.
    async fn init(&self) -> Result<(), TaskError> {
        Ok(())
    }

    /// Executes one iteration. `iteration` is unique and monotonically
    /// increasing within the run.
    async fn execute(&self, iteration: u64) -> TaskOutcome;

    /// One-time cleanup after the last completion or on error.
    async fn teardown(&self) -> Result<(), TaskError> {
        Ok(())
    }
}
