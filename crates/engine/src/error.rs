// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the execution engine.
//!
//! Per-iteration failures are not errors here: they are recorded to the
//! aggregator and never abort the run. Only lifecycle problems surface to
//! the caller of `run()`.

/// Errors that can occur while driving a run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// `run()` was called while the engine was not in the stopped state.
    #[error("The engine has already been started (state: {state})")]
    AlreadyStarted {
        /// The state the engine was observed in.
        state: &'static str,
    },

    /// `run()` was called after `close()` released the substrate.
    #[error("The engine has been closed")]
    EngineClosed,

    /// `init` or `teardown` of the task failed; fatal for the run.
    #[error("Task lifecycle failed during {phase}: {details}")]
    TaskLifecycleFailed {
        /// Which lifecycle call failed (`init` or `teardown`).
        phase: &'static str,
        /// The task's error message.
        details: String,
    },
}

impl Error {
    /// Returns the name of the error variant as a string, used as the stable
    /// error kind in logs.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Error::AlreadyStarted { .. } => "AlreadyStarted",
            Error::EngineClosed => "EngineClosed",
            Error::TaskLifecycleFailed { .. } => "TaskLifecycleFailed",
        }
    }
}
