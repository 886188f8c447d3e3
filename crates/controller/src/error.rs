// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the runner.

/// Errors that can abort a run at the runner level.
///
/// Exporter failures are deliberately absent: they are logged and the run
/// continues.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The engine aborted the run.
    #[error("An engine error occurred: {0}")]
    EngineError(#[from] vajrapulse_engine::Error),
}

impl Error {
    /// Returns the name of the error variant as a string, used as the stable
    /// error kind in logs.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Error::EngineError(_) => "EngineError",
        }
    }
}
