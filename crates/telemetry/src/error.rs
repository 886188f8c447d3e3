// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the telemetry crate.

/// Errors that can occur while recording or exporting telemetry.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A record arrived after the aggregator was closed. Recording never
    /// fails for any other reason, so seeing this indicates a lifecycle bug
    /// in the caller.
    #[error("Recording rejected: the aggregator is closed")]
    RecordingRejected,

    /// An exporter failed. The runner logs this and continues the run.
    #[error("Exporter `{exporter}` failed: {details}")]
    ExporterError {
        /// The name of the exporter that failed.
        exporter: &'static str,
        /// A description of the failure.
        details: String,
    },

    /// A metrics provider could not produce a sample. Consumers treat this
    /// as "no new information" rather than a failure.
    #[error("Metrics provider unavailable: {details}")]
    ProviderUnavailable {
        /// Why no sample could be produced.
        details: String,
    },
}

impl Error {
    /// Returns the name of the error variant as a string, used as the stable
    /// error kind in logs.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Error::RecordingRejected => "RecordingRejected",
            Error::ExporterError { .. } => "ExporterError",
            Error::ProviderUnavailable { .. } => "ProviderUnavailable",
        }
    }
}
