// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the config crate.
//!
//! All variants denote an invalid configuration in the sense of the run-plan
//! contract: the caller of [`crate::plan::RunPlan::resolve`] must surface
//! them before any engine resource is created.

use miette::Diagnostic;

/// Errors that can occur while loading, merging, or validating a run
/// configuration.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// An error that occurred while reading a configuration file.
    #[error("File read error for `{path}`: {details}")]
    #[diagnostic(code(vajrapulse::config::file_read_error))]
    FileReadError {
        /// The path that could not be read.
        path: String,
        /// A description of the error that occurred.
        details: String,
    },

    /// The configuration file extension maps to no supported format.
    #[error("Unsupported config format for `{path}` (expected .yaml, .yml, or .json)")]
    #[diagnostic(code(vajrapulse::config::unsupported_format))]
    UnsupportedFormat {
        /// The path with the unrecognized extension.
        path: String,
    },

    /// An error that occurred while deserializing a configuration file.
    /// Unknown keys are rejected and surface through this variant.
    #[error("{format} deserialization error for `{path}`: {details}")]
    #[diagnostic(code(vajrapulse::config::deserialization_error))]
    DeserializationError {
        /// The path of the offending file.
        path: String,
        /// The format of the configuration file (e.g. "YAML").
        format: &'static str,
        /// A description of the error that occurred.
        details: String,
    },

    /// An option failed validation or a required option is missing.
    #[error("Invalid option `{option}`: {details}")]
    #[diagnostic(code(vajrapulse::config::invalid_option))]
    InvalidOption {
        /// The option name, as spelled on the command line.
        option: &'static str,
        /// Why the value was rejected.
        details: String,
    },

    /// A duration string could not be parsed.
    #[error("Invalid duration `{value}` for `{option}`: {details}")]
    #[diagnostic(code(vajrapulse::config::invalid_duration))]
    InvalidDuration {
        /// The option name.
        option: &'static str,
        /// The rejected input.
        value: String,
        /// Why parsing failed.
        details: String,
    },

    /// A `rate:duration` step list could not be parsed.
    #[error("Invalid step segment `{segment}`: {details}")]
    #[diagnostic(code(vajrapulse::config::invalid_steps))]
    InvalidSteps {
        /// The offending `rate:duration` segment.
        segment: String,
        /// Why parsing failed.
        details: String,
    },

    /// The adaptive settings violate an invariant (e.g. min > max).
    #[error("Invalid adaptive settings: {details}")]
    #[diagnostic(code(vajrapulse::config::invalid_adaptive))]
    InvalidAdaptive {
        /// Which invariant was violated.
        details: String,
    },
}

impl Error {
    /// Returns the name of the error variant as a string, used as the stable
    /// error kind in logs.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Error::FileReadError { .. } => "FileReadError",
            Error::UnsupportedFormat { .. } => "UnsupportedFormat",
            Error::DeserializationError { .. } => "DeserializationError",
            Error::InvalidOption { .. } => "InvalidOption",
            Error::InvalidDuration { .. } => "InvalidDuration",
            Error::InvalidSteps { .. } => "InvalidSteps",
            Error::InvalidAdaptive { .. } => "InvalidAdaptive",
        }
    }
}
