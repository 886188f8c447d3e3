// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration model for a VajraPulse run.
//!
//! A run is described by a [`RunPlan`]: the load-pattern specification, the
//! engine/reporting settings, and (for the adaptive mode) the feedback
//! controller settings. Plans are resolved from up to four layers, lowest
//! precedence first: built-in defaults, a configuration file (YAML or JSON),
//! `VAJRAPULSE_*` environment variables, and command-line flags. Each layer
//! is expressed as an [`Options`] value; later layers override earlier ones
//! field by field.
//!
//! Unknown configuration-file keys are rejected rather than ignored, so a
//! typo never silently falls back to a default.

pub mod adaptive;
pub mod duration;
pub mod error;
pub mod file;
pub mod options;
pub mod pattern;
pub mod percentiles;
pub mod plan;

pub use adaptive::{AdaptiveSettings, MaxRate};
pub use error::Error;
pub use file::FileConfig;
pub use options::{BackpressureMode, LoadMode, Options};
pub use pattern::{PatternSpec, StepSpec};
pub use percentiles::PercentileKeys;
pub use plan::{RunPlan, RunSettings};
