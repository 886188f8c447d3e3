// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The VajraPulse test runner.
//!
//! A [`runner::TestRunner`] owns everything one invocation needs: the
//! aggregator, the exporters, and the periodic reporter. `run` wires an
//! engine around a task and a pattern, drives it to completion, issues one
//! final export with the final snapshot and the run context, and closes
//! resources in reverse creation order.

pub mod error;
pub mod runner;

pub use error::Error;
pub use runner::{RunReport, TestRunner};
