// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Run telemetry for the VajraPulse engine.
//!
//! The hot path of a run is `MetricsAggregator::record`: one call per
//! iteration, invoked concurrently from every worker. Everything on that
//! path is an atomic counter or a striped histogram shard; there is no
//! allocation, no formatted string, and no blocking beyond an uncontended
//! per-stripe lock.
//!
//! Around that hot core sit read-side views: immutable [`snapshot::Snapshot`]s
//! with percentile maps, the [`provider`] traits the adaptive controller
//! samples through a TTL cache, [`backpressure`] levels for the dispatcher,
//! a [`reporter::PeriodicReporter`] that forwards snapshots on a timer, and
//! the [`exporter::SnapshotExporter`] contract.

pub mod aggregator;
pub mod backpressure;
pub mod error;
pub mod exporter;
pub mod histogram;
pub mod names;
pub mod provider;
pub mod record;
pub mod reporter;
pub mod snapshot;

pub use aggregator::MetricsAggregator;
pub use error::Error;
pub use exporter::SnapshotExporter;
pub use record::{ExecutionRecord, FailureKind, IterationOutcome};
pub use snapshot::{Metric, RunContext, Snapshot};
