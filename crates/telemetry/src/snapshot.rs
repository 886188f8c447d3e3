// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Immutable aggregated views of a run.
//!
//! A [`Snapshot`] is a point-in-time read of the aggregator: counters are
//! monotonic, and a reader may observe a count one ahead of a percentile
//! sample — that skew is tolerated by design. Snapshots serialize to JSON
//! with counts preserved exactly; undefined percentile values (fewer than
//! two samples on that side) serialize as `null`.

use crate::names;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A metric tag: key and value.
pub type Tag = (Cow<'static, str>, Cow<'static, str>);

/// One exported metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// The stable metric name (see [`crate::names`]).
    pub name: Cow<'static, str>,
    /// Tags attached to the sample.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// The sample value.
    pub value: f64,
}

impl Metric {
    /// Builds an untagged gauge sample.
    #[must_use]
    pub fn gauge(name: &'static str, value: f64) -> Self {
        Self { name: Cow::Borrowed(name), tags: Vec::new(), value }
    }

    /// Builds a sample with one static tag.
    #[must_use]
    pub fn tagged(
        name: &'static str,
        key: &'static str,
        tag_value: &'static str,
        value: f64,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            tags: vec![(Cow::Borrowed(key), Cow::Borrowed(tag_value))],
            value,
        }
    }
}

/// A live source of gauge samples attached to the periodic reporter.
///
/// The engine and the adaptive controller implement this to surface their
/// atomics without the reporter depending on them.
pub trait GaugeSource: Send + Sync {
    /// Appends current samples to `out`.
    fn collect(&self, out: &mut Vec<Metric>);
}

/// One percentile entry of a latency map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    /// The quantile in (0, 1], rounded to three decimals.
    pub quantile: f64,
    /// The latency at that quantile in nanoseconds, or `None` when the side
    /// has fewer than two samples.
    pub value_ns: Option<f64>,
}

impl PercentileValue {
    /// The value, with `None` read back as NaN.
    #[must_use]
    pub fn value_or_nan(&self) -> f64 {
        self.value_ns.unwrap_or(f64::NAN)
    }
}

/// Looks up a quantile in a percentile map.
#[must_use]
pub fn percentile(map: &[PercentileValue], quantile: f64) -> Option<PercentileValue> {
    map.iter().find(|entry| (entry.quantile - quantile).abs() < 5e-4).copied()
}

/// Statistical summary of one outcome side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DistributionStats {
    /// Number of samples.
    pub count: u64,
    /// Mean latency in nanoseconds; zero when empty.
    pub mean_ns: f64,
    /// Standard deviation in nanoseconds; zero when empty.
    pub stddev_ns: f64,
    /// Minimum latency in nanoseconds; zero when empty.
    pub min_ns: u64,
    /// Maximum latency in nanoseconds; zero when empty.
    pub max_ns: u64,
}

/// Attainment of one configured SLO latency bound, over successes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SloAttainment {
    /// The latency bound in milliseconds.
    pub bound_ms: u64,
    /// Fraction of successful iterations at or under the bound, in [0, 1].
    pub ratio: f64,
}

/// An immutable aggregated view of the run at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Total recorded iterations; always `success + failure`.
    pub total: u64,
    /// Successful iterations.
    pub success: u64,
    /// Failed iterations.
    pub failure: u64,
    /// Iterations dropped before dispatch by the backpressure policy.
    pub dropped: u64,
    /// Iterations rejected by the backpressure policy.
    pub rejected: u64,
    /// Dispatch-queue depth at snapshot time.
    pub queue_depth: u64,
    /// Wall time since the aggregator started, in milliseconds.
    pub elapsed_ms: u64,
    /// Success-side latency percentiles.
    pub success_percentiles: Vec<PercentileValue>,
    /// Failure-side latency percentiles.
    pub failure_percentiles: Vec<PercentileValue>,
    /// Queue-wait percentiles.
    pub queue_wait_percentiles: Vec<PercentileValue>,
    /// Success-side statistics.
    pub success_stats: DistributionStats,
    /// Failure-side statistics.
    pub failure_stats: DistributionStats,
    /// SLO attainment per configured bound; empty when none configured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slo_attainment: Vec<SloAttainment>,
    /// Gauge samples attached by the reporter; empty on bare snapshots.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gauges: Vec<Metric>,
}

impl Snapshot {
    /// Returns a copy of the snapshot with the given gauges attached.
    #[must_use]
    pub fn with_gauges(mut self, gauges: Vec<Metric>) -> Self {
        self.gauges = gauges;
        self
    }

    /// The observed failure ratio; zero before any record.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.failure as f64 / self.total as f64 }
    }

    /// Flattens the aggregator-side §6 metrics plus the attached gauges.
    #[must_use]
    pub fn metrics(&self) -> Vec<Metric> {
        let elapsed_secs = (self.elapsed_ms as f64 / 1_000.0).max(f64::MIN_POSITIVE);
        let mut out = vec![
            Metric::gauge(names::EXECUTION_TOTAL, self.total as f64),
            Metric::gauge(names::BACKPRESSURE_DROPPED, self.dropped as f64),
            Metric::gauge(names::BACKPRESSURE_REJECTED, self.rejected as f64),
            Metric::gauge(names::QUEUE_SIZE, self.queue_depth as f64),
            Metric::tagged(
                names::RESPONSE_TPS,
                names::TAG_TYPE,
                "total",
                self.total as f64 / elapsed_secs,
            ),
            Metric::tagged(
                names::RESPONSE_TPS,
                names::TAG_TYPE,
                "success",
                self.success as f64 / elapsed_secs,
            ),
            Metric::tagged(
                names::RESPONSE_TPS,
                names::TAG_TYPE,
                "failure",
                self.failure as f64 / elapsed_secs,
            ),
        ];
        out.extend(self.gauges.iter().cloned());
        out
    }
}

/// Immutable description of one run, attached to every export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    /// The run identifier tagging all telemetry.
    pub run_id: String,
    /// Wall-clock start of the run.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// The load-pattern label (e.g. `static`, `adaptive`).
    pub pattern: String,
    /// The task identifier.
    pub task: String,
    /// Host description captured at run start.
    pub host: HostInfo,
}

/// Host description captured once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HostInfo {
    /// Operating system name and version.
    pub os: String,
    /// Logical CPU count.
    pub cpus: usize,
    /// Total physical memory in bytes.
    pub total_memory_bytes: u64,
}

impl HostInfo {
    /// Captures the current host's description.
    #[must_use]
    pub fn capture() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        Self {
            os: format!(
                "{} {}",
                sysinfo::System::name().unwrap_or_else(|| "unknown".to_owned()),
                sysinfo::System::os_version().unwrap_or_default()
            ),
            cpus: num_logical_cpus(),
            total_memory_bytes: system.total_memory(),
        }
    }
}

fn num_logical_cpus() -> usize {
    std::thread::available_parallelism().map(usize::from).unwrap_or(1)
}
