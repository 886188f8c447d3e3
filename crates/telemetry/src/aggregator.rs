// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The shared metrics aggregator.
//!
//! One aggregator exists per run, shared by every worker and the scheduling
//! thread. `record` is the hot path: two or three atomic increments and one
//! striped-histogram record per iteration. Snapshots merge the stripes and
//! are comparatively expensive; they are taken by the periodic reporter and
//! at the end of the run, never per iteration.

use crate::error::Error;
use crate::histogram::StripedHistogram;
use crate::record::ExecutionRecord;
use crate::snapshot::{DistributionStats, PercentileValue, SloAttainment, Snapshot};
use hdrhistogram::Histogram;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use vajrapulse_config::PercentileKeys;

/// Aggregates per-iteration outcomes, latencies, and queue signals.
pub struct MetricsAggregator {
    started_at: Instant,
    closed: AtomicBool,

    total: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    queue_depth: AtomicU64,

    success_latency: StripedHistogram,
    failure_latency: StripedHistogram,
    queue_wait: StripedHistogram,

    percentiles: PercentileKeys,
    slo_buckets: Vec<Duration>,
}

impl MetricsAggregator {
    /// Creates an aggregator reporting the given percentile keys.
    ///
    /// The wall clock starts immediately; create the aggregator when the run
    /// starts.
    #[must_use]
    pub fn new(percentiles: PercentileKeys) -> Self {
        Self::with_slo_buckets(percentiles, Vec::new())
    }

    /// Creates an aggregator that additionally reports SLO attainment for
    /// the given latency bounds.
    #[must_use]
    pub fn with_slo_buckets(percentiles: PercentileKeys, mut slo_buckets: Vec<Duration>) -> Self {
        slo_buckets.sort_unstable();
        slo_buckets.dedup();
        Self {
            started_at: Instant::now(),
            closed: AtomicBool::new(false),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            queue_depth: AtomicU64::new(0),
            success_latency: StripedHistogram::new(),
            failure_latency: StripedHistogram::new(),
            queue_wait: StripedHistogram::new(),
            percentiles,
            slo_buckets,
        }
    }

    /// Records one finalized iteration.
    ///
    /// Safe for parallel invocation from many threads. The only failure mode
    /// is recording after [`MetricsAggregator::close`].
    pub fn record(&self, record: &ExecutionRecord) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::RecordingRejected);
        }
        let _ = self.total.fetch_add(1, Ordering::Relaxed);
        let latency_ns = record.latency_ns();
        if record.outcome.is_success() {
            let _ = self.success.fetch_add(1, Ordering::Relaxed);
            self.success_latency.record(latency_ns);
        } else {
            let _ = self.failure.fetch_add(1, Ordering::Relaxed);
            self.failure_latency.record(latency_ns);
        }
        self.queue_wait.record(record.queue_wait_ns());
        Ok(())
    }

    /// Counts an iteration dropped by the backpressure policy before
    /// dispatch. No execution record exists for it.
    pub fn record_dropped_request(&self) {
        let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an iteration rejected by the backpressure policy.
    pub fn record_rejected_request(&self) {
        let _ = self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Notes an iteration entering the dispatch queue.
    pub fn queue_entered(&self) {
        let _ = self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    /// Notes an iteration leaving the dispatch queue.
    pub fn queue_exited(&self) {
        // Saturating: a stop-time race between enter/exit must not wrap.
        let _ = self
            .queue_depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |depth| {
                depth.checked_sub(1)
            });
    }

    /// Current dispatch-queue depth.
    #[must_use]
    pub fn queue_depth(&self) -> u64 {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Total recorded iterations so far.
    #[must_use]
    pub fn total_executions(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Recorded iterations that failed, so far.
    #[must_use]
    pub fn failed_executions(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }

    /// Observed failure ratio so far; zero before any record.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            self.failure.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    /// Wall time since the aggregator started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// The success-side P99 latency in nanoseconds, if at least two samples
    /// exist. Merges histogram stripes; not for the per-iteration path.
    #[must_use]
    pub fn success_p99_ns(&self) -> Option<u64> {
        let merged = self.success_latency.merged();
        if merged.len() < 2 { None } else { Some(merged.value_at_quantile(0.99)) }
    }

    /// Takes an immutable point-in-time snapshot.
    ///
    /// Counters are read individually, so a snapshot racing active workers
    /// may observe `total` one ahead of a histogram; `total` is re-derived
    /// from the success and failure counters so the `total = success +
    /// failure` invariant always holds within the snapshot itself.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let success = self.success.load(Ordering::Relaxed);
        let failure = self.failure.load(Ordering::Relaxed);
        let success_merged = self.success_latency.merged();
        let failure_merged = self.failure_latency.merged();
        let queue_wait_merged = self.queue_wait.merged();

        Snapshot {
            total: success + failure,
            success,
            failure,
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            elapsed_ms: self.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
            success_percentiles: self.percentile_map(&success_merged),
            failure_percentiles: self.percentile_map(&failure_merged),
            queue_wait_percentiles: self.percentile_map(&queue_wait_merged),
            success_stats: distribution_stats(&success_merged),
            failure_stats: distribution_stats(&failure_merged),
            slo_attainment: self.slo_attainment(&success_merged),
            gauges: Vec::new(),
        }
    }

    /// Closes the aggregator; subsequent records are rejected. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether the aggregator has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn percentile_map(&self, histogram: &Histogram<u64>) -> Vec<PercentileValue> {
        let defined = histogram.len() >= 2;
        self.percentiles
            .thousandths()
            .iter()
            .map(|t| PercentileValue {
                quantile: f64::from(*t) / 1000.0,
                value_ns: defined
                    .then(|| histogram.value_at_quantile(f64::from(*t) / 1000.0) as f64),
            })
            .collect()
    }

    fn slo_attainment(&self, histogram: &Histogram<u64>) -> Vec<SloAttainment> {
        if self.slo_buckets.is_empty() || histogram.is_empty() {
            return Vec::new();
        }
        let total = histogram.len();
        self.slo_buckets
            .iter()
            .map(|bound| {
                let bound_ns = bound.as_nanos().min(u128::from(u64::MAX)) as u64;
                let satisfied = histogram.count_between(0, bound_ns);
                SloAttainment {
                    bound_ms: bound.as_millis().min(u128::from(u64::MAX)) as u64,
                    ratio: satisfied as f64 / total as f64,
                }
            })
            .collect()
    }
}

fn distribution_stats(histogram: &Histogram<u64>) -> DistributionStats {
    if histogram.is_empty() {
        return DistributionStats::default();
    }
    DistributionStats {
        count: histogram.len(),
        mean_ns: histogram.mean(),
        stddev_ns: histogram.stdev(),
        min_ns: histogram.min(),
        max_ns: histogram.max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FailureKind, IterationOutcome};
    use crate::snapshot::percentile;
    use std::sync::Arc;

    fn record_with_latency(iteration: u64, latency: Duration, success: bool) -> ExecutionRecord {
        let now = Instant::now();
        ExecutionRecord {
            iteration,
            enqueued_at: now - latency - Duration::from_micros(10),
            started_at: now - latency,
            completed_at: now,
            outcome: if success {
                IterationOutcome::Success
            } else {
                IterationOutcome::Failure(FailureKind::Task)
            },
        }
    }

    #[tokio::test]
    async fn totals_split_by_outcome() {
        let aggregator = MetricsAggregator::new(PercentileKeys::default());
        for i in 0..9 {
            aggregator
                .record(&record_with_latency(i, Duration::from_millis(1), i % 3 != 0))
                .expect("record");
        }
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.total, 9);
        assert_eq!(snapshot.success, 6);
        assert_eq!(snapshot.failure, 3);
        assert_eq!(snapshot.total, snapshot.success + snapshot.failure);
    }

    #[tokio::test]
    async fn percentiles_are_monotone_and_present_for_every_key() {
        let keys = PercentileKeys::new(&[0.5, 0.9, 0.99]);
        let aggregator = MetricsAggregator::new(keys.clone());
        for i in 1..=100 {
            aggregator
                .record(&record_with_latency(i, Duration::from_micros(i * 100), true))
                .expect("record");
        }
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.success_percentiles.len(), keys.len());
        assert_eq!(snapshot.failure_percentiles.len(), keys.len());
        let values: Vec<f64> = snapshot
            .success_percentiles
            .iter()
            .map(|entry| entry.value_ns.expect("defined with 100 samples"))
            .collect();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]), "{values:?}");
        // The failure side has zero samples: keys present, values undefined.
        assert!(snapshot.failure_percentiles.iter().all(|entry| entry.value_ns.is_none()));
    }

    #[tokio::test]
    async fn single_sample_side_reports_undefined_percentiles() {
        let aggregator = MetricsAggregator::new(PercentileKeys::default());
        aggregator
            .record(&record_with_latency(0, Duration::from_millis(5), true))
            .expect("record");
        let snapshot = aggregator.snapshot();
        assert!(snapshot.success_percentiles.iter().all(|entry| entry.value_ns.is_none()));
        assert_eq!(snapshot.success_stats.count, 1);
    }

    #[tokio::test]
    async fn close_rejects_further_records_idempotently() {
        let aggregator = MetricsAggregator::new(PercentileKeys::default());
        aggregator
            .record(&record_with_latency(0, Duration::from_millis(1), true))
            .expect("record");
        aggregator.close();
        aggregator.close();
        let error = aggregator
            .record(&record_with_latency(1, Duration::from_millis(1), true))
            .expect_err("closed aggregator must reject");
        assert_eq!(error.variant_name(), "RecordingRejected");
        // The earlier record is still visible.
        assert_eq!(aggregator.snapshot().total, 1);
    }

    #[tokio::test]
    async fn queue_depth_never_underflows() {
        let aggregator = MetricsAggregator::new(PercentileKeys::default());
        aggregator.queue_entered();
        aggregator.queue_exited();
        aggregator.queue_exited();
        assert_eq!(aggregator.queue_depth(), 0);
    }

    #[test]
    fn parallel_recording_loses_nothing() {
        let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
        let mut handles = Vec::new();
        for worker in 0..8u64 {
            let aggregator = Arc::clone(&aggregator);
            handles.push(std::thread::spawn(move || {
                for i in 0..1_000 {
                    let now = Instant::now();
                    let record = ExecutionRecord {
                        iteration: worker * 1_000 + i,
                        enqueued_at: now,
                        started_at: now,
                        completed_at: now + Duration::from_micros(50),
                        outcome: IterationOutcome::Success,
                    };
                    aggregator.record(&record).expect("record");
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.total, 8_000);
        assert_eq!(snapshot.success_stats.count, 8_000);
    }

    #[tokio::test]
    async fn slo_attainment_reports_per_bucket_ratio() {
        let aggregator = MetricsAggregator::with_slo_buckets(
            PercentileKeys::default(),
            vec![Duration::from_millis(1), Duration::from_millis(100)],
        );
        for i in 0..10 {
            // Half under 1ms, all under 100ms.
            let latency = if i % 2 == 0 {
                Duration::from_micros(500)
            } else {
                Duration::from_millis(10)
            };
            aggregator.record(&record_with_latency(i, latency, true)).expect("record");
        }
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.slo_attainment.len(), 2);
        assert!((snapshot.slo_attainment[0].ratio - 0.5).abs() < 0.1);
        assert!((snapshot.slo_attainment[1].ratio - 1.0).abs() < 1e-9);
        let p50 = percentile(&snapshot.success_percentiles, 0.5).expect("p50 present");
        assert!(p50.value_ns.is_some());
    }
}
