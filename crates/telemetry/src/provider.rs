// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Read-only metric views for feedback consumers.
//!
//! The adaptive controller queries the aggregator on every rate sample,
//! which would contend with the hot path if each query merged histograms or
//! even touched the counters at full query rate. [`CachedMetricsProvider`]
//! bounds that cost: the underlying provider is sampled at most once per
//! TTL, and every other caller gets the cached value.

use crate::aggregator::MetricsAggregator;
use crate::error::Error;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default TTL of the cached provider.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(100);

/// One sample of run-level feedback metrics.
///
/// Counts are cumulative over the run; consumers that care about recent
/// behavior (the adaptive controller) difference two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSample {
    /// Total recorded iterations.
    pub total_executions: u64,
    /// Recorded iterations that failed.
    pub failed_executions: u64,
}

impl MetricsSample {
    /// The cumulative failure ratio, in [0, 1]; zero before any record.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        if self.total_executions == 0 {
            0.0
        } else {
            self.failed_executions as f64 / self.total_executions as f64
        }
    }

    /// The failure ratio of the window between `earlier` and `self`, or
    /// `None` when no executions landed in between.
    #[must_use]
    pub fn ratio_since(&self, earlier: &MetricsSample) -> Option<f64> {
        let total = self.total_executions.saturating_sub(earlier.total_executions);
        if total == 0 {
            return None;
        }
        let failed = self.failed_executions.saturating_sub(earlier.failed_executions);
        Some(failed as f64 / total as f64)
    }
}

/// A source of feedback metrics.
pub trait MetricsProvider: Send + Sync {
    /// Produces a current sample.
    ///
    /// Errors mean "no new information"; consumers hold their previous
    /// decision rather than fail.
    fn sample(&self) -> Result<MetricsSample, Error>;
}

/// The aggregator itself is the canonical provider.
impl MetricsProvider for MetricsAggregator {
    fn sample(&self) -> Result<MetricsSample, Error> {
        Ok(MetricsSample {
            total_executions: self.total_executions(),
            failed_executions: self.failed_executions(),
        })
    }
}

struct CachedEntry {
    taken_at: Instant,
    sample: Result<MetricsSample, Error>,
}

/// A TTL cache over a [`MetricsProvider`].
///
/// Reads are wait-free (an `ArcSwap` load); at most one caller refreshes an
/// expired entry while concurrent callers keep the stale value, so the
/// underlying provider is never sampled more than once per TTL.
pub struct CachedMetricsProvider {
    inner: Arc<dyn MetricsProvider>,
    ttl: Duration,
    entry: ArcSwap<CachedEntry>,
    refresh: Mutex<()>,
}

impl CachedMetricsProvider {
    /// Wraps `inner` with the default 100 ms TTL.
    #[must_use]
    pub fn new(inner: Arc<dyn MetricsProvider>) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    /// Wraps `inner` with an explicit TTL.
    #[must_use]
    pub fn with_ttl(inner: Arc<dyn MetricsProvider>, ttl: Duration) -> Self {
        let sample = inner.sample();
        Self {
            inner,
            ttl,
            entry: ArcSwap::from_pointee(CachedEntry { taken_at: Instant::now(), sample }),
            refresh: Mutex::new(()),
        }
    }

    fn clone_sample(entry: &CachedEntry) -> Result<MetricsSample, Error> {
        match &entry.sample {
            Ok(sample) => Ok(*sample),
            Err(Error::ProviderUnavailable { details }) => {
                Err(Error::ProviderUnavailable { details: details.clone() })
            }
            Err(other) => {
                Err(Error::ProviderUnavailable { details: other.to_string() })
            }
        }
    }
}

impl MetricsProvider for CachedMetricsProvider {
    fn sample(&self) -> Result<MetricsSample, Error> {
        let current = self.entry.load();
        if current.taken_at.elapsed() < self.ttl {
            return Self::clone_sample(&current);
        }
        // One refresher at a time; losers keep the stale entry so the inner
        // provider sees at most one sample per TTL.
        if let Some(_guard) = self.refresh.try_lock() {
            let refreshed = self.entry.load();
            if refreshed.taken_at.elapsed() < self.ttl {
                return Self::clone_sample(&refreshed);
            }
            let sample = self.inner.sample();
            let result = match &sample {
                Ok(s) => Ok(*s),
                Err(e) => Err(Error::ProviderUnavailable { details: e.to_string() }),
            };
            self.entry.store(Arc::new(CachedEntry { taken_at: Instant::now(), sample }));
            result
        } else {
            Self::clone_sample(&self.entry.load())
        }
    }
}
