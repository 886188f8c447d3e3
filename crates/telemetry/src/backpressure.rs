// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Backpressure signals for the dispatcher.
//!
//! A provider condenses some saturation signal into a level in [0, 1]:
//! 0 is idle, 1 is saturated. Providers compose by taking the maximum, so
//! the most pessimistic signal wins.

use crate::aggregator::MetricsAggregator;
use std::sync::Arc;
use std::time::Duration;

/// A source of a saturation level.
pub trait BackpressureProvider: Send + Sync {
    /// Current saturation level, clamped to [0, 1].
    fn level(&self) -> f64;

    /// A short static description of the signal, for logs.
    fn describe(&self) -> &'static str;
}

/// Backpressure from dispatch-queue depth relative to a capacity.
pub struct QueueDepthBackpressure {
    aggregator: Arc<MetricsAggregator>,
    capacity: u64,
}

impl QueueDepthBackpressure {
    /// Creates a provider that saturates when `capacity` iterations queue.
    #[must_use]
    pub fn new(aggregator: Arc<MetricsAggregator>, capacity: u64) -> Self {
        Self { aggregator, capacity: capacity.max(1) }
    }
}

impl BackpressureProvider for QueueDepthBackpressure {
    fn level(&self) -> f64 {
        (self.aggregator.queue_depth() as f64 / self.capacity as f64).clamp(0.0, 1.0)
    }

    fn describe(&self) -> &'static str {
        "queue_depth"
    }
}

/// Backpressure from success-side P99 latency relative to an SLO bound.
///
/// Merges histogram stripes per query; callers are expected to sit behind a
/// sampling interval, not the per-iteration path.
pub struct LatencyBackpressure {
    aggregator: Arc<MetricsAggregator>,
    slo: Duration,
}

impl LatencyBackpressure {
    /// Creates a provider that saturates when P99 reaches `slo`.
    #[must_use]
    pub fn new(aggregator: Arc<MetricsAggregator>, slo: Duration) -> Self {
        Self { aggregator, slo: slo.max(Duration::from_nanos(1)) }
    }
}

impl BackpressureProvider for LatencyBackpressure {
    fn level(&self) -> f64 {
        match self.aggregator.success_p99_ns() {
            Some(p99_ns) => {
                let slo_ns = self.slo.as_nanos().min(u128::from(u64::MAX)) as u64;
                (p99_ns as f64 / slo_ns as f64).clamp(0.0, 1.0)
            }
            None => 0.0,
        }
    }

    fn describe(&self) -> &'static str {
        "latency_p99"
    }
}

/// The maximum of several providers.
#[derive(Default)]
pub struct CompositeBackpressure {
    providers: Vec<Box<dyn BackpressureProvider>>,
}

impl CompositeBackpressure {
    /// Creates an empty composite; its level is 0 until providers join.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider.
    #[must_use]
    pub fn with(mut self, provider: Box<dyn BackpressureProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl BackpressureProvider for CompositeBackpressure {
    fn level(&self) -> f64 {
        self.providers.iter().map(|p| p.level()).fold(0.0, f64::max)
    }

    fn describe(&self) -> &'static str {
        "composite_max"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vajrapulse_config::PercentileKeys;

    struct FixedLevel(f64);

    impl BackpressureProvider for FixedLevel {
        fn level(&self) -> f64 {
            self.0
        }

        fn describe(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn composite_takes_the_maximum() {
        let composite = CompositeBackpressure::new()
            .with(Box::new(FixedLevel(0.2)))
            .with(Box::new(FixedLevel(0.7)))
            .with(Box::new(FixedLevel(0.4)));
        assert!((composite.level() - 0.7).abs() < 1e-9);
        assert_eq!(CompositeBackpressure::new().level(), 0.0);
    }

    #[tokio::test]
    async fn queue_depth_level_scales_with_depth() {
        let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
        let provider = QueueDepthBackpressure::new(Arc::clone(&aggregator), 4);
        assert_eq!(provider.level(), 0.0);
        for _ in 0..2 {
            aggregator.queue_entered();
        }
        assert!((provider.level() - 0.5).abs() < 1e-9);
        for _ in 0..10 {
            aggregator.queue_entered();
        }
        assert_eq!(provider.level(), 1.0);
    }

    #[tokio::test]
    async fn latency_level_is_idle_without_samples() {
        let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
        let provider = LatencyBackpressure::new(aggregator, Duration::from_millis(100));
        assert_eq!(provider.level(), 0.0);
    }
}
