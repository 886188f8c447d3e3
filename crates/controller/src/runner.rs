// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! One-run orchestration.

use crate::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vajrapulse_config::{BackpressureMode, RunSettings};
use vajrapulse_engine::pattern::LoadPattern;
use vajrapulse_engine::{BackpressurePolicy, ExecutionEngine, StopReason, Task};
use vajrapulse_telemetry::backpressure::{
    BackpressureProvider, CompositeBackpressure, LatencyBackpressure, QueueDepthBackpressure,
};
use vajrapulse_telemetry::exporter::SnapshotExporter;
use vajrapulse_telemetry::provider::{CachedMetricsProvider, MetricsProvider};
use vajrapulse_telemetry::reporter::{PeriodicReporter, ProcessMemoryGauges};
use vajrapulse_telemetry::snapshot::{GaugeSource, HostInfo, RunContext, Snapshot};
use vajrapulse_telemetry::MetricsAggregator;

/// Title attached to the final export of a run.
pub const FINAL_TITLE: &str = "final";

/// The outcome of one completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Why the engine returned.
    pub reason: StopReason,
    /// The run context shared with every exporter.
    pub context: RunContext,
    /// The final snapshot, gauges attached.
    pub snapshot: Snapshot,
}

/// Composes an aggregator, exporters, periodic reporting, and the engine
/// for a single run.
pub struct TestRunner {
    settings: RunSettings,
    aggregator: Arc<MetricsAggregator>,
    exporters: Vec<Box<dyn SnapshotExporter>>,
    gauge_sources: Vec<Arc<dyn GaugeSource>>,
}

impl TestRunner {
    /// Creates a runner; the aggregator starts its wall clock here.
    #[must_use]
    pub fn new(settings: RunSettings) -> Self {
        let aggregator = Arc::new(MetricsAggregator::with_slo_buckets(
            settings.percentiles.clone(),
            settings.slo_buckets.clone(),
        ));
        Self {
            settings,
            aggregator,
            exporters: Vec::new(),
            gauge_sources: vec![Arc::new(ProcessMemoryGauges::new())],
        }
    }

    /// Registers an exporter. Export order follows registration order; close
    /// order is the reverse.
    pub fn add_exporter(&mut self, exporter: Box<dyn SnapshotExporter>) {
        self.exporters.push(exporter);
    }

    /// Registers an extra gauge source (e.g. adaptive-controller telemetry).
    pub fn add_gauge_source(&mut self, source: Arc<dyn GaugeSource>) {
        self.gauge_sources.push(source);
    }

    /// The shared aggregator.
    #[must_use]
    pub fn aggregator(&self) -> Arc<MetricsAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// A TTL-cached read-only metrics view over the aggregator, suitable
    /// for wiring into an adaptive pattern before [`TestRunner::run`].
    #[must_use]
    pub fn metrics_provider(&self) -> Arc<CachedMetricsProvider> {
        Arc::new(CachedMetricsProvider::new(
            Arc::clone(&self.aggregator) as Arc<dyn MetricsProvider>
        ))
    }

    /// Drives one run to completion.
    ///
    /// `task_label` names the task in the run context; `shutdown` is an
    /// external stop signal (Ctrl-C) that translates into a graceful
    /// `engine.stop()`.
    pub async fn run(
        mut self,
        task: Arc<dyn Task>,
        pattern: Box<dyn LoadPattern>,
        task_label: &str,
        shutdown: CancellationToken,
    ) -> Result<RunReport, Error> {
        let run_id = self
            .settings
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()[..8].to_owned());
        let context = Arc::new(RunContext {
            run_id: run_id.clone(),
            started_at: chrono::Utc::now(),
            pattern: pattern.label().to_owned(),
            task: task_label.to_owned(),
            host: HostInfo::capture(),
        });
        tracing::info!(
            run_id = %context.run_id,
            pattern = %context.pattern,
            task = %context.task,
            "run starting"
        );

        let policy = match self.settings.backpressure {
            BackpressureMode::Queue => BackpressurePolicy::Queue,
            BackpressureMode::Reject => BackpressurePolicy::Reject,
            BackpressureMode::Drop => BackpressurePolicy::Drop,
        };
        let mut pressure = CompositeBackpressure::new().with(Box::new(
            QueueDepthBackpressure::new(
                Arc::clone(&self.aggregator),
                self.settings.max_in_flight as u64,
            ),
        ));
        if let Some(slo) = self.settings.slo_buckets.last().copied() {
            pressure = pressure
                .with(Box::new(LatencyBackpressure::new(Arc::clone(&self.aggregator), slo)));
        }

        let engine = Arc::new(
            ExecutionEngine::builder(task, pattern, Arc::clone(&self.aggregator))
                .run_id(run_id)
                .backpressure_policy(policy)
                .backpressure_provider(Arc::new(pressure) as Arc<dyn BackpressureProvider>)
                .drain_timeout(self.settings.drain_timeout)
                .force_timeout(self.settings.force_timeout)
                .max_in_flight(self.settings.max_in_flight)
                .build(),
        );
        self.gauge_sources.push(engine.stats() as Arc<dyn GaugeSource>);

        let exporters: Arc<Vec<Box<dyn SnapshotExporter>>> =
            Arc::new(std::mem::take(&mut self.exporters));
        let reporter = PeriodicReporter::spawn(
            Arc::clone(&self.aggregator),
            Arc::clone(&exporters),
            self.gauge_sources.clone(),
            Arc::clone(&context),
            self.settings.report_interval,
            self.settings.report_immediately,
        );

        // External shutdown translates into one graceful stop.
        let stop_watcher = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                shutdown.cancelled().await;
                engine.stop();
            })
        };

        let run_result = engine.run().await;

        // Close in reverse creation order: reporter, exporters (after the
        // final export), engine, aggregator.
        stop_watcher.abort();
        reporter.shutdown().await;

        let mut gauges = Vec::new();
        for source in &self.gauge_sources {
            source.collect(&mut gauges);
        }
        let snapshot = self.aggregator.snapshot().with_gauges(gauges);
        for exporter in exporters.iter() {
            if let Err(e) = exporter.export(FINAL_TITLE, &snapshot, &context) {
                tracing::warn!(
                    run_id = %context.run_id,
                    exporter = exporter.name(),
                    error = %e,
                    "final export failed"
                );
            }
        }
        for exporter in exporters.iter().rev() {
            if let Err(e) = exporter.close() {
                tracing::warn!(
                    run_id = %context.run_id,
                    exporter = exporter.name(),
                    error = %e,
                    "exporter close failed"
                );
            }
        }
        engine.close();
        self.aggregator.close();

        let reason = run_result?;
        tracing::info!(
            run_id = %context.run_id,
            reason = reason.label(),
            total = snapshot.total,
            success = snapshot.success,
            failure = snapshot.failure,
            "run finished"
        );
        let context = Arc::try_unwrap(context).unwrap_or_else(|shared| (*shared).clone());
        Ok(RunReport { reason, context, snapshot })
    }
}
