// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Periodic snapshot reporting.
//!
//! The reporter samples the aggregator on a timer, attaches gauge samples
//! from registered sources, and forwards the snapshot to every exporter.
//! Exporter failures are logged and the loop continues; the run never
//! depends on reporting progress.

use crate::aggregator::MetricsAggregator;
use crate::exporter::SnapshotExporter;
use crate::names;
use crate::snapshot::{GaugeSource, Metric, RunContext};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Title attached to periodic exports.
pub const PERIODIC_TITLE: &str = "periodic";

/// A handle to the background reporting task.
pub struct PeriodicReporter {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicReporter {
    /// Spawns the reporting loop on the current runtime.
    ///
    /// When `fire_immediately` is set the first report is exported at once;
    /// otherwise the first report lands one full interval in.
    pub fn spawn(
        aggregator: Arc<MetricsAggregator>,
        exporters: Arc<Vec<Box<dyn SnapshotExporter>>>,
        sources: Vec<Arc<dyn GaugeSource>>,
        ctx: Arc<RunContext>,
        interval: Duration,
        fire_immediately: bool,
    ) -> Self {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            if !fire_immediately {
                // The first tick of a tokio interval completes immediately;
                // consume it so the first report lands one interval in.
                let _ = ticker.tick().await;
            }
            loop {
                tokio::select! {
                    () = loop_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        export_once(&aggregator, &exporters, &sources, &ctx);
                    }
                }
            }
        });
        Self { cancel, handle }
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "periodic reporter task did not shut down cleanly");
        }
    }
}

fn export_once(
    aggregator: &MetricsAggregator,
    exporters: &[Box<dyn SnapshotExporter>],
    sources: &[Arc<dyn GaugeSource>],
    ctx: &RunContext,
) {
    let mut gauges = Vec::new();
    for source in sources {
        source.collect(&mut gauges);
    }
    let snapshot = aggregator.snapshot().with_gauges(gauges);
    for exporter in exporters {
        if let Err(e) = exporter.export(PERIODIC_TITLE, &snapshot, ctx) {
            tracing::warn!(
                run_id = %ctx.run_id,
                exporter = exporter.name(),
                error = %e,
                "exporter failed; run continues"
            );
        }
    }
}

/// Gauge source reporting the process's own memory, the platform analogue
/// of heap gauges.
pub struct ProcessMemoryGauges {
    system: Mutex<sysinfo::System>,
    pid: Option<sysinfo::Pid>,
}

impl ProcessMemoryGauges {
    /// Creates the source for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self { system: Mutex::new(sysinfo::System::new()), pid: sysinfo::get_current_pid().ok() }
    }
}

impl Default for ProcessMemoryGauges {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeSource for ProcessMemoryGauges {
    fn collect(&self, out: &mut Vec<Metric>) {
        let Some(pid) = self.pid else { return };
        let mut system = self.system.lock();
        let _ = system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
        if let Some(process) = system.process(pid) {
            out.push(Metric::gauge(names::PROCESS_MEMORY_RESIDENT, process.memory() as f64));
            out.push(Metric::gauge(names::PROCESS_MEMORY_VIRTUAL, process.virtual_memory() as f64));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::snapshot::{HostInfo, Snapshot};
    use std::sync::atomic::{AtomicU64, Ordering};
    use vajrapulse_config::PercentileKeys;

    struct CountingExporter {
        exports: AtomicU64,
        fail: bool,
    }

    impl SnapshotExporter for CountingExporter {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn export(&self, _: &str, _: &Snapshot, _: &RunContext) -> Result<(), Error> {
            let _ = self.exports.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::ExporterError {
                    exporter: "counting",
                    details: "intentional".to_owned(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct UptimeSource;

    impl GaugeSource for UptimeSource {
        fn collect(&self, out: &mut Vec<Metric>) {
            out.push(Metric::gauge(names::ENGINE_UPTIME, 1.0));
        }
    }

    fn context() -> Arc<RunContext> {
        Arc::new(RunContext {
            run_id: "reporter-test".to_owned(),
            started_at: chrono::Utc::now(),
            pattern: "static".to_owned(),
            task: "noop".to_owned(),
            host: HostInfo::default(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn reports_on_interval_and_survives_exporter_failures() {
        let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
        let good = Arc::new(CountingExporter { exports: AtomicU64::new(0), fail: false });
        let bad = Arc::new(CountingExporter { exports: AtomicU64::new(0), fail: true });

        struct Shared(Arc<CountingExporter>);
        impl SnapshotExporter for Shared {
            fn name(&self) -> &'static str {
                self.0.name()
            }
            fn export(
                &self,
                title: &str,
                snapshot: &Snapshot,
                ctx: &RunContext,
            ) -> Result<(), Error> {
                self.0.export(title, snapshot, ctx)
            }
        }

        let exporters: Arc<Vec<Box<dyn SnapshotExporter>>> = Arc::new(vec![
            Box::new(Shared(Arc::clone(&bad))),
            Box::new(Shared(Arc::clone(&good))),
        ]);
        let reporter = PeriodicReporter::spawn(
            aggregator,
            exporters,
            vec![Arc::new(UptimeSource)],
            context(),
            Duration::from_secs(1),
            false,
        );

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        reporter.shutdown().await;

        // Three full intervals elapsed; the failing exporter never stopped
        // the healthy one.
        assert_eq!(good.exports.load(Ordering::SeqCst), 3);
        assert_eq!(bad.exports.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_immediately_exports_at_startup() {
        let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
        let counting = Arc::new(CountingExporter { exports: AtomicU64::new(0), fail: false });

        struct Shared(Arc<CountingExporter>);
        impl SnapshotExporter for Shared {
            fn name(&self) -> &'static str {
                self.0.name()
            }
            fn export(
                &self,
                title: &str,
                snapshot: &Snapshot,
                ctx: &RunContext,
            ) -> Result<(), Error> {
                self.0.export(title, snapshot, ctx)
            }
        }

        let exporters: Arc<Vec<Box<dyn SnapshotExporter>>> =
            Arc::new(vec![Box::new(Shared(Arc::clone(&counting)))]);
        let reporter = PeriodicReporter::spawn(
            aggregator,
            exporters,
            Vec::new(),
            context(),
            Duration::from_secs(60),
            true,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        reporter.shutdown().await;
        assert_eq!(counting.exports.load(Ordering::SeqCst), 1);
    }
}
