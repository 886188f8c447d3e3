// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end engine scenarios under a paused clock.
//!
//! All timing here is virtual: the tokio test clock auto-advances through
//! the scheduling loop's sleeps, which makes release counts deterministic.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use vajrapulse_config::PercentileKeys;
use vajrapulse_engine::engine::EngineState;
use vajrapulse_engine::pattern::{LoadPattern, StaticRate, WarmupCooldown};
use vajrapulse_engine::{
    BackpressurePolicy, ConcurrencyHint, ExecutionEngine, StopReason, Task, TaskError,
    TaskOutcome,
};
use vajrapulse_telemetry::MetricsAggregator;

struct NoopTask;

#[async_trait]
impl Task for NoopTask {
    async fn execute(&self, _iteration: u64) -> TaskOutcome {
        TaskOutcome::Success
    }
}

/// Fails every `period`-th iteration, starting with iteration 0.
struct FlakyTask {
    period: u64,
}

#[async_trait]
impl Task for FlakyTask {
    async fn execute(&self, iteration: u64) -> TaskOutcome {
        if iteration % self.period == 0 {
            TaskOutcome::failure("scheduled failure")
        } else {
            TaskOutcome::Success
        }
    }
}

struct SlowTask {
    latency: Duration,
}

#[async_trait]
impl Task for SlowTask {
    async fn execute(&self, _iteration: u64) -> TaskOutcome {
        tokio::time::sleep(self.latency).await;
        TaskOutcome::Success
    }
}

fn engine_for(
    task: Arc<dyn Task>,
    pattern: Box<dyn LoadPattern>,
    aggregator: Arc<MetricsAggregator>,
) -> ExecutionEngine {
    ExecutionEngine::builder(task, pattern, aggregator)
        .run_id("scenario-test")
        .drain_timeout(Duration::from_secs(1))
        .force_timeout(Duration::from_secs(1))
        .build()
}

#[tokio::test(start_paused = true)]
async fn static_noop_hits_the_target_throughput() {
    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(1_000.0, Duration::from_secs(1)));
    let engine = engine_for(Arc::new(NoopTask), pattern, Arc::clone(&aggregator));

    let reason = engine.run().await.expect("run");
    assert_eq!(reason, StopReason::DurationElapsed);

    let snapshot = aggregator.snapshot();
    assert!(snapshot.total >= 800, "total was {}", snapshot.total);
    assert!(snapshot.total <= 1_100, "total was {}", snapshot.total);
    assert_eq!(snapshot.failure, 0);
    assert_eq!(snapshot.total, snapshot.success + snapshot.failure);

    // Every configured percentile is defined and the map is monotone.
    let values: Vec<f64> = snapshot
        .success_percentiles
        .iter()
        .map(|entry| entry.value_ns.expect("defined percentile"))
        .collect();
    assert_eq!(values.len(), PercentileKeys::default().len());
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test(start_paused = true)]
async fn mixed_outcomes_split_as_configured() {
    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(50.0, Duration::from_millis(100)));
    let engine =
        engine_for(Arc::new(FlakyTask { period: 3 }), pattern, Arc::clone(&aggregator));

    let reason = engine.run().await.expect("run");
    assert_eq!(reason, StopReason::DurationElapsed);

    let snapshot = aggregator.snapshot();
    assert!(snapshot.success > 0);
    assert!(snapshot.failure > 0);
    let ratio = snapshot.failure_ratio();
    assert!((0.30..=0.40).contains(&ratio), "failure ratio was {ratio}");
}

#[tokio::test(start_paused = true)]
async fn stop_drains_and_leaves_nothing_in_flight() {
    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(100.0, Duration::from_secs(10)));
    let engine = Arc::new(engine_for(
        Arc::new(SlowTask { latency: Duration::from_millis(50) }),
        pattern,
        Arc::clone(&aggregator),
    ));

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run().await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    engine.stop();
    engine.stop(); // idempotent

    let reason = runner.await.expect("join").expect("run");
    assert_eq!(reason, StopReason::StopRequested);
    assert_eq!(engine.state(), EngineState::Stopped);

    let snapshot = aggregator.snapshot();
    assert!(snapshot.total >= 1, "some iterations must have run");
    assert_eq!(snapshot.queue_depth, 0, "no iteration may remain in flight");
    assert_eq!(engine.stats().active(), 0);
}

#[tokio::test(start_paused = true)]
async fn warmup_and_cooldown_suppress_recording() {
    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let inner = Box::new(StaticRate::new(100.0, Duration::from_secs(1)));
    let pattern = Box::new(WarmupCooldown::new(
        inner,
        Duration::from_millis(200),
        Duration::from_millis(200),
    ));
    let engine = engine_for(Arc::new(NoopTask), pattern, Arc::clone(&aggregator));

    let reason = engine.run().await.expect("run");
    assert_eq!(reason, StopReason::DurationElapsed);

    let released = engine.stats().released();
    let recorded = aggregator.snapshot().total;
    assert!(released >= 90, "released was {released}");
    // Only the 600 ms steady window is recorded: ~60% of raw iterations.
    assert!(
        (55..=65).contains(&recorded),
        "recorded {recorded} of {released} released iterations"
    );
}

#[tokio::test(start_paused = true)]
async fn zero_rate_unbounded_pattern_exhausts_quickly() {
    struct IdlePattern;
    impl LoadPattern for IdlePattern {
        fn target_rate(&self, _: Duration) -> f64 {
            0.0
        }
        fn total_duration(&self) -> Option<Duration> {
            None
        }
        fn label(&self) -> &'static str {
            "idle"
        }
    }

    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let engine = engine_for(Arc::new(NoopTask), Box::new(IdlePattern), Arc::clone(&aggregator));

    let before = tokio::time::Instant::now();
    let reason = engine.run().await.expect("run");
    assert_eq!(reason, StopReason::ZeroRateExhausted);
    assert!(before.elapsed() <= Duration::from_millis(300));
    assert_eq!(aggregator.snapshot().total, 0);
}

#[tokio::test(start_paused = true)]
async fn run_is_rejected_while_already_running() {
    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(10.0, Duration::from_secs(5)));
    let engine = Arc::new(engine_for(Arc::new(NoopTask), pattern, aggregator));

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.state(), EngineState::Running);

    let error = engine.run().await.expect_err("second run must fail");
    assert_eq!(error.variant_name(), "AlreadyStarted");

    engine.stop();
    let reason = runner.await.expect("join").expect("run");
    assert_eq!(reason, StopReason::StopRequested);
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn reject_policy_records_submission_rejections() {
    struct OneSlotTask;

    #[async_trait]
    impl Task for OneSlotTask {
        async fn execute(&self, _iteration: u64) -> TaskOutcome {
            tokio::time::sleep(Duration::from_secs(5)).await;
            TaskOutcome::Success
        }
    }

    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(100.0, Duration::from_millis(200)));
    let engine = ExecutionEngine::builder(Arc::new(OneSlotTask), pattern, Arc::clone(&aggregator))
        .run_id("reject-test")
        .max_in_flight(1)
        .backpressure_policy(BackpressurePolicy::Reject)
        .drain_timeout(Duration::from_millis(100))
        .force_timeout(Duration::from_millis(100))
        .build();

    let _ = engine.run().await.expect("run");
    let snapshot = aggregator.snapshot();
    assert!(snapshot.rejected > 0, "rejections must be counted");
    assert!(snapshot.failure > 0, "rejections surface as failures");
    assert_eq!(snapshot.dropped, 0);
}

#[tokio::test(start_paused = true)]
async fn drop_policy_counts_but_does_not_record() {
    struct OneSlotTask;

    #[async_trait]
    impl Task for OneSlotTask {
        async fn execute(&self, _iteration: u64) -> TaskOutcome {
            tokio::time::sleep(Duration::from_secs(5)).await;
            TaskOutcome::Success
        }
    }

    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(100.0, Duration::from_millis(200)));
    let engine = ExecutionEngine::builder(Arc::new(OneSlotTask), pattern, Arc::clone(&aggregator))
        .run_id("drop-test")
        .max_in_flight(1)
        .backpressure_policy(BackpressurePolicy::Drop)
        .drain_timeout(Duration::from_millis(100))
        .force_timeout(Duration::from_millis(100))
        .build();

    let _ = engine.run().await.expect("run");
    let snapshot = aggregator.snapshot();
    assert!(snapshot.dropped > 0, "drops must be counted");
    assert_eq!(snapshot.rejected, 0);
    // Dropped iterations never produce execution records; only the one
    // dispatched (and later cancelled) iteration may appear.
    assert!(snapshot.total <= 1, "total was {}", snapshot.total);
}

#[tokio::test(start_paused = true)]
async fn saturated_provider_short_circuits_the_drop_policy() {
    use vajrapulse_telemetry::backpressure::BackpressureProvider;

    struct AlwaysSaturated;
    impl BackpressureProvider for AlwaysSaturated {
        fn level(&self) -> f64 {
            1.0
        }
        fn describe(&self) -> &'static str {
            "always_saturated"
        }
    }

    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(100.0, Duration::from_millis(200)));
    let engine = ExecutionEngine::builder(Arc::new(NoopTask), pattern, Arc::clone(&aggregator))
        .run_id("pressure-test")
        .backpressure_policy(BackpressurePolicy::Drop)
        .backpressure_provider(Arc::new(AlwaysSaturated))
        .drain_timeout(Duration::from_millis(100))
        .force_timeout(Duration::from_millis(100))
        .build();

    let _ = engine.run().await.expect("run");
    let snapshot = aggregator.snapshot();
    // Every release was dropped before dispatch: counted, never recorded.
    assert!(snapshot.dropped > 0);
    assert_eq!(snapshot.total, 0);
    assert_eq!(engine.stats().completed(), 0);
}

#[tokio::test(start_paused = true)]
async fn init_failure_is_fatal_and_surfaces() {
    struct BrokenInit;

    #[async_trait]
    impl Task for BrokenInit {
        async fn init(&self) -> Result<(), TaskError> {
            Err(TaskError::new("no database"))
        }
        async fn execute(&self, _iteration: u64) -> TaskOutcome {
            TaskOutcome::Success
        }
    }

    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(10.0, Duration::from_secs(1)));
    let engine = engine_for(Arc::new(BrokenInit), pattern, aggregator);

    let error = engine.run().await.expect_err("init failure must surface");
    assert_eq!(error.variant_name(), "TaskLifecycleFailed");
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn teardown_runs_once_and_its_failure_surfaces() {
    struct CountingTeardown {
        teardowns: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Task for CountingTeardown {
        async fn execute(&self, _iteration: u64) -> TaskOutcome {
            TaskOutcome::Success
        }
        async fn teardown(&self) -> Result<(), TaskError> {
            let _ = self.teardowns.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::new("teardown exploded"))
        }
    }

    let teardowns = Arc::new(AtomicU64::new(0));
    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(10.0, Duration::from_millis(100)));
    let engine = engine_for(
        Arc::new(CountingTeardown { teardowns: Arc::clone(&teardowns) }),
        pattern,
        aggregator,
    );

    let error = engine.run().await.expect_err("teardown failure must surface");
    assert_eq!(error.variant_name(), "TaskLifecycleFailed");
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_iterations_become_failures() {
    struct PanickyTask;

    #[async_trait]
    impl Task for PanickyTask {
        async fn execute(&self, iteration: u64) -> TaskOutcome {
            if iteration % 2 == 0 {
                panic!("iteration {iteration} exploded");
            }
            TaskOutcome::Success
        }
    }

    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(50.0, Duration::from_millis(200)));
    let engine = engine_for(Arc::new(PanickyTask), pattern, Arc::clone(&aggregator));

    let reason = engine.run().await.expect("panics must not abort the run");
    assert_eq!(reason, StopReason::DurationElapsed);
    let snapshot = aggregator.snapshot();
    assert!(snapshot.failure > 0);
    assert!(snapshot.success > 0);
    assert_eq!(snapshot.total, snapshot.success + snapshot.failure);
}

#[tokio::test(start_paused = true)]
async fn cpu_bound_tasks_are_capped_at_the_processor_count() {
    struct CpuTask {
        peak: Arc<AtomicU64>,
        active: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Task for CpuTask {
        fn concurrency_hint(&self) -> ConcurrencyHint {
            ConcurrencyHint::CpuBound
        }
        async fn execute(&self, _iteration: u64) -> TaskOutcome {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = self.active.fetch_sub(1, Ordering::SeqCst);
            TaskOutcome::Success
        }
    }

    let peak = Arc::new(AtomicU64::new(0));
    let active = Arc::new(AtomicU64::new(0));
    let aggregator = Arc::new(MetricsAggregator::new(PercentileKeys::default()));
    let pattern = Box::new(StaticRate::new(2_000.0, Duration::from_millis(500)));
    let engine = engine_for(
        Arc::new(CpuTask { peak: Arc::clone(&peak), active: Arc::clone(&active) }),
        pattern,
        aggregator,
    );

    let _ = engine.run().await.expect("run");
    let cores = num_cpus::get() as u64;
    assert!(
        peak.load(Ordering::SeqCst) <= cores,
        "peak concurrency {} exceeded the {} available cores",
        peak.load(Ordering::SeqCst),
        cores
    );
}
