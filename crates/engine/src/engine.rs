// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The execution engine: one scheduling loop, many workers.
//!
//! The scheduling loop owns the pattern and the pacer; it is the only
//! writer of iteration indices, so indices are unique and monotonically
//! increasing by construction. Workers run on the tokio substrate behind a
//! semaphore sized by the task's concurrency hint, record their own
//! outcome, and may finish out of index order — the aggregator tolerates
//! that.
//!
//! Shutdown: `stop()` cancels the scheduling token. The loop exits, a
//! drain window lets in-flight iterations complete, a force window cancels
//! the rest (each records `Failure(Cancelled)`), and iterations that still
//! refuse to yield are abandoned with a log line — a leak is preferred
//! over a hang.

use crate::error::Error;
use crate::pacer::{MAX_POLL_INTERVAL, Pacer, ZERO_RATE_POLL_INTERVAL};
use crate::pattern::LoadPattern;
use crate::task::{ConcurrencyHint, Task, TaskOutcome};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vajrapulse_telemetry::backpressure::BackpressureProvider;
use vajrapulse_telemetry::record::{ExecutionRecord, FailureKind, IterationOutcome};
use vajrapulse_telemetry::snapshot::{GaugeSource, Metric};
use vajrapulse_telemetry::{MetricsAggregator, names};

/// Zero-rate polls after which an unbounded pattern is considered
/// exhausted (together with [`ZERO_RATE_EXHAUSTION_WINDOW`]).
pub const ZERO_RATE_EXHAUSTION_POLLS: u32 = 10;
/// Minimum wall time at zero rate before an unbounded pattern is
/// considered exhausted.
pub const ZERO_RATE_EXHAUSTION_WINDOW: Duration = Duration::from_millis(100);

/// How often the scheduling loop re-samples the backpressure provider.
pub const PRESSURE_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// What the dispatcher does when no substrate slot is immediately free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Wait for a slot; the scheduling loop stalls and the pacer catches up
    /// afterwards.
    #[default]
    Queue,
    /// Count the iteration as rejected and record a
    /// `Failure(SubmissionRejected)`.
    Reject,
    /// Count the iteration as dropped; no execution record is created.
    Drop,
}

/// Why `run()` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The pattern's declared duration elapsed.
    DurationElapsed,
    /// The adaptive controller reported completion.
    AdaptiveComplete,
    /// `stop()` was called.
    StopRequested,
    /// An unbounded pattern sat at rate zero past the exhaustion window.
    ZeroRateExhausted,
}

impl StopReason {
    /// Stable lowercase label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::DurationElapsed => "duration_elapsed",
            StopReason::AdaptiveComplete => "adaptive_complete",
            StopReason::StopRequested => "stop_requested",
            StopReason::ZeroRateExhausted => "zero_rate_exhausted",
        }
    }
}

/// The externally observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not running; `run()` is accepted.
    Stopped,
    /// `run()` entered; the task is initializing.
    Starting,
    /// The scheduling loop is releasing iterations.
    Running,
    /// Shutdown in progress: draining, then forcing.
    Stopping,
}

impl EngineState {
    /// Stable ordinal used as the state gauge value.
    #[must_use]
    pub fn ordinal(&self) -> u8 {
        match self {
            EngineState::Stopped => 0,
            EngineState::Starting => 1,
            EngineState::Running => 2,
            EngineState::Stopping => 3,
        }
    }

    /// Stable lowercase label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
        }
    }

    fn from_ordinal(value: u8) -> EngineState {
        match value {
            1 => EngineState::Starting,
            2 => EngineState::Running,
            3 => EngineState::Stopping,
            _ => EngineState::Stopped,
        }
    }
}

/// Live engine gauges, shared with the periodic reporter.
pub struct EngineStats {
    state: AtomicU8,
    uptime_ms: AtomicU64,
    released: AtomicU64,
    completed: AtomicU64,
    active: AtomicU64,
    queued: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
    completes: AtomicU64,
    target_tps_bits: AtomicU64,
    actual_tps_bits: AtomicU64,
    pool_size: u64,
    substrate: &'static str,
}

impl EngineStats {
    fn new(pool_size: usize, substrate: &'static str) -> Self {
        Self {
            state: AtomicU8::new(EngineState::Stopped.ordinal()),
            uptime_ms: AtomicU64::new(0),
            released: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            active: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            completes: AtomicU64::new(0),
            target_tps_bits: AtomicU64::new(0),
            actual_tps_bits: AtomicU64::new(0),
            pool_size: pool_size as u64,
            substrate,
        }
    }

    /// The current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        EngineState::from_ordinal(self.state.load(Ordering::Acquire))
    }

    /// Iterations handed to the pacer so far (dispatched, rejected, or
    /// dropped).
    #[must_use]
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Iterations whose workers have finished.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Iterations currently executing.
    #[must_use]
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state.ordinal(), Ordering::Release);
    }

    fn set_rates(&self, target: f64, actual: f64) {
        self.target_tps_bits.store(target.to_bits(), Ordering::Relaxed);
        self.actual_tps_bits.store(actual.to_bits(), Ordering::Relaxed);
    }

    fn set_uptime(&self, uptime: Duration) {
        self.uptime_ms
            .store(uptime.as_millis().min(u128::from(u64::MAX)) as u64, Ordering::Relaxed);
    }
}

impl GaugeSource for EngineStats {
    fn collect(&self, out: &mut Vec<Metric>) {
        let uptime_ms = self.uptime_ms.load(Ordering::Relaxed);
        let target = f64::from_bits(self.target_tps_bits.load(Ordering::Relaxed));
        let actual = f64::from_bits(self.actual_tps_bits.load(Ordering::Relaxed));
        let elapsed_secs = (uptime_ms as f64 / 1_000.0).max(f64::MIN_POSITIVE);

        out.push(Metric::gauge(names::ENGINE_STATE, f64::from(self.state.load(Ordering::Acquire))));
        out.push(Metric::gauge(names::ENGINE_UPTIME, uptime_ms as f64 / 1_000.0));
        out.push(Metric::gauge(names::ENGINE_UPTIME_MS, uptime_ms as f64));
        out.push(Metric::tagged(
            names::ENGINE_LIFECYCLE_EVENTS,
            names::TAG_EVENT,
            "start",
            self.starts.load(Ordering::Relaxed) as f64,
        ));
        out.push(Metric::tagged(
            names::ENGINE_LIFECYCLE_EVENTS,
            names::TAG_EVENT,
            "stop",
            self.stops.load(Ordering::Relaxed) as f64,
        ));
        out.push(Metric::tagged(
            names::ENGINE_LIFECYCLE_EVENTS,
            names::TAG_EVENT,
            "complete",
            self.completes.load(Ordering::Relaxed) as f64,
        ));

        out.push(Metric::tagged(
            names::EXECUTOR_ACTIVE_THREADS,
            names::TAG_THREAD_TYPE,
            self.substrate,
            self.active.load(Ordering::Relaxed) as f64,
        ));
        out.push(Metric::tagged(
            names::EXECUTOR_POOL_SIZE,
            names::TAG_THREAD_TYPE,
            self.substrate,
            self.pool_size as f64,
        ));
        out.push(Metric::tagged(
            names::EXECUTOR_POOL_CORE_SIZE,
            names::TAG_THREAD_TYPE,
            self.substrate,
            self.pool_size as f64,
        ));
        out.push(Metric::tagged(
            names::EXECUTOR_POOL_MAX_SIZE,
            names::TAG_THREAD_TYPE,
            self.substrate,
            self.pool_size as f64,
        ));
        out.push(Metric::tagged(
            names::EXECUTOR_QUEUE_SIZE,
            names::TAG_THREAD_TYPE,
            self.substrate,
            self.queued.load(Ordering::Relaxed) as f64,
        ));

        out.push(Metric::gauge(names::RATE_TARGET_TPS, target));
        out.push(Metric::gauge(names::RATE_ACTUAL_TPS, actual));
        out.push(Metric::gauge(names::RATE_TPS_ERROR, target - actual));

        // Issued-side rate. An outcome split only exists once work has
        // completed, so the response.tps family owns type=success|failure
        // and the request side reports the total alone.
        out.push(Metric::tagged(
            names::REQUEST_TPS,
            names::TAG_TYPE,
            "total",
            self.released.load(Ordering::Relaxed) as f64 / elapsed_secs,
        ));
    }
}

/// Builds an [`ExecutionEngine`].
pub struct EngineBuilder {
    task: Arc<dyn Task>,
    pattern: Box<dyn LoadPattern>,
    aggregator: Arc<MetricsAggregator>,
    run_id: String,
    policy: BackpressurePolicy,
    pressure: Option<Arc<dyn BackpressureProvider>>,
    drain_timeout: Duration,
    force_timeout: Duration,
    max_in_flight: usize,
}

impl EngineBuilder {
    /// Tags engine logs with a run identifier.
    #[must_use]
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Chooses the backpressure policy; the default queues.
    #[must_use]
    pub fn backpressure_policy(mut self, policy: BackpressurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches a saturation signal. When the provider reports level 1 the
    /// reject/drop policies apply without attempting a dispatch; the queue
    /// policy only logs. Sampled at most every
    /// [`PRESSURE_SAMPLE_INTERVAL`].
    #[must_use]
    pub fn backpressure_provider(mut self, provider: Arc<dyn BackpressureProvider>) -> Self {
        self.pressure = Some(provider);
        self
    }

    /// Bounds the graceful-drain window on shutdown.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Bounds the forced-cancellation window after the drain expires.
    #[must_use]
    pub fn force_timeout(mut self, timeout: Duration) -> Self {
        self.force_timeout = timeout;
        self
    }

    /// Caps concurrently in-flight iterations for io-bound tasks.
    /// Cpu-bound tasks are always capped at the processor count.
    #[must_use]
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Finalizes the engine.
    #[must_use]
    pub fn build(self) -> ExecutionEngine {
        let hint = self.task.concurrency_hint();
        let permits = match hint {
            ConcurrencyHint::IoBound => self.max_in_flight,
            ConcurrencyHint::CpuBound => num_cpus::get().max(1),
        };
        let stats = Arc::new(EngineStats::new(permits, hint.label()));
        ExecutionEngine {
            task: self.task,
            pattern: self.pattern,
            aggregator: self.aggregator,
            run_id: self.run_id,
            policy: self.policy,
            pressure: self.pressure,
            drain_timeout: self.drain_timeout,
            force_timeout: self.force_timeout,
            semaphore: Arc::new(Semaphore::new(permits)),
            stop_token: CancellationToken::new(),
            kill_token: CancellationToken::new(),
            stats,
            closed: AtomicBool::new(false),
        }
    }
}

enum Dispatch {
    Proceed,
    Stopped,
}

/// Drives one run: pattern sampling, pacing, dispatch, and shutdown.
pub struct ExecutionEngine {
    task: Arc<dyn Task>,
    pattern: Box<dyn LoadPattern>,
    aggregator: Arc<MetricsAggregator>,
    run_id: String,
    policy: BackpressurePolicy,
    pressure: Option<Arc<dyn BackpressureProvider>>,
    drain_timeout: Duration,
    force_timeout: Duration,
    semaphore: Arc<Semaphore>,
    stop_token: CancellationToken,
    kill_token: CancellationToken,
    stats: Arc<EngineStats>,
    closed: AtomicBool,
}

impl ExecutionEngine {
    /// Starts a builder over the three borrowed collaborators.
    #[must_use]
    pub fn builder(
        task: Arc<dyn Task>,
        pattern: Box<dyn LoadPattern>,
        aggregator: Arc<MetricsAggregator>,
    ) -> EngineBuilder {
        EngineBuilder {
            task,
            pattern,
            aggregator,
            run_id: String::new(),
            policy: BackpressurePolicy::default(),
            pressure: None,
            drain_timeout: Duration::from_secs(10),
            force_timeout: Duration::from_secs(5),
            max_in_flight: 1024,
        }
    }

    /// The live gauges, for wiring into the periodic reporter.
    #[must_use]
    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// The current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.stats.state()
    }

    /// Requests graceful shutdown. Idempotent; a no-op unless the engine is
    /// starting or running.
    pub fn stop(&self) {
        match self.stats.state() {
            EngineState::Starting | EngineState::Running => {
                if !self.stop_token.is_cancelled() {
                    tracing::info!(run_id = %self.run_id, "stop requested");
                    let _ = self.stats.stops.fetch_add(1, Ordering::Relaxed);
                    self.stop_token.cancel();
                }
            }
            EngineState::Stopped | EngineState::Stopping => {}
        }
    }

    /// Releases the concurrency substrate. Safe to call multiple times;
    /// a run in progress will wind down as dispatches start failing.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.semaphore.close();
        }
    }

    /// Drives the run to completion.
    ///
    /// Returns when the pattern's duration elapses, the adaptive controller
    /// completes, `stop()` is called, or a task lifecycle call fails.
    pub async fn run(&self) -> Result<StopReason, Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::EngineClosed);
        }
        let observed = self.stats.state.compare_exchange(
            EngineState::Stopped.ordinal(),
            EngineState::Starting.ordinal(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if let Err(current) = observed {
            return Err(Error::AlreadyStarted {
                state: EngineState::from_ordinal(current).label(),
            });
        }
        let _ = self.stats.starts.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            run_id = %self.run_id,
            pattern = self.pattern.label(),
            substrate = self.stats.substrate,
            pool_size = self.stats.pool_size,
            "engine starting"
        );

        if let Err(e) = self.task.init().await {
            self.stats.set_state(EngineState::Stopped);
            return Err(Error::TaskLifecycleFailed { phase: "init", details: e.details });
        }
        self.stats.set_state(EngineState::Running);

        let start = Instant::now();
        let mut pacer = Pacer::new();
        let mut join_set: JoinSet<()> = JoinSet::new();
        let mut iteration: u64 = 0;
        let mut zero_polls: u32 = 0;
        let mut zero_since: Option<Instant> = None;
        let mut pressure_checked_at: Option<Instant> = None;
        let mut pressure_level: f64 = 0.0;

        let reason = 'sched: loop {
            if self.stop_token.is_cancelled() {
                break StopReason::StopRequested;
            }
            let elapsed = start.elapsed();
            self.stats.set_uptime(elapsed);
            if self.pattern.completed() {
                break StopReason::AdaptiveComplete;
            }
            if let Some(total) = self.pattern.total_duration() {
                if elapsed >= total {
                    break StopReason::DurationElapsed;
                }
            }

            let rate = self.pattern.target_rate(elapsed);
            self.stats.set_rates(rate, pacer.actual_rate(elapsed));

            if rate <= 0.0 {
                zero_polls += 1;
                let since = *zero_since.get_or_insert_with(Instant::now);
                if self.pattern.total_duration().is_none()
                    && zero_polls > ZERO_RATE_EXHAUSTION_POLLS
                    && since.elapsed() >= ZERO_RATE_EXHAUSTION_WINDOW
                {
                    break StopReason::ZeroRateExhausted;
                }
                if !self.sleep_or_stop(ZERO_RATE_POLL_INTERVAL).await {
                    break StopReason::StopRequested;
                }
                continue;
            }
            zero_polls = 0;
            zero_since = None;

            if let Some(provider) = &self.pressure {
                let stale = pressure_checked_at
                    .is_none_or(|at| at.elapsed() >= PRESSURE_SAMPLE_INTERVAL);
                if stale {
                    pressure_checked_at = Some(Instant::now());
                    let level = provider.level().clamp(0.0, 1.0);
                    if level >= 1.0 && pressure_level < 1.0 {
                        tracing::warn!(
                            run_id = %self.run_id,
                            source = provider.describe(),
                            "backpressure saturated"
                        );
                    }
                    pressure_level = level;
                }
            }
            let saturated = pressure_level >= 1.0;

            let to_release = pacer.poll(elapsed, rate);
            for _ in 0..to_release {
                if self.stop_token.is_cancelled() {
                    break 'sched StopReason::StopRequested;
                }
                let record = self.pattern.records_at(start.elapsed());
                match self.dispatch(iteration, record, saturated, &mut join_set).await {
                    Dispatch::Proceed => iteration += 1,
                    Dispatch::Stopped => break 'sched StopReason::StopRequested,
                }
            }
            reap_finished(&mut join_set);

            let delay = pacer.next_delay(rate).min(MAX_POLL_INTERVAL);
            if !self.sleep_or_stop(delay).await {
                break StopReason::StopRequested;
            }
        };

        self.stats.set_state(EngineState::Stopping);
        self.stats.set_uptime(start.elapsed());
        tracing::info!(
            run_id = %self.run_id,
            reason = reason.label(),
            released = iteration,
            "engine stopping"
        );

        self.shutdown_substrate(join_set).await;

        let teardown = self.task.teardown().await;
        match reason {
            StopReason::StopRequested => {}
            _ => {
                let _ = self.stats.completes.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.set_state(EngineState::Stopped);
        if let Err(e) = teardown {
            return Err(Error::TaskLifecycleFailed { phase: "teardown", details: e.details });
        }
        tracing::info!(run_id = %self.run_id, reason = reason.label(), "engine stopped");
        Ok(reason)
    }

    /// Drains in-flight iterations within the drain window, cancels the
    /// rest within the force window, and abandons anything still stuck.
    async fn shutdown_substrate(&self, mut join_set: JoinSet<()>) {
        if join_set.is_empty() {
            return;
        }
        let drained =
            tokio::time::timeout(self.drain_timeout, drain_all(&mut join_set)).await.is_ok();
        if drained {
            return;
        }
        tracing::warn!(
            run_id = %self.run_id,
            in_flight = join_set.len(),
            "drain timeout expired; cancelling in-flight iterations"
        );
        self.kill_token.cancel();
        let forced =
            tokio::time::timeout(self.force_timeout, drain_all(&mut join_set)).await.is_ok();
        if !forced {
            // Leak preferred over hang: user code is ignoring cancellation.
            tracing::warn!(
                run_id = %self.run_id,
                in_flight = join_set.len(),
                "force timeout expired; abandoning in-flight iterations"
            );
            join_set.abort_all();
            join_set.detach_all();
        }
    }

    async fn dispatch(
        &self,
        iteration: u64,
        record: bool,
        saturated: bool,
        join_set: &mut JoinSet<()>,
    ) -> Dispatch {
        self.aggregator.queue_entered();
        let _ = self.stats.queued.fetch_add(1, Ordering::Relaxed);
        let _ = self.stats.released.fetch_add(1, Ordering::Relaxed);
        let enqueued_at = Instant::now();

        let leave_queue = || {
            self.aggregator.queue_exited();
            let _ = self
                .stats
                .queued
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |q| q.checked_sub(1));
        };

        let permit = match self.policy {
            BackpressurePolicy::Queue => {
                tokio::select! {
                    biased;
                    () = self.stop_token.cancelled() => {
                        // Never dispatched: no record.
                        leave_queue();
                        return Dispatch::Stopped;
                    }
                    acquired = Arc::clone(&self.semaphore).acquire_owned() => {
                        match acquired {
                            Ok(permit) => permit,
                            Err(_) => {
                                leave_queue();
                                return Dispatch::Stopped;
                            }
                        }
                    }
                }
            }
            BackpressurePolicy::Reject => {
                let acquired = if saturated {
                    None
                } else {
                    Arc::clone(&self.semaphore).try_acquire_owned().ok()
                };
                match acquired {
                    Some(permit) => permit,
                    None => {
                        leave_queue();
                        self.aggregator.record_rejected_request();
                        tracing::debug!(
                            run_id = %self.run_id,
                            iteration,
                            "substrate saturated; iteration rejected"
                        );
                        if record {
                            let now = Instant::now();
                            let rejected = ExecutionRecord {
                                iteration,
                                enqueued_at,
                                started_at: now,
                                completed_at: now,
                                outcome: IterationOutcome::Failure(
                                    FailureKind::SubmissionRejected,
                                ),
                            };
                            if let Err(e) = self.aggregator.record(&rejected) {
                                tracing::warn!(error = %e, "failed to record rejection");
                            }
                        }
                        return Dispatch::Proceed;
                    }
                }
            }
            BackpressurePolicy::Drop => {
                let acquired = if saturated {
                    None
                } else {
                    Arc::clone(&self.semaphore).try_acquire_owned().ok()
                };
                match acquired {
                    Some(permit) => permit,
                    None => {
                        leave_queue();
                        self.aggregator.record_dropped_request();
                        tracing::debug!(
                            run_id = %self.run_id,
                            iteration,
                            "substrate saturated; iteration dropped"
                        );
                        return Dispatch::Proceed;
                    }
                }
            }
        };

        let task = Arc::clone(&self.task);
        let aggregator = Arc::clone(&self.aggregator);
        let stats = Arc::clone(&self.stats);
        let kill = self.kill_token.clone();
        let _ = join_set.spawn(async move {
            aggregator.queue_exited();
            let _ = stats
                .queued
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |q| q.checked_sub(1));
            let _ = stats.active.fetch_add(1, Ordering::Relaxed);
            let started_at = Instant::now();

            let outcome = tokio::select! {
                biased;
                () = kill.cancelled() => {
                    tracing::debug!(iteration, "iteration cancelled during shutdown");
                    IterationOutcome::Failure(FailureKind::Cancelled)
                }
                result = AssertUnwindSafe(task.execute(iteration)).catch_unwind() => {
                    match result {
                        Ok(TaskOutcome::Success) => IterationOutcome::Success,
                        Ok(TaskOutcome::Failure { reason }) => {
                            tracing::debug!(iteration, reason = %reason, "iteration failed");
                            IterationOutcome::Failure(FailureKind::Task)
                        }
                        Err(_) => {
                            tracing::warn!(iteration, "task panicked; recorded as failure");
                            IterationOutcome::Failure(FailureKind::Panic)
                        }
                    }
                }
            };

            if record {
                let finished = ExecutionRecord {
                    iteration,
                    enqueued_at,
                    started_at,
                    completed_at: Instant::now(),
                    outcome,
                };
                if let Err(e) = aggregator.record(&finished) {
                    tracing::warn!(iteration, error = %e, "failed to record iteration");
                }
            }
            let _ = stats
                .active
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |a| a.checked_sub(1));
            let _ = stats.completed.fetch_add(1, Ordering::Relaxed);
            drop(permit);
        });
        Dispatch::Proceed
    }

    async fn sleep_or_stop(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.stop_token.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

fn reap_finished(join_set: &mut JoinSet<()>) {
    while let Some(result) = join_set.try_join_next() {
        if let Err(e) = result {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "iteration worker failed to join");
            }
        }
    }
}

async fn drain_all(join_set: &mut JoinSet<()>) {
    while let Some(result) = join_set.join_next().await {
        if let Err(e) = result {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "iteration worker failed to join");
            }
        }
    }
}
