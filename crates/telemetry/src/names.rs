// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Stable metric names.
//!
//! Lowercase, dot-separated, prefixed `vajrapulse.`. These names are part of
//! the external contract: dashboards key on them, so renames are breaking.
//! Every exported metric additionally carries a `run_id` tag when the run
//! has an identifier.

/// Execution latency timer; tagged `status=success|failure`.
pub const EXECUTION_DURATION: &str = "vajrapulse.execution.duration";
/// Total iterations recorded.
pub const EXECUTION_TOTAL: &str = "vajrapulse.execution.total";
/// Iterations dropped by the backpressure policy before dispatch.
pub const BACKPRESSURE_DROPPED: &str = "vajrapulse.execution.backpressure.dropped";
/// Iterations rejected by the backpressure policy.
pub const BACKPRESSURE_REJECTED: &str = "vajrapulse.execution.backpressure.rejected";
/// Current dispatch-queue depth.
pub const QUEUE_SIZE: &str = "vajrapulse.execution.queue.size";
/// Queue-wait timer (release to start of execution).
pub const QUEUE_WAIT_TIME: &str = "vajrapulse.execution.queue.wait_time";

/// Issued iterations per second; tagged `type=total`. An outcome split
/// only exists once work completes, so success/failure live on
/// [`RESPONSE_TPS`] alone.
pub const REQUEST_TPS: &str = "vajrapulse.request.tps";
/// Completed iterations per second; tagged `type=total|success|failure`.
pub const RESPONSE_TPS: &str = "vajrapulse.response.tps";

/// The pacer's current target rate.
pub const RATE_TARGET_TPS: &str = "vajrapulse.rate.target_tps";
/// The observed dispatch rate.
pub const RATE_ACTUAL_TPS: &str = "vajrapulse.rate.actual_tps";
/// Target minus actual rate.
pub const RATE_TPS_ERROR: &str = "vajrapulse.rate.tps_error";

/// Worker slots currently executing; tagged with the substrate kind.
pub const EXECUTOR_ACTIVE_THREADS: &str = "vajrapulse.executor.active.threads";
/// Configured worker-slot capacity; tagged with the substrate kind.
pub const EXECUTOR_POOL_SIZE: &str = "vajrapulse.executor.pool.size";
/// Baseline worker-slot capacity; tagged with the substrate kind.
pub const EXECUTOR_POOL_CORE_SIZE: &str = "vajrapulse.executor.pool.core.size";
/// Upper worker-slot capacity; tagged with the substrate kind.
pub const EXECUTOR_POOL_MAX_SIZE: &str = "vajrapulse.executor.pool.max.size";
/// Iterations released but not yet executing; tagged with the substrate kind.
pub const EXECUTOR_QUEUE_SIZE: &str = "vajrapulse.executor.queue.size";

/// Engine state ordinal (stopped=0, starting=1, running=2, stopping=3).
pub const ENGINE_STATE: &str = "vajrapulse.engine.state";
/// Engine uptime in seconds.
pub const ENGINE_UPTIME: &str = "vajrapulse.engine.uptime";
/// Engine uptime in milliseconds.
pub const ENGINE_UPTIME_MS: &str = "vajrapulse.engine.uptime.ms";
/// Lifecycle event counter; tagged `event=start|stop|complete`.
pub const ENGINE_LIFECYCLE_EVENTS: &str = "vajrapulse.engine.lifecycle.events";

/// Adaptive phase ordinal (ramp_up=0, ramp_down=1, sustain=2, complete=3).
pub const ADAPTIVE_PHASE: &str = "vajrapulse.adaptive.phase";
/// Adaptive current rate.
pub const ADAPTIVE_CURRENT_TPS: &str = "vajrapulse.adaptive.current_tps";
/// Adaptive stable rate; zero while unknown.
pub const ADAPTIVE_STABLE_TPS: &str = "vajrapulse.adaptive.stable_tps";
/// Cumulative adaptive phase transitions.
pub const ADAPTIVE_PHASE_TRANSITIONS: &str = "vajrapulse.adaptive.phase_transitions";

/// Resident process memory, the platform analogue of a heap gauge.
pub const PROCESS_MEMORY_RESIDENT: &str = "vajrapulse.process.memory.resident";
/// Virtual process memory, the platform analogue of a committed gauge.
pub const PROCESS_MEMORY_VIRTUAL: &str = "vajrapulse.process.memory.virtual";

/// Tag key for the run identifier.
pub const TAG_RUN_ID: &str = "run_id";
/// Tag key for outcome status.
pub const TAG_STATUS: &str = "status";
/// Tag key for rate type.
pub const TAG_TYPE: &str = "type";
/// Tag key for lifecycle events.
pub const TAG_EVENT: &str = "event";
/// Tag key for the substrate kind.
pub const TAG_THREAD_TYPE: &str = "thread_type";
