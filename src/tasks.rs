// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Built-in demo tasks resolvable from the command line.
//!
//! The engine core is oblivious to what a task does; this registry exists
//! so the binary has something real to drive. Identifiers:
//!
//! - `noop` — completes immediately, always succeeds
//! - `sleep:<duration>` — waits the given time, then succeeds
//! - `flaky:<n>` — fails every n-th iteration
//! - `spin:<duration>` — burns CPU for the given time (cpu-bound hint)

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use vajrapulse_engine::{ConcurrencyHint, Task, TaskOutcome};

/// The task identifier could not be resolved to a registered task.
#[derive(thiserror::Error, Debug)]
#[error("Task not found: `{id}` (known: noop, sleep:<duration>, flaky:<n>, spin:<duration>)")]
pub struct TaskNotFound {
    /// The identifier that failed to resolve.
    pub id: String,
}

struct NoopTask;

#[async_trait]
impl Task for NoopTask {
    async fn execute(&self, _iteration: u64) -> TaskOutcome {
        TaskOutcome::Success
    }
}

struct SleepTask {
    latency: Duration,
}

#[async_trait]
impl Task for SleepTask {
    async fn execute(&self, _iteration: u64) -> TaskOutcome {
        tokio::time::sleep(self.latency).await;
        TaskOutcome::Success
    }
}

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

struct SpinTask {
    burn: Duration,
}

#[async_trait]
impl Task for SpinTask {
    fn concurrency_hint(&self) -> ConcurrencyHint {
        ConcurrencyHint::CpuBound
    }

    async fn execute(&self, _iteration: u64) -> TaskOutcome {
        let until = std::time::Instant::now() + self.burn;
        let mut x = 0u64;
        while std::time::Instant::now() < until {
            x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            std::hint::black_box(x);
        }
        TaskOutcome::Success
    }
}

/// Resolves a task identifier to a runnable task.
pub fn resolve(id: &str) -> Result<Arc<dyn Task>, TaskNotFound> {
    let not_found = || TaskNotFound { id: id.to_owned() };
    if id == "noop" {
        return Ok(Arc::new(NoopTask));
    }
    if let Some(arg) = id.strip_prefix("sleep:") {
        let latency = humantime::parse_duration(arg).map_err(|_| not_found())?;
        return Ok(Arc::new(SleepTask { latency }));
    }
    if let Some(arg) = id.strip_prefix("flaky:") {
        let period: u64 = arg.parse().map_err(|_| not_found())?;
        if period == 0 {
            return Err(not_found());
        }
        return Ok(Arc::new(FlakyTask { period }));
    }
    if let Some(arg) = id.strip_prefix("spin:") {
        let burn = humantime::parse_duration(arg).map_err(|_| not_found())?;
        return Ok(Arc::new(SpinTask { burn }));
    }
    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_resolves_known_identifiers() {
        assert!(resolve("noop").is_ok());
        assert!(resolve("sleep:10ms").is_ok());
        assert!(resolve("flaky:3").is_ok());
        assert!(resolve("spin:1ms").is_ok());
    }

    #[tokio::test]
    async fn unknown_identifiers_are_rejected() {
        assert!(resolve("warp").is_err());
        assert!(resolve("flaky:0").is_err());
        assert!(resolve("sleep:fast").is_err());
    }

    #[tokio::test]
    async fn flaky_task_fails_on_schedule() {
        let task = resolve("flaky:3").expect("resolve");
        assert!(!task.execute(0).await.is_success());
        assert!(task.execute(1).await.is_success());
        assert!(task.execute(2).await.is_success());
        assert!(!task.execute(3).await.is_success());
    }
}
