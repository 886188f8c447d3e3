// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The per-iteration execution record.
//!
//! A record is created by the engine at dispatch, finalized at completion,
//! consumed exactly once by the aggregator, and not retained. It lives on
//! the worker's stack; nothing here allocates.

use tokio::time::Instant;

/// Why an iteration counted as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The task returned a failure outcome.
    Task,
    /// The task panicked; the engine converted the panic to a failure.
    Panic,
    /// The concurrency substrate refused the iteration and the backpressure
    /// policy said reject.
    SubmissionRejected,
    /// The iteration was in flight when shutdown forced cancellation.
    Cancelled,
}

impl FailureKind {
    /// Stable lowercase label for logs and metric tags.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Task => "task",
            FailureKind::Panic => "panic",
            FailureKind::SubmissionRejected => "submission_rejected",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

/// The outcome of one iteration, as recorded.
///
/// Success payloads are discarded before this point; failure messages are
/// logged at the point of failure and only the kind is carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The iteration completed successfully.
    Success,
    /// The iteration failed.
    Failure(FailureKind),
}

impl IterationOutcome {
    /// Whether this outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, IterationOutcome::Success)
    }
}

/// One finalized iteration, ready for [`crate::MetricsAggregator::record`].
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRecord {
    /// Monotonically increasing index of the iteration within the run.
    pub iteration: u64,
    /// When the pacer released the iteration into the dispatch queue.
    pub enqueued_at: Instant,
    /// When the worker began executing the iteration.
    pub started_at: Instant,
    /// When execution finished.
    pub completed_at: Instant,
    /// The recorded outcome.
    pub outcome: IterationOutcome,
}

impl ExecutionRecord {
    /// Execution latency (start to completion).
    ///
    /// Saturates to zero if the clock readings are inverted.
    #[must_use]
    pub fn latency_ns(&self) -> u64 {
        self.completed_at
            .saturating_duration_since(self.started_at)
            .as_nanos()
            .min(u128::from(u64::MAX)) as u64
    }

    /// Queue wait (release to start of execution).
    #[must_use]
    pub fn queue_wait_ns(&self) -> u64 {
        self.started_at
            .saturating_duration_since(self.enqueued_at)
            .as_nanos()
            .min(u128::from(u64::MAX)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn latency_and_queue_wait_are_non_negative() {
        let enqueued_at = Instant::now();
        tokio::time::advance(Duration::from_millis(2)).await;
        let started_at = Instant::now();
        tokio::time::advance(Duration::from_millis(5)).await;
        let record = ExecutionRecord {
            iteration: 0,
            enqueued_at,
            started_at,
            completed_at: Instant::now(),
            outcome: IterationOutcome::Success,
        };
        assert_eq!(record.queue_wait_ns(), 2_000_000);
        assert_eq!(record.latency_ns(), 5_000_000);

        // Inverted readings saturate instead of panicking.
        let inverted = ExecutionRecord {
            iteration: 1,
            enqueued_at: record.completed_at,
            started_at: record.completed_at,
            completed_at: enqueued_at,
            outcome: IterationOutcome::Failure(FailureKind::Task),
        };
        assert_eq!(inverted.latency_ns(), 0);
    }
}
