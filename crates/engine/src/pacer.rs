// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Release pacing.
//!
//! The pacer converts the pattern's rate curve into discrete iteration
//! releases by integrating the curve piecewise-linearly: each poll accrues
//! `rate × Δt` of fractional credit, and one iteration is released per whole
//! credit. Within a constant-rate segment this reproduces the canonical
//! `i / rate` release times; across rate changes the integral carries over
//! exactly. A scheduling stall is caught up on the next poll, keeping the
//! cumulative release count aligned with the integral.

use std::time::Duration;

/// Upper bound on a scheduling-loop sleep, so rate changes and stop
/// requests are observed promptly.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lower bound on a scheduling-loop sleep. Rounding the release deficit
/// down to a zero-length sleep would busy-spin the loop; one millisecond is
/// the timer granularity anyway, and the credit integral absorbs the
/// overshoot by releasing more than one iteration on the next poll.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll interval while the pattern reports a zero rate.
pub const ZERO_RATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Integrates the rate curve into iteration releases.
#[derive(Debug)]
pub struct Pacer {
    last_poll: Option<Duration>,
    credit: f64,
    released: u64,
}

impl Pacer {
    /// Creates a pacer with one whole credit, so iteration 0 releases as
    /// soon as the rate is positive (release time `i / rate` starting at
    /// `i = 0`).
    #[must_use]
    pub fn new() -> Self {
        Self { last_poll: None, credit: 1.0, released: 0 }
    }

    /// Advances the integral to `elapsed` at the current `rate` and returns
    /// how many iterations to release now. Never blocks; a zero rate
    /// releases nothing and leaves accrued credit untouched.
    pub fn poll(&mut self, elapsed: Duration, rate: f64) -> u64 {
        let dt = match self.last_poll {
            Some(previous) => elapsed.saturating_sub(previous),
            None => Duration::ZERO,
        };
        self.last_poll = Some(elapsed);
        if rate <= 0.0 || !rate.is_finite() {
            return 0;
        }
        self.credit += rate * dt.as_secs_f64();
        let whole = self.credit.floor();
        if whole < 1.0 {
            return 0;
        }
        self.credit -= whole;
        let count = whole as u64;
        self.released += count;
        count
    }

    /// Iterations released so far.
    #[must_use]
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Observed release rate: released ÷ elapsed.
    #[must_use]
    pub fn actual_rate(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 { 0.0 } else { self.released as f64 / secs }
    }

    /// How long the scheduling loop may sleep before the next release is
    /// due, clamped to [[`MIN_POLL_INTERVAL`], [`MAX_POLL_INTERVAL`]] (or
    /// [`ZERO_RATE_POLL_INTERVAL`] while the rate is zero).
    #[must_use]
    pub fn next_delay(&self, rate: f64) -> Duration {
        if rate <= 0.0 || !rate.is_finite() {
            return ZERO_RATE_POLL_INTERVAL;
        }
        let deficit = (1.0 - self.credit).max(0.0);
        Duration::from_secs_f64(deficit / rate).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}
