// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Load patterns: elapsed time in, target rate out.
//!
//! A pattern is a pure function of elapsed run time for the built-in
//! shapes; composite wrappers (warmup/cooldown, adaptive) implement the
//! same trait and delegate. The trait is the extension seam for
//! user-supplied shapes.

use std::time::Duration;
use vajrapulse_config::PatternSpec;

mod builtin;
mod warmup;

pub use builtin::{RampSustain, RampUp, SineWave, Spike, StaticRate, StepPattern};
pub use warmup::WarmupCooldown;

/// A time-varying target rate with an optional total duration.
pub trait LoadPattern: Send + Sync {
    /// Target rate in iterations per second at `elapsed` into the run.
    /// Never negative.
    fn target_rate(&self, elapsed: Duration) -> f64;

    /// Total run length, or `None` for an unbounded pattern. The engine
    /// stops an unbounded pattern only on request, adaptive completion, or
    /// zero-rate exhaustion.
    fn total_duration(&self) -> Option<Duration>;

    /// Whether the aggregator should record iterations dispatched at
    /// `elapsed`. Wrapping patterns use this to suppress warmup/cooldown
    /// noise.
    fn records_at(&self, _elapsed: Duration) -> bool {
        true
    }

    /// Whether the pattern has declared itself finished independent of its
    /// duration. Only the adaptive controller does.
    fn completed(&self) -> bool {
        false
    }

    /// A short lowercase label for reports and metric tags.
    fn label(&self) -> &'static str;
}

/// Builds the built-in pattern described by `spec`.
///
/// Returns `None` for the adaptive spec: the adaptive pattern needs a
/// metrics provider and a substrate capacity, which the runner wires.
#[must_use]
pub fn from_spec(spec: &PatternSpec) -> Option<Box<dyn LoadPattern>> {
    match spec {
        PatternSpec::Static { tps, duration } => {
            Some(Box::new(StaticRate::new(*tps, *duration)))
        }
        PatternSpec::Ramp { tps, duration } => Some(Box::new(RampUp::new(*tps, *duration))),
        PatternSpec::RampSustain { tps, ramp_duration, hold_duration } => {
            Some(Box::new(RampSustain::new(*tps, *ramp_duration, *hold_duration)))
        }
        PatternSpec::Step { steps } => {
            let segments = steps.iter().map(|s| (s.tps, s.duration)).collect();
            Some(Box::new(StepPattern::new(segments)))
        }
        PatternSpec::Sine { mean_rate, amplitude, period, duration } => {
            Some(Box::new(SineWave::new(*mean_rate, *amplitude, *period, *duration)))
        }
        PatternSpec::Spike { base_rate, spike_rate, spike_interval, spike_duration, duration } => {
            Some(Box::new(Spike::new(
                *base_rate,
                *spike_rate,
                *spike_interval,
                *spike_duration,
                *duration,
            )))
        }
        PatternSpec::Adaptive { .. } => None,
    }
}
