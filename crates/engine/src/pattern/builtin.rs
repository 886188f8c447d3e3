// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The built-in load shapes.

use super::LoadPattern;
use std::time::Duration;

/// Constant rate for a fixed duration.
pub struct StaticRate {
    tps: f64,
    duration: Duration,
}

impl StaticRate {
    /// Creates a constant-rate pattern.
    #[must_use]
    pub fn new(tps: f64, duration: Duration) -> Self {
        Self { tps: tps.max(0.0), duration }
    }
}

impl LoadPattern for StaticRate {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        if elapsed < self.duration { self.tps } else { 0.0 }
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn label(&self) -> &'static str {
        "static"
    }
}

/// Linear ramp from zero to a peak over the whole duration.
pub struct RampUp {
    peak_tps: f64,
    duration: Duration,
}

impl RampUp {
    /// Creates a linear ramp ending at `peak_tps`.
    #[must_use]
    pub fn new(peak_tps: f64, duration: Duration) -> Self {
        Self { peak_tps: peak_tps.max(0.0), duration }
    }
}

impl LoadPattern for RampUp {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.duration {
            return 0.0;
        }
        let fraction = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.peak_tps * fraction
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn label(&self) -> &'static str {
        "ramp"
    }
}

/// Linear ramp to a peak, then hold it.
pub struct RampSustain {
    peak_tps: f64,
    ramp: Duration,
    hold: Duration,
}

impl RampSustain {
    /// Creates a ramp of `ramp` followed by a hold of `hold`.
    #[must_use]
    pub fn new(peak_tps: f64, ramp: Duration, hold: Duration) -> Self {
        Self { peak_tps: peak_tps.max(0.0), ramp, hold }
    }
}

impl LoadPattern for RampSustain {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        if elapsed < self.ramp {
            let fraction = elapsed.as_secs_f64() / self.ramp.as_secs_f64();
            self.peak_tps * fraction
        } else if elapsed < self.ramp + self.hold {
            self.peak_tps
        } else {
            0.0
        }
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.ramp + self.hold)
    }

    fn label(&self) -> &'static str {
        "ramp-sustain"
    }
}

/// A sequence of constant-rate segments.
pub struct StepPattern {
    segments: Vec<(f64, Duration)>,
    total: Duration,
}

impl StepPattern {
    /// Creates a pattern from `(tps, duration)` segments, executed in order.
    #[must_use]
    pub fn new(segments: Vec<(f64, Duration)>) -> Self {
        let total = segments.iter().map(|(_, d)| *d).sum();
        Self { segments, total }
    }
}

impl LoadPattern for StepPattern {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        let mut offset = Duration::ZERO;
        for (tps, duration) in &self.segments {
            offset += *duration;
            if elapsed < offset {
                return tps.max(0.0);
            }
        }
        0.0
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.total)
    }

    fn label(&self) -> &'static str {
        "step"
    }
}

/// A sinusoidal rate around a mean, clamped at zero.
pub struct SineWave {
    mean_rate: f64,
    amplitude: f64,
    period: Duration,
    duration: Duration,
}

impl SineWave {
    /// Creates a sine pattern oscillating `mean ± amplitude` with `period`.
    #[must_use]
    pub fn new(mean_rate: f64, amplitude: f64, period: Duration, duration: Duration) -> Self {
        Self { mean_rate: mean_rate.max(0.0), amplitude: amplitude.abs(), period, duration }
    }
}

impl LoadPattern for SineWave {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.duration {
            return 0.0;
        }
        let angle =
            2.0 * std::f64::consts::PI * elapsed.as_secs_f64() / self.period.as_secs_f64();
        (self.mean_rate + self.amplitude * angle.sin()).max(0.0)
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn label(&self) -> &'static str {
        "sine"
    }
}

/// A baseline rate with periodic elevated intervals.
pub struct Spike {
    base_rate: f64,
    spike_rate: f64,
    interval: Duration,
    spike_duration: Duration,
    duration: Duration,
}

impl Spike {
    /// Creates a spike pattern: each `interval` starts with `spike_duration`
    /// at `spike_rate`, then falls back to `base_rate`.
    #[must_use]
    pub fn new(
        base_rate: f64,
        spike_rate: f64,
        interval: Duration,
        spike_duration: Duration,
        duration: Duration,
    ) -> Self {
        Self {
            base_rate: base_rate.max(0.0),
            spike_rate: spike_rate.max(0.0),
            interval,
            spike_duration,
            duration,
        }
    }
}

impl LoadPattern for Spike {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.duration {
            return 0.0;
        }
        let interval_ns = self.interval.as_nanos().max(1);
        let position_ns = elapsed.as_nanos() % interval_ns;
        if position_ns < self.spike_duration.as_nanos() {
            self.spike_rate
        } else {
            self.base_rate
        }
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn label(&self) -> &'static str {
        "spike"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn static_rate_is_flat_then_zero() {
        let pattern = StaticRate::new(100.0, secs(10));
        assert_eq!(pattern.target_rate(Duration::ZERO), 100.0);
        assert_eq!(pattern.target_rate(secs(9)), 100.0);
        assert_eq!(pattern.target_rate(secs(10)), 0.0);
        assert_eq!(pattern.total_duration(), Some(secs(10)));
    }

    #[test]
    fn ramp_is_linear() {
        let pattern = RampUp::new(200.0, secs(10));
        assert_eq!(pattern.target_rate(Duration::ZERO), 0.0);
        assert!((pattern.target_rate(secs(5)) - 100.0).abs() < 1e-9);
        assert_eq!(pattern.target_rate(secs(10)), 0.0);
    }

    #[test]
    fn ramp_sustain_holds_peak() {
        let pattern = RampSustain::new(100.0, secs(10), secs(20));
        assert!((pattern.target_rate(secs(5)) - 50.0).abs() < 1e-9);
        assert_eq!(pattern.target_rate(secs(15)), 100.0);
        assert_eq!(pattern.target_rate(secs(30)), 0.0);
        assert_eq!(pattern.total_duration(), Some(secs(30)));
    }

    #[test]
    fn step_pattern_walks_segments() {
        let pattern =
            StepPattern::new(vec![(10.0, secs(1)), (50.0, secs(2)), (20.0, secs(1))]);
        assert_eq!(pattern.target_rate(Duration::from_millis(500)), 10.0);
        assert_eq!(pattern.target_rate(secs(2)), 50.0);
        assert_eq!(pattern.target_rate(Duration::from_millis(3_500)), 20.0);
        assert_eq!(pattern.target_rate(secs(4)), 0.0);
        assert_eq!(pattern.total_duration(), Some(secs(4)));
    }

    #[test]
    fn sine_oscillates_and_never_goes_negative() {
        let pattern = SineWave::new(50.0, 80.0, secs(4), secs(40));
        assert!((pattern.target_rate(Duration::ZERO) - 50.0).abs() < 1e-9);
        // Quarter period: mean + amplitude.
        assert!((pattern.target_rate(secs(1)) - 130.0).abs() < 1e-6);
        // Three-quarter period would be mean - amplitude = -30; clamped.
        assert_eq!(pattern.target_rate(secs(3)), 0.0);
    }

    #[test]
    fn spike_elevates_at_interval_start() {
        let pattern = Spike::new(
            10.0,
            100.0,
            secs(10),
            Duration::from_millis(500),
            secs(60),
        );
        assert_eq!(pattern.target_rate(Duration::from_millis(100)), 100.0);
        assert_eq!(pattern.target_rate(secs(1)), 10.0);
        assert_eq!(pattern.target_rate(Duration::from_millis(10_200)), 100.0);
        assert_eq!(pattern.target_rate(secs(60)), 0.0);
    }
}
