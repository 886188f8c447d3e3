// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The phase state machine, kept free of clocks and providers so every
//! transition is unit-testable.

use super::AdaptivePhase;
use std::time::Duration;
use vajrapulse_config::AdaptiveSettings;
use vajrapulse_telemetry::provider::MetricsSample;

/// The mutable state owned by the controller.
#[derive(Debug)]
pub(super) struct ControllerState {
    pub phase: AdaptivePhase,
    pub current_tps: f64,
    /// Zero while no stable rate is known.
    pub stable_tps: f64,
    /// Consecutive below-threshold intervals observed in ramp-down.
    pub stable_intervals: u32,
    /// Consecutive saturated intervals spent pinned at the minimum rate.
    pub intervals_at_min: u32,
    /// Completed ramp-up/ramp-down rounds that found no stable rate.
    pub cycles: u32,
    /// Cumulative phase transitions.
    pub transitions: u64,
    /// Elapsed time at which the search gave up, once it has.
    pub completed_at: Option<Duration>,
    /// Elapsed time of the last phase tick.
    pub last_tick: Option<Duration>,
    /// The metrics sample taken at the last tick, for interval deltas.
    pub last_sample: Option<MetricsSample>,
}

impl ControllerState {
    pub(super) fn new(settings: &AdaptiveSettings, max_tps: f64) -> Self {
        Self {
            phase: AdaptivePhase::RampUp,
            current_tps: settings.initial_tps.clamp(settings.min_tps, max_tps),
            stable_tps: 0.0,
            stable_intervals: 0,
            intervals_at_min: 0,
            cycles: 0,
            transitions: 0,
            completed_at: None,
            last_tick: None,
            last_sample: None,
        }
    }

    fn transition(&mut self, to: AdaptivePhase, elapsed: Duration) {
        tracing::debug!(
            from = self.phase.label(),
            to = to.label(),
            current_tps = self.current_tps,
            stable_tps = self.stable_tps,
            elapsed_ms = elapsed.as_millis() as u64,
            "adaptive phase transition"
        );
        self.phase = to;
        self.transitions += 1;
    }

    /// Advances one phase interval with the observed failure ratio.
    pub(super) fn advance(
        &mut self,
        settings: &AdaptiveSettings,
        max_tps: f64,
        failure_ratio: f64,
        elapsed: Duration,
    ) {
        match self.phase {
            AdaptivePhase::RampUp => {
                if failure_ratio >= settings.error_threshold || self.current_tps >= max_tps {
                    // Hitting the ceiling without failures still demotes, to
                    // probe whether the ceiling itself is sustainable.
                    self.transition(AdaptivePhase::RampDown, elapsed);
                    self.stable_intervals = 0;
                    self.intervals_at_min = 0;
                } else {
                    self.current_tps =
                        (self.current_tps + settings.ramp_increment).min(max_tps);
                    self.stable_intervals = 0;
                }
            }
            AdaptivePhase::RampDown => {
                if failure_ratio < settings.error_threshold {
                    self.intervals_at_min = 0;
                    self.stable_intervals += 1;
                    if self.stable_intervals >= settings.stable_intervals_required {
                        // Stabilize at the rate the clean intervals were
                        // observed at; no decrement on this tick.
                        self.stable_tps = self.current_tps;
                        self.transition(AdaptivePhase::Sustain, elapsed);
                        return;
                    }
                } else {
                    self.stable_intervals = 0;
                }
                self.current_tps =
                    (self.current_tps - settings.ramp_decrement).max(settings.min_tps);
                if failure_ratio >= settings.error_threshold
                    && self.current_tps <= settings.min_tps
                {
                    self.intervals_at_min += 1;
                    if self.intervals_at_min >= settings.stable_intervals_required {
                        self.cycles += 1;
                        self.intervals_at_min = 0;
                        if self.cycles >= settings.max_search_cycles {
                            self.transition(AdaptivePhase::Complete, elapsed);
                            self.completed_at = Some(elapsed);
                            self.current_tps = 0.0;
                        } else {
                            self.transition(AdaptivePhase::RampUp, elapsed);
                        }
                    }
                }
            }
            AdaptivePhase::Sustain => {
                if failure_ratio > settings.error_threshold {
                    self.stable_tps = 0.0;
                    self.stable_intervals = 0;
                    self.transition(AdaptivePhase::RampDown, elapsed);
                }
                // After the sustain timer the controller simply stays here,
                // still monitoring; see the module docs.
            }
            AdaptivePhase::Complete => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AdaptiveSettings {
        AdaptiveSettings {
            initial_tps: 10.0,
            ramp_increment: 10.0,
            ramp_decrement: 10.0,
            ramp_interval: Duration::from_secs(1),
            min_tps: 5.0,
            max_tps: vajrapulse_config::MaxRate::Finite(50.0),
            sustain_duration: Duration::from_secs(10),
            stable_intervals_required: 2,
            error_threshold: 0.05,
            max_search_cycles: 2,
        }
    }

    fn tick(state: &mut ControllerState, cfg: &AdaptiveSettings, ratio: f64, at_secs: u64) {
        state.advance(cfg, 50.0, ratio, Duration::from_secs(at_secs));
    }

    #[test]
    fn ramps_up_until_threshold_then_down_to_stability() {
        let cfg = settings();
        let mut state = ControllerState::new(&cfg, 50.0);
        assert_eq!(state.phase, AdaptivePhase::RampUp);
        assert_eq!(state.current_tps, 10.0);

        // Two clean intervals climb the rate.
        tick(&mut state, &cfg, 0.0, 1);
        tick(&mut state, &cfg, 0.0, 2);
        assert_eq!(state.current_tps, 30.0);
        assert_eq!(state.phase, AdaptivePhase::RampUp);

        // Failures appear: demote without changing the rate this interval.
        tick(&mut state, &cfg, 0.2, 3);
        assert_eq!(state.phase, AdaptivePhase::RampDown);
        assert_eq!(state.current_tps, 30.0);

        // Two consecutive clean intervals stabilize at the rate the second
        // clean interval ran at.
        tick(&mut state, &cfg, 0.01, 4);
        assert_eq!(state.current_tps, 20.0);
        tick(&mut state, &cfg, 0.01, 5);
        assert_eq!(state.phase, AdaptivePhase::Sustain);
        assert_eq!(state.stable_tps, 20.0);
        assert_eq!(state.current_tps, 20.0);
        assert!(state.transitions >= 2);
    }

    #[test]
    fn rate_never_leaves_the_configured_band() {
        let cfg = settings();
        let mut state = ControllerState::new(&cfg, 50.0);
        for i in 0..20 {
            tick(&mut state, &cfg, 0.0, i);
            assert!(state.current_tps >= cfg.min_tps);
            assert!(state.current_tps <= 50.0);
        }
        // Saturation pushes it down but never below the minimum.
        for i in 20..60 {
            tick(&mut state, &cfg, 0.5, i);
            if state.phase == AdaptivePhase::Complete {
                break;
            }
            assert!(state.current_tps >= cfg.min_tps, "tps {}", state.current_tps);
        }
    }

    #[test]
    fn hitting_the_ceiling_without_failures_probes_downward() {
        let cfg = settings();
        let mut state = ControllerState::new(&cfg, 50.0);
        // Climb to the ceiling cleanly: 10 → 50 in four intervals.
        for i in 0..4 {
            tick(&mut state, &cfg, 0.0, i);
        }
        assert_eq!(state.current_tps, 50.0);
        assert_eq!(state.phase, AdaptivePhase::RampUp);
        tick(&mut state, &cfg, 0.0, 5);
        assert_eq!(state.phase, AdaptivePhase::RampDown);
    }

    #[test]
    fn persistent_saturation_exhausts_the_search() {
        let cfg = settings();
        let mut state = ControllerState::new(&cfg, 50.0);
        let mut at = 0;
        while state.phase != AdaptivePhase::Complete {
            at += 1;
            assert!(at < 200, "search never completed");
            tick(&mut state, &cfg, 0.9, at);
        }
        assert_eq!(state.current_tps, 0.0);
        assert!(state.completed_at.is_some());
        assert_eq!(state.cycles, cfg.max_search_cycles);
    }

    #[test]
    fn sustain_demotes_on_a_failure_spike() {
        let cfg = settings();
        let mut state = ControllerState::new(&cfg, 50.0);
        tick(&mut state, &cfg, 0.2, 1);
        tick(&mut state, &cfg, 0.0, 2);
        tick(&mut state, &cfg, 0.0, 3);
        assert_eq!(state.phase, AdaptivePhase::Sustain);
        let stable = state.stable_tps;
        assert!(stable > 0.0);

        // Clean intervals keep it sustained.
        tick(&mut state, &cfg, 0.0, 4);
        assert_eq!(state.phase, AdaptivePhase::Sustain);

        // A spike above the threshold demotes and clears the stable rate.
        tick(&mut state, &cfg, 0.5, 5);
        assert_eq!(state.phase, AdaptivePhase::RampDown);
        assert_eq!(state.stable_tps, 0.0);
    }
}
