// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The adaptive load controller.
//!
//! A four-phase state machine drives the target rate from live feedback:
//! ramp up while the failure ratio stays under the threshold, ramp down
//! once it saturates (or the ceiling is probed), sustain once a rate has
//! stayed clean for enough consecutive intervals, and complete only when
//! the search gives up. The controller is itself a
//! [`crate::pattern::LoadPattern`]; the engine is unaware it is adaptive.
//!
//! Sustain semantics: after `sustain_duration` the controller stays in
//! sustain at the stable rate, still monitoring — a failure spike demotes
//! back to ramp-down. It never re-enters ramp-up from sustain.

mod pattern;
mod state;

pub use pattern::{AdaptivePattern, UNLIMITED_RATE_PER_SLOT};

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use vajrapulse_telemetry::names;
use vajrapulse_telemetry::snapshot::{GaugeSource, Metric};

/// The phase of the adaptive search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptivePhase {
    /// Increasing the rate while failures stay under the threshold.
    RampUp,
    /// Backing off after saturation (or after probing the ceiling).
    RampDown,
    /// Holding a rate that stayed clean for enough intervals.
    Sustain,
    /// The search gave up without finding a stable rate.
    Complete,
}

impl AdaptivePhase {
    /// Stable ordinal used as the phase gauge value.
    #[must_use]
    pub fn ordinal(&self) -> u8 {
        match self {
            AdaptivePhase::RampUp => 0,
            AdaptivePhase::RampDown => 1,
            AdaptivePhase::Sustain => 2,
            AdaptivePhase::Complete => 3,
        }
    }

    /// Stable lowercase label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AdaptivePhase::RampUp => "ramp_up",
            AdaptivePhase::RampDown => "ramp_down",
            AdaptivePhase::Sustain => "sustain",
            AdaptivePhase::Complete => "complete",
        }
    }
}

/// Live gauges exported by the controller.
///
/// Written by the controller on every phase tick, read by the periodic
/// reporter; all fields are atomics so neither side blocks the other.
#[derive(Debug, Default)]
pub struct AdaptiveTelemetry {
    phase: AtomicU8,
    current_tps_bits: AtomicU64,
    stable_tps_bits: AtomicU64,
    transitions: AtomicU64,
}

impl AdaptiveTelemetry {
    pub(crate) fn publish(
        &self,
        phase: AdaptivePhase,
        current_tps: f64,
        stable_tps: f64,
        transitions: u64,
    ) {
        self.phase.store(phase.ordinal(), Ordering::Relaxed);
        self.current_tps_bits.store(current_tps.to_bits(), Ordering::Relaxed);
        self.stable_tps_bits.store(stable_tps.to_bits(), Ordering::Relaxed);
        self.transitions.store(transitions, Ordering::Relaxed);
    }

    /// The current phase ordinal.
    #[must_use]
    pub fn phase_ordinal(&self) -> u8 {
        self.phase.load(Ordering::Relaxed)
    }

    /// The current target rate.
    #[must_use]
    pub fn current_tps(&self) -> f64 {
        f64::from_bits(self.current_tps_bits.load(Ordering::Relaxed))
    }

    /// The stable rate; zero while unknown.
    #[must_use]
    pub fn stable_tps(&self) -> f64 {
        f64::from_bits(self.stable_tps_bits.load(Ordering::Relaxed))
    }

    /// Cumulative phase transitions.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }
}

impl GaugeSource for AdaptiveTelemetry {
    fn collect(&self, out: &mut Vec<Metric>) {
        out.push(Metric::gauge(names::ADAPTIVE_PHASE, f64::from(self.phase_ordinal())));
        out.push(Metric::gauge(names::ADAPTIVE_CURRENT_TPS, self.current_tps()));
        out.push(Metric::gauge(names::ADAPTIVE_STABLE_TPS, self.stable_tps()));
        out.push(Metric::gauge(
            names::ADAPTIVE_PHASE_TRANSITIONS,
            self.transitions() as f64,
        ));
    }
}
