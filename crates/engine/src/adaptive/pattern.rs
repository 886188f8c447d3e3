// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The adaptive controller as a load pattern.

use super::state::ControllerState;
use super::{AdaptivePhase, AdaptiveTelemetry};
use crate::pattern::LoadPattern;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use vajrapulse_config::{AdaptiveSettings, MaxRate};
use vajrapulse_telemetry::provider::MetricsProvider;

/// Safety ceiling applied when `max_tps` is `unlimited`: each concurrent
/// substrate slot is assumed to turn over no faster than every 10 ms, so
/// the ceiling is 100 TPS per slot.
pub const UNLIMITED_RATE_PER_SLOT: f64 = 100.0;

/// A load pattern whose rate is produced by the adaptive state machine.
///
/// Every rate query may advance the phase machine (at most once per ramp
/// interval); metrics are read through the provider the caller supplies,
/// which is expected to be a TTL-cached view so queries never contend with
/// the recording hot path. Provider errors hold the current rate.
pub struct AdaptivePattern {
    settings: AdaptiveSettings,
    max_tps: f64,
    provider: Arc<dyn MetricsProvider>,
    state: Mutex<ControllerState>,
    telemetry: Arc<AdaptiveTelemetry>,
}

impl AdaptivePattern {
    /// Creates the controller.
    ///
    /// `substrate_capacity` is the engine's concurrent-slot count, used to
    /// derive the safety ceiling when `max_tps` is `unlimited`.
    #[must_use]
    pub fn new(
        settings: AdaptiveSettings,
        provider: Arc<dyn MetricsProvider>,
        substrate_capacity: usize,
    ) -> Self {
        let max_tps = match settings.max_tps {
            MaxRate::Finite(v) => v,
            MaxRate::Unlimited => UNLIMITED_RATE_PER_SLOT * substrate_capacity.max(1) as f64,
        };
        let state = ControllerState::new(&settings, max_tps);
        let telemetry = Arc::new(AdaptiveTelemetry::default());
        telemetry.publish(state.phase, state.current_tps, state.stable_tps, state.transitions);
        Self { settings, max_tps, provider, state: Mutex::new(state), telemetry }
    }

    /// The live gauges, for wiring into the periodic reporter.
    #[must_use]
    pub fn telemetry(&self) -> Arc<AdaptiveTelemetry> {
        Arc::clone(&self.telemetry)
    }

    /// The effective rate ceiling after resolving `unlimited`.
    #[must_use]
    pub fn effective_max_tps(&self) -> f64 {
        self.max_tps
    }
}

impl LoadPattern for AdaptivePattern {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        let mut state = self.state.lock();
        if state.phase == AdaptivePhase::Complete {
            return 0.0;
        }
        let due = match state.last_tick {
            Some(last) => elapsed.saturating_sub(last) >= self.settings.ramp_interval,
            None => {
                // First query starts the interval clock; no decision yet.
                state.last_tick = Some(elapsed);
                false
            }
        };
        if due {
            state.last_tick = Some(elapsed);
            match self.provider.sample() {
                Ok(sample) => {
                    // The interval ratio, not the cumulative one: a long
                    // clean ramp must not mask a failure cliff.
                    let ratio = match state.last_sample {
                        Some(previous) => sample.ratio_since(&previous).unwrap_or(0.0),
                        None => sample.failure_ratio(),
                    };
                    state.last_sample = Some(sample);
                    state.advance(&self.settings, self.max_tps, ratio, elapsed);
                    self.telemetry.publish(
                        state.phase,
                        state.current_tps,
                        state.stable_tps,
                        state.transitions,
                    );
                }
                Err(e) => {
                    // No new information: hold the rate.
                    tracing::debug!(error = %e, "metrics provider unavailable; holding rate");
                }
            }
        }
        if state.phase == AdaptivePhase::Complete { 0.0 } else { state.current_tps }
    }

    fn total_duration(&self) -> Option<Duration> {
        self.state.lock().completed_at
    }

    fn completed(&self) -> bool {
        self.state.lock().phase == AdaptivePhase::Complete
    }

    fn label(&self) -> &'static str {
        "adaptive"
    }
}
