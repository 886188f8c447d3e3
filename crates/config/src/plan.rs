// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Resolution of layered options into a validated run plan.

use crate::adaptive::AdaptiveSettings;
use crate::error::Error;
use crate::options::{BackpressureMode, LoadMode, Options};
use crate::pattern::PatternSpec;
use crate::percentiles::PercentileKeys;
use std::path::PathBuf;
use std::time::Duration;

/// Default total duration when none is configured.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);
/// Default periodic report interval.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);
/// Default graceful-drain timeout on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Default forced-cancellation timeout after the drain expires.
pub const DEFAULT_FORCE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default concurrency cap for io-bound tasks.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Engine and reporting settings common to all load modes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Run identifier tag; generated by the runner when `None`.
    pub run_id: Option<String>,
    /// Warmup window with suppressed recording.
    pub warmup: Option<Duration>,
    /// Cooldown window with suppressed recording.
    pub cooldown: Option<Duration>,
    /// Periodic report interval.
    pub report_interval: Duration,
    /// Whether the first periodic report fires immediately.
    pub report_immediately: bool,
    /// Percentile keys for snapshots.
    pub percentiles: PercentileKeys,
    /// Latency bounds for SLO attainment reporting; empty disables it.
    pub slo_buckets: Vec<Duration>,
    /// Graceful-drain timeout on shutdown.
    pub drain_timeout: Duration,
    /// Forced-cancellation timeout after the drain expires.
    pub force_timeout: Duration,
    /// Concurrency cap for io-bound tasks.
    pub max_in_flight: usize,
    /// Dispatcher behavior under substrate saturation.
    pub backpressure: BackpressureMode,
    /// Whether the structured-log exporter is enabled.
    pub log_exporter: bool,
    /// Path receiving the JSON-lines report, if any.
    pub output: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            run_id: None,
            warmup: None,
            cooldown: None,
            report_interval: DEFAULT_REPORT_INTERVAL,
            report_immediately: false,
            percentiles: PercentileKeys::default(),
            slo_buckets: Vec::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            force_timeout: DEFAULT_FORCE_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            backpressure: BackpressureMode::default(),
            log_exporter: true,
            output: None,
        }
    }
}

/// A fully resolved, validated description of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    /// The load shape.
    pub pattern: PatternSpec,
    /// Engine and reporting settings.
    pub settings: RunSettings,
}

impl RunPlan {
    /// Resolves merged [`Options`] into a validated plan.
    ///
    /// The mode defaults to `static`. Mode-specific required options
    /// (e.g. `--tps` for static) produce [`Error::InvalidOption`] when
    /// absent; durations default to [`DEFAULT_DURATION`].
    pub fn resolve(options: Options) -> Result<RunPlan, Error> {
        let mode = options.mode.unwrap_or(LoadMode::Static);
        let duration = options.duration.unwrap_or(DEFAULT_DURATION);
        let pattern = match mode {
            LoadMode::Static => PatternSpec::Static {
                tps: required_rate("--tps", options.tps)?,
                duration,
            },
            LoadMode::Ramp => PatternSpec::Ramp {
                tps: required_rate("--tps", options.tps)?,
                duration: options.ramp_duration.unwrap_or(duration),
            },
            LoadMode::RampSustain => PatternSpec::RampSustain {
                tps: required_rate("--tps", options.tps)?,
                ramp_duration: options.ramp_duration.ok_or(Error::InvalidOption {
                    option: "--ramp-duration",
                    details: "required for ramp-sustain mode".to_owned(),
                })?,
                hold_duration: duration,
            },
            LoadMode::Step => PatternSpec::Step {
                steps: options.steps.clone().ok_or(Error::InvalidOption {
                    option: "--steps",
                    details: "required for step mode".to_owned(),
                })?,
            },
            LoadMode::Sine => PatternSpec::Sine {
                mean_rate: required_rate("--mean-rate", options.mean_rate)?,
                amplitude: options.amplitude.unwrap_or(0.0),
                period: options.period.ok_or(Error::InvalidOption {
                    option: "--period",
                    details: "required for sine mode".to_owned(),
                })?,
                duration,
            },
            LoadMode::Spike => PatternSpec::Spike {
                base_rate: required_rate("--base-rate", options.base_rate)?,
                spike_rate: required_rate("--spike-rate", options.spike_rate)?,
                spike_interval: options.spike_interval.ok_or(Error::InvalidOption {
                    option: "--spike-interval",
                    details: "required for spike mode".to_owned(),
                })?,
                spike_duration: options.spike_duration.ok_or(Error::InvalidOption {
                    option: "--spike-duration",
                    details: "required for spike mode".to_owned(),
                })?,
                duration,
            },
            LoadMode::Adaptive => {
                let defaults = AdaptiveSettings::default();
                let adaptive = AdaptiveSettings {
                    initial_tps: options.initial_tps.unwrap_or(defaults.initial_tps),
                    ramp_increment: options.ramp_increment.unwrap_or(defaults.ramp_increment),
                    ramp_decrement: options.ramp_decrement.unwrap_or(defaults.ramp_decrement),
                    ramp_interval: options.ramp_interval.unwrap_or(defaults.ramp_interval),
                    min_tps: options.min_tps.unwrap_or(defaults.min_tps),
                    max_tps: options.max_tps.unwrap_or(defaults.max_tps),
                    sustain_duration: options
                        .sustain_duration
                        .unwrap_or(defaults.sustain_duration),
                    stable_intervals_required: options
                        .stable_intervals_required
                        .unwrap_or(defaults.stable_intervals_required),
                    error_threshold: options
                        .error_threshold
                        .unwrap_or(defaults.error_threshold),
                    max_search_cycles: options
                        .max_search_cycles
                        .unwrap_or(defaults.max_search_cycles),
                };
                PatternSpec::Adaptive { adaptive }
            }
        };
        pattern.validate()?;

        let defaults = RunSettings::default();
        let settings = RunSettings {
            run_id: options.run_id,
            warmup: options.warmup,
            cooldown: options.cooldown,
            report_interval: options.report_interval.unwrap_or(defaults.report_interval),
            report_immediately: options
                .report_immediately
                .unwrap_or(defaults.report_immediately),
            percentiles: options.percentiles.unwrap_or_default(),
            slo_buckets: options.slo_buckets.unwrap_or_default(),
            drain_timeout: options.drain_timeout.unwrap_or(defaults.drain_timeout),
            force_timeout: options.force_timeout.unwrap_or(defaults.force_timeout),
            max_in_flight: options.max_in_flight.unwrap_or(defaults.max_in_flight),
            backpressure: options.backpressure.unwrap_or_default(),
            log_exporter: options.log_exporter.unwrap_or(defaults.log_exporter),
            output: options.output,
        };
        if settings.max_in_flight == 0 {
            return Err(Error::InvalidOption {
                option: "--max-in-flight",
                details: "must be at least 1".to_owned(),
            });
        }
        Ok(RunPlan { pattern, settings })
    }

    /// The adaptive settings, when the plan drives an adaptive run.
    #[must_use]
    pub fn adaptive(&self) -> Option<&AdaptiveSettings> {
        match &self.pattern {
            PatternSpec::Adaptive { adaptive } => Some(adaptive),
            _ => None,
        }
    }
}

fn required_rate(option: &'static str, value: Option<f64>) -> Result<f64, Error> {
    value.ok_or(Error::InvalidOption { option, details: "required for this mode".to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::MaxRate;
    use crate::pattern::StepSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn static_mode_requires_tps() {
        let error =
            RunPlan::resolve(Options::default()).expect_err("tps must be required");
        assert_eq!(error.variant_name(), "InvalidOption");
    }

    #[test]
    fn precedence_flags_over_env_over_file() {
        let file = Options {
            mode: Some(LoadMode::Static),
            tps: Some(10.0),
            duration: Some(Duration::from_secs(10)),
            ..Options::default()
        };
        let env = Options { tps: Some(20.0), ..Options::default() };
        let flags = Options { tps: Some(30.0), ..Options::default() };
        let merged = Options::default().merge(file).merge(env).merge(flags);
        let plan = RunPlan::resolve(merged).expect("plan");
        assert_eq!(
            plan.pattern,
            PatternSpec::Static { tps: 30.0, duration: Duration::from_secs(10) }
        );
    }

    #[test]
    fn adaptive_mode_fills_defaults_and_validates() {
        let options = Options {
            mode: Some(LoadMode::Adaptive),
            initial_tps: Some(5.0),
            max_tps: Some(MaxRate::Unlimited),
            ..Options::default()
        };
        let plan = RunPlan::resolve(options).expect("plan");
        let adaptive = plan.adaptive().expect("adaptive settings");
        assert_eq!(adaptive.initial_tps, 5.0);
        assert_eq!(adaptive.max_tps, MaxRate::Unlimited);
        assert_eq!(
            adaptive.stable_intervals_required,
            AdaptiveSettings::default().stable_intervals_required
        );
    }

    #[test]
    fn invalid_adaptive_combination_rejected() {
        let options = Options {
            mode: Some(LoadMode::Adaptive),
            initial_tps: Some(5.0),
            min_tps: Some(50.0),
            ..Options::default()
        };
        assert!(RunPlan::resolve(options).is_err());
    }

    #[test]
    fn step_mode_builds_plan() {
        let options = Options {
            mode: Some(LoadMode::Step),
            steps: Some(vec![StepSpec { tps: 10.0, duration: Duration::from_secs(1) }]),
            ..Options::default()
        };
        let plan = RunPlan::resolve(options).expect("plan");
        assert_eq!(plan.pattern.mode_label(), "step");
    }
}
