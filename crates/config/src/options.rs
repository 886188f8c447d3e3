// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! One mergeable layer of run options.
//!
//! Every source of configuration — defaults, file, environment, flags —
//! produces an [`Options`] value. Layers merge field by field with the later
//! layer winning, which keeps the precedence rule trivial to state and test.

use crate::adaptive::MaxRate;
use crate::duration::parse_flexible;
use crate::error::Error;
use crate::pattern::{StepSpec, parse_steps};
use crate::percentiles::PercentileKeys;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What the dispatcher does when the substrate reports saturation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressureMode {
    /// Wait for capacity (the scheduling loop stalls).
    #[default]
    Queue,
    /// Count the iteration as rejected and record a failure.
    Reject,
    /// Count the iteration as dropped; no record.
    Drop,
}

impl FromStr for BackpressureMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(BackpressureMode::Queue),
            "reject" => Ok(BackpressureMode::Reject),
            "drop" => Ok(BackpressureMode::Drop),
            other => Err(Error::InvalidOption {
                option: "--backpressure",
                details: format!("unknown mode `{other}` (expected queue|reject|drop)"),
            }),
        }
    }
}

/// The load mode selected by `--mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Constant rate.
    Static,
    /// Linear ramp from zero.
    Ramp,
    /// Ramp then hold.
    RampSustain,
    /// Explicit rate:duration segments.
    Step,
    /// Sinusoidal rate.
    Sine,
    /// Baseline with periodic spikes.
    Spike,
    /// Feedback-controlled rate.
    Adaptive,
}

impl FromStr for LoadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(LoadMode::Static),
            "ramp" => Ok(LoadMode::Ramp),
            "ramp-sustain" => Ok(LoadMode::RampSustain),
            "step" => Ok(LoadMode::Step),
            "sine" => Ok(LoadMode::Sine),
            "spike" => Ok(LoadMode::Spike),
            "adaptive" => Ok(LoadMode::Adaptive),
            other => Err(Error::InvalidOption {
                option: "--mode",
                details: format!(
                    "unknown mode `{other}` (expected static|ramp|ramp-sustain|step|sine|spike|adaptive)"
                ),
            }),
        }
    }
}

/// A single layer of (possibly partial) run options.
///
/// All fields are optional; [`Options::merge`] overlays a higher-precedence
/// layer on top of `self`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Load mode.
    pub mode: Option<LoadMode>,
    /// Base rate for static/ramp/ramp-sustain modes.
    pub tps: Option<f64>,
    /// Total duration (static, sine, spike) or hold duration (ramp-sustain).
    pub duration: Option<Duration>,
    /// Ramp length for ramp/ramp-sustain modes.
    pub ramp_duration: Option<Duration>,
    /// Step segments for step mode.
    pub steps: Option<Vec<StepSpec>>,
    /// Mean rate for sine mode.
    pub mean_rate: Option<f64>,
    /// Amplitude for sine mode.
    pub amplitude: Option<f64>,
    /// Period for sine mode.
    pub period: Option<Duration>,
    /// Baseline rate for spike mode.
    pub base_rate: Option<f64>,
    /// Elevated rate for spike mode.
    pub spike_rate: Option<f64>,
    /// Spike spacing for spike mode.
    pub spike_interval: Option<Duration>,
    /// Spike length for spike mode.
    pub spike_duration: Option<Duration>,

    /// Adaptive: starting rate.
    pub initial_tps: Option<f64>,
    /// Adaptive: ramp-up step.
    pub ramp_increment: Option<f64>,
    /// Adaptive: ramp-down step.
    pub ramp_decrement: Option<f64>,
    /// Adaptive: phase-advance interval.
    pub ramp_interval: Option<Duration>,
    /// Adaptive: lower clamp.
    pub min_tps: Option<f64>,
    /// Adaptive: upper clamp or `unlimited`.
    pub max_tps: Option<MaxRate>,
    /// Adaptive: sustain length.
    pub sustain_duration: Option<Duration>,
    /// Adaptive: failure-ratio threshold.
    pub error_threshold: Option<f64>,
    /// Adaptive: consecutive stable intervals required.
    pub stable_intervals_required: Option<u32>,
    /// Adaptive: search rounds before giving up.
    pub max_search_cycles: Option<u32>,

    /// Run identifier tag.
    pub run_id: Option<String>,
    /// Warmup window with suppressed recording.
    pub warmup: Option<Duration>,
    /// Cooldown window with suppressed recording.
    pub cooldown: Option<Duration>,
    /// Periodic report interval.
    pub report_interval: Option<Duration>,
    /// Whether the first periodic report fires immediately.
    pub report_immediately: Option<bool>,
    /// Percentile keys for snapshots.
    pub percentiles: Option<PercentileKeys>,
    /// Latency bounds for SLO attainment reporting.
    pub slo_buckets: Option<Vec<Duration>>,
    /// Graceful-drain timeout on shutdown.
    pub drain_timeout: Option<Duration>,
    /// Forced-cancellation timeout after the drain expires.
    pub force_timeout: Option<Duration>,
    /// Concurrency cap for io-bound tasks.
    pub max_in_flight: Option<usize>,
    /// Dispatcher behavior under substrate saturation.
    pub backpressure: Option<BackpressureMode>,
    /// Whether the structured-log exporter is enabled.
    pub log_exporter: Option<bool>,
    /// Path receiving the JSON-lines report, if any.
    pub output: Option<PathBuf>,
}

impl Options {
    /// Overlays `higher` on `self`, field by field.
    #[must_use]
    pub fn merge(mut self, higher: Options) -> Options {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if higher.$field.is_some() { self.$field = higher.$field; })*
            };
        }
        overlay!(
            mode,
            tps,
            duration,
            ramp_duration,
            steps,
            mean_rate,
            amplitude,
            period,
            base_rate,
            spike_rate,
            spike_interval,
            spike_duration,
            initial_tps,
            ramp_increment,
            ramp_decrement,
            ramp_interval,
            min_tps,
            max_tps,
            sustain_duration,
            error_threshold,
            stable_intervals_required,
            max_search_cycles,
            run_id,
            warmup,
            cooldown,
            report_interval,
            report_immediately,
            percentiles,
            slo_buckets,
            drain_timeout,
            force_timeout,
            max_in_flight,
            backpressure,
            log_exporter,
            output,
        );
        self
    }

    /// Builds a layer from `VAJRAPULSE_*` environment variables.
    ///
    /// `vars` is the raw environment; unrelated variables are ignored, but a
    /// malformed value for a recognized variable is an error.
    pub fn from_env_vars<I>(vars: I) -> Result<Options, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut options = Options::default();
        for (key, value) in vars {
            let Some(name) = key.strip_prefix("VAJRAPULSE_") else {
                continue;
            };
            match name {
                "MODE" => options.mode = Some(value.parse()?),
                "TPS" => options.tps = Some(parse_rate("VAJRAPULSE_TPS", &value)?),
                "DURATION" => {
                    options.duration = Some(parse_flexible("VAJRAPULSE_DURATION", &value)?);
                }
                "RAMP_DURATION" => {
                    options.ramp_duration =
                        Some(parse_flexible("VAJRAPULSE_RAMP_DURATION", &value)?);
                }
                "STEPS" => options.steps = Some(parse_steps(&value)?),
                "MEAN_RATE" => {
                    options.mean_rate = Some(parse_rate("VAJRAPULSE_MEAN_RATE", &value)?);
                }
                "AMPLITUDE" => {
                    options.amplitude = Some(parse_rate("VAJRAPULSE_AMPLITUDE", &value)?);
                }
                "PERIOD" => options.period = Some(parse_flexible("VAJRAPULSE_PERIOD", &value)?),
                "BASE_RATE" => {
                    options.base_rate = Some(parse_rate("VAJRAPULSE_BASE_RATE", &value)?);
                }
                "SPIKE_RATE" => {
                    options.spike_rate = Some(parse_rate("VAJRAPULSE_SPIKE_RATE", &value)?);
                }
                "SPIKE_INTERVAL" => {
                    options.spike_interval =
                        Some(parse_flexible("VAJRAPULSE_SPIKE_INTERVAL", &value)?);
                }
                "SPIKE_DURATION" => {
                    options.spike_duration =
                        Some(parse_flexible("VAJRAPULSE_SPIKE_DURATION", &value)?);
                }
                "INITIAL_TPS" => {
                    options.initial_tps = Some(parse_rate("VAJRAPULSE_INITIAL_TPS", &value)?);
                }
                "RAMP_INCREMENT" => {
                    options.ramp_increment =
                        Some(parse_rate("VAJRAPULSE_RAMP_INCREMENT", &value)?);
                }
                "RAMP_DECREMENT" => {
                    options.ramp_decrement =
                        Some(parse_rate("VAJRAPULSE_RAMP_DECREMENT", &value)?);
                }
                "RAMP_INTERVAL" => {
                    options.ramp_interval =
                        Some(parse_flexible("VAJRAPULSE_RAMP_INTERVAL", &value)?);
                }
                "MIN_TPS" => options.min_tps = Some(parse_rate("VAJRAPULSE_MIN_TPS", &value)?),
                "MAX_TPS" => options.max_tps = Some(value.parse()?),
                "SUSTAIN_DURATION" => {
                    options.sustain_duration =
                        Some(parse_flexible("VAJRAPULSE_SUSTAIN_DURATION", &value)?);
                }
                "ERROR_THRESHOLD" => {
                    options.error_threshold =
                        Some(parse_rate("VAJRAPULSE_ERROR_THRESHOLD", &value)?);
                }
                "BACKPRESSURE" => options.backpressure = Some(value.parse()?),
                "RUN_ID" => options.run_id = Some(value),
                "WARMUP" => options.warmup = Some(parse_flexible("VAJRAPULSE_WARMUP", &value)?),
                "COOLDOWN" => {
                    options.cooldown = Some(parse_flexible("VAJRAPULSE_COOLDOWN", &value)?);
                }
                "REPORT_INTERVAL" => {
                    options.report_interval =
                        Some(parse_flexible("VAJRAPULSE_REPORT_INTERVAL", &value)?);
                }
                _ => {}
            }
        }
        Ok(options)
    }
}

fn parse_rate(option: &'static str, value: &str) -> Result<f64, Error> {
    let parsed: f64 = value.trim().parse().map_err(|_| Error::InvalidOption {
        option,
        details: format!("`{value}` is not a number"),
    })?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(Error::InvalidOption {
            option,
            details: "must be a non-negative number".to_owned(),
        });
    }
    Ok(parsed)
}
