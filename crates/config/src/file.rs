// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration-file loading.
//!
//! The file is a mapping with the same names as the command-line flags plus
//! nested blocks for percentiles, SLO buckets, exporters, and the adaptive
//! controller. YAML and JSON are supported, chosen by extension. All keys
//! are optional; unknown keys are rejected.

use crate::adaptive::{AdaptiveSettings, MaxRate};
use crate::error::Error;
use crate::options::{BackpressureMode, LoadMode, Options};
use crate::pattern::StepSpec;
use crate::percentiles::PercentileKeys;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Exporter endpoints configured in the file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExportersConfig {
    /// Whether the structured-log exporter is enabled.
    pub log: Option<bool>,
    /// Path receiving the JSON-lines report.
    pub json_path: Option<PathBuf>,
}

/// The on-disk configuration schema.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    /// Load mode, as spelled for `--mode`.
    pub mode: Option<String>,
    /// Base rate for static/ramp/ramp-sustain modes.
    pub tps: Option<f64>,
    /// Total or hold duration.
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// Ramp length.
    #[serde(with = "humantime_serde")]
    pub ramp_duration: Option<Duration>,
    /// Step segments.
    pub steps: Option<Vec<StepSpec>>,
    /// Sine mean rate.
    pub mean_rate: Option<f64>,
    /// Sine amplitude.
    pub amplitude: Option<f64>,
    /// Sine period.
    #[serde(with = "humantime_serde")]
    pub period: Option<Duration>,
    /// Spike baseline rate.
    pub base_rate: Option<f64>,
    /// Spike elevated rate.
    pub spike_rate: Option<f64>,
    /// Spike spacing.
    #[serde(with = "humantime_serde")]
    pub spike_interval: Option<Duration>,
    /// Spike length.
    #[serde(with = "humantime_serde")]
    pub spike_duration: Option<Duration>,

    /// Run identifier tag.
    pub run_id: Option<String>,
    /// Warmup window with suppressed recording.
    #[serde(with = "humantime_serde")]
    pub warmup: Option<Duration>,
    /// Cooldown window with suppressed recording.
    #[serde(with = "humantime_serde")]
    pub cooldown: Option<Duration>,
    /// Periodic report interval.
    #[serde(with = "humantime_serde")]
    pub report_interval: Option<Duration>,
    /// Whether the first periodic report fires immediately.
    pub report_immediately: Option<bool>,
    /// Graceful-drain timeout on shutdown.
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Option<Duration>,
    /// Forced-cancellation timeout after the drain expires.
    #[serde(with = "humantime_serde")]
    pub force_timeout: Option<Duration>,
    /// Concurrency cap for io-bound tasks.
    pub max_in_flight: Option<usize>,
    /// Dispatcher behavior under saturation: queue|reject|drop.
    pub backpressure: Option<String>,

    /// Percentile keys for snapshots.
    pub percentiles: Option<Vec<f64>>,
    /// Latency bounds for SLO attainment reporting.
    #[serde(default, deserialize_with = "slo_buckets::deserialize")]
    pub slo_buckets: Option<Vec<Duration>>,
    /// Exporter endpoints.
    pub exporters: Option<ExportersConfig>,
    /// Adaptive controller settings.
    pub adaptive: Option<AdaptiveSettings>,
}

/// `Vec<Duration>` in humantime syntax, wrapped in `Option`.
mod slo_buckets {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<Vec<Duration>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
        raw.map(|entries| {
            entries
                .iter()
                .map(|text| humantime::parse_duration(text).map_err(serde::de::Error::custom))
                .collect()
        })
        .transpose()
    }
}

impl FileConfig {
    /// Loads and parses the file at `path`, dispatching on its extension.
    pub fn load(path: &Path) -> Result<FileConfig, Error> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            path: display.clone(),
            details: e.to_string(),
        })?;
        let extension =
            path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&text).map_err(|e| Error::DeserializationError {
                    path: display,
                    format: "YAML",
                    details: e.to_string(),
                })
            }
            Some("json") => {
                serde_json::from_str(&text).map_err(|e| Error::DeserializationError {
                    path: display,
                    format: "JSON",
                    details: e.to_string(),
                })
            }
            _ => Err(Error::UnsupportedFormat { path: display }),
        }
    }

    /// Converts the file layer into mergeable [`Options`].
    pub fn into_options(self) -> Result<Options, Error> {
        let mode = self.mode.as_deref().map(LoadMode::from_str).transpose()?;
        let backpressure =
            self.backpressure.as_deref().map(BackpressureMode::from_str).transpose()?;
        let max_tps = self.adaptive.as_ref().map(|a| a.max_tps);
        let adaptive = self.adaptive;
        let exporters = self.exporters.unwrap_or_default();
        Ok(Options {
            mode,
            tps: self.tps,
            duration: self.duration,
            ramp_duration: self.ramp_duration,
            steps: self.steps,
            mean_rate: self.mean_rate,
            amplitude: self.amplitude,
            period: self.period,
            base_rate: self.base_rate,
            spike_rate: self.spike_rate,
            spike_interval: self.spike_interval,
            spike_duration: self.spike_duration,
            initial_tps: adaptive.as_ref().map(|a| a.initial_tps),
            ramp_increment: adaptive.as_ref().map(|a| a.ramp_increment),
            ramp_decrement: adaptive.as_ref().map(|a| a.ramp_decrement),
            ramp_interval: adaptive.as_ref().map(|a| a.ramp_interval),
            min_tps: adaptive.as_ref().map(|a| a.min_tps),
            max_tps,
            sustain_duration: adaptive.as_ref().map(|a| a.sustain_duration),
            error_threshold: adaptive.as_ref().map(|a| a.error_threshold),
            stable_intervals_required: adaptive.as_ref().map(|a| a.stable_intervals_required),
            max_search_cycles: adaptive.as_ref().map(|a| a.max_search_cycles),
            run_id: self.run_id,
            warmup: self.warmup,
            cooldown: self.cooldown,
            report_interval: self.report_interval,
            report_immediately: self.report_immediately,
            percentiles: self.percentiles.map(|raw| PercentileKeys::new(&raw)),
            slo_buckets: self.slo_buckets,
            drain_timeout: self.drain_timeout,
            force_timeout: self.force_timeout,
            max_in_flight: self.max_in_flight,
            backpressure,
            log_exporter: exporters.log,
            output: exporters.json_path,
        })
    }

    /// Whether the configured max rate is unlimited, if set at all.
    #[must_use]
    pub fn max_rate(&self) -> Option<MaxRate> {
        self.adaptive.as_ref().map(|a| a.max_tps)
    }
}
