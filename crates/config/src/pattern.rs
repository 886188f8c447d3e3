// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Declarative load-pattern specifications.
//!
//! A [`PatternSpec`] is the serializable description of a load shape; the
//! engine crate turns it into a live pattern. Keeping the description here
//! lets configuration files, flags, and reports all share one vocabulary.

use crate::adaptive::AdaptiveSettings;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One `rate:duration` segment of a step pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    /// Target rate during the segment, in iterations per second.
    pub tps: f64,
    /// Segment length.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// The load shape of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case", deny_unknown_fields)]
pub enum PatternSpec {
    /// Constant rate for a fixed duration.
    Static {
        /// Target rate in iterations per second.
        tps: f64,
        /// Total duration of the run.
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// Linear ramp from zero to a peak over the whole duration.
    Ramp {
        /// Rate reached at the end of the ramp.
        tps: f64,
        /// Length of the ramp.
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// Linear ramp to a peak, then hold it.
    RampSustain {
        /// Rate reached at the end of the ramp and held afterwards.
        tps: f64,
        /// Length of the ramp portion.
        #[serde(with = "humantime_serde")]
        ramp_duration: Duration,
        /// Length of the hold portion.
        #[serde(with = "humantime_serde")]
        hold_duration: Duration,
    },
    /// A sequence of constant-rate segments.
    Step {
        /// The segments, executed in order.
        steps: Vec<StepSpec>,
    },
    /// A sinusoidal rate around a mean.
    Sine {
        /// Mean rate in iterations per second.
        mean_rate: f64,
        /// Peak deviation from the mean.
        amplitude: f64,
        /// Length of one full oscillation.
        #[serde(with = "humantime_serde")]
        period: Duration,
        /// Total duration of the run.
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// A baseline rate with periodic elevated intervals.
    Spike {
        /// Baseline rate between spikes.
        base_rate: f64,
        /// Rate during a spike.
        spike_rate: f64,
        /// Time from the start of one spike to the start of the next.
        #[serde(with = "humantime_serde")]
        spike_interval: Duration,
        /// Length of each spike.
        #[serde(with = "humantime_serde")]
        spike_duration: Duration,
        /// Total duration of the run.
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// Rate driven by the adaptive feedback controller.
    Adaptive {
        /// Controller settings.
        #[serde(default)]
        adaptive: AdaptiveSettings,
    },
}

impl PatternSpec {
    /// A short lowercase label for reports and metric tags.
    #[must_use]
    pub fn mode_label(&self) -> &'static str {
        match self {
            PatternSpec::Static { .. } => "static",
            PatternSpec::Ramp { .. } => "ramp",
            PatternSpec::RampSustain { .. } => "ramp-sustain",
            PatternSpec::Step { .. } => "step",
            PatternSpec::Sine { .. } => "sine",
            PatternSpec::Spike { .. } => "spike",
            PatternSpec::Adaptive { .. } => "adaptive",
        }
    }

    /// Validates rates and durations for the shape.
    pub fn validate(&self) -> Result<(), Error> {
        let rate_option = |option: &'static str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidOption {
                    option,
                    details: format!("must be a non-negative number, got {value}"),
                })
            }
        };
        match self {
            PatternSpec::Static { tps, duration } => {
                rate_option("--tps", *tps)?;
                require_positive("--duration", *duration)
            }
            PatternSpec::Ramp { tps, duration } => {
                rate_option("--tps", *tps)?;
                require_positive("--ramp-duration", *duration)
            }
            PatternSpec::RampSustain { tps, ramp_duration, hold_duration } => {
                rate_option("--tps", *tps)?;
                require_positive("--ramp-duration", *ramp_duration)?;
                require_positive("--duration", *hold_duration)
            }
            PatternSpec::Step { steps } => {
                if steps.is_empty() {
                    return Err(Error::InvalidOption {
                        option: "--steps",
                        details: "at least one rate:duration segment is required".to_owned(),
                    });
                }
                for step in steps {
                    rate_option("--steps", step.tps)?;
                    require_positive("--steps", step.duration)?;
                }
                Ok(())
            }
            PatternSpec::Sine { mean_rate, amplitude, period, duration } => {
                rate_option("--mean-rate", *mean_rate)?;
                rate_option("--amplitude", *amplitude)?;
                require_positive("--period", *period)?;
                require_positive("--duration", *duration)
            }
            PatternSpec::Spike {
                base_rate,
                spike_rate,
                spike_interval,
                spike_duration,
                duration,
            } => {
                rate_option("--base-rate", *base_rate)?;
                rate_option("--spike-rate", *spike_rate)?;
                require_positive("--spike-interval", *spike_interval)?;
                require_positive("--spike-duration", *spike_duration)?;
                if spike_duration > spike_interval {
                    return Err(Error::InvalidOption {
                        option: "--spike-duration",
                        details: "must not exceed --spike-interval".to_owned(),
                    });
                }
                require_positive("--duration", *duration)
            }
            PatternSpec::Adaptive { adaptive } => adaptive.validate(),
        }
    }
}

fn require_positive(option: &'static str, duration: Duration) -> Result<(), Error> {
    if duration.is_zero() {
        Err(Error::InvalidOption { option, details: "duration must be positive".to_owned() })
    } else {
        Ok(())
    }
}

/// Parses a `rate:duration,rate:duration,...` step list.
pub fn parse_steps(input: &str) -> Result<Vec<StepSpec>, Error> {
    let mut steps = Vec::new();
    for segment in input.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (rate_text, duration_text) =
            segment.split_once(':').ok_or_else(|| Error::InvalidSteps {
                segment: segment.to_owned(),
                details: "expected rate:duration".to_owned(),
            })?;
        let tps: f64 = rate_text.trim().parse().map_err(|_| Error::InvalidSteps {
            segment: segment.to_owned(),
            details: format!("`{rate_text}` is not a number"),
        })?;
        let duration = crate::duration::parse_flexible("--steps", duration_text.trim())
            .map_err(|e| Error::InvalidSteps {
                segment: segment.to_owned(),
                details: e.to_string(),
            })?;
        steps.push(StepSpec { tps, duration });
    }
    if steps.is_empty() {
        return Err(Error::InvalidSteps {
            segment: input.to_owned(),
            details: "no segments found".to_owned(),
        });
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn steps_parse_rates_and_durations() {
        let steps = parse_steps("100:30s, 250:1m,0:500ms").expect("parse");
        assert_eq!(
            steps,
            vec![
                StepSpec { tps: 100.0, duration: Duration::from_secs(30) },
                StepSpec { tps: 250.0, duration: Duration::from_secs(60) },
                StepSpec { tps: 0.0, duration: Duration::from_millis(500) },
            ]
        );
    }

    #[test]
    fn malformed_step_rejected() {
        assert!(parse_steps("100").is_err());
        assert!(parse_steps("abc:10s").is_err());
        assert!(parse_steps("").is_err());
    }

    #[test]
    fn spike_longer_than_interval_rejected() {
        let spec = PatternSpec::Spike {
            base_rate: 10.0,
            spike_rate: 100.0,
            spike_interval: Duration::from_secs(1),
            spike_duration: Duration::from_secs(2),
            duration: Duration::from_secs(10),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn spec_round_trips_through_yaml() {
        let spec = PatternSpec::Sine {
            mean_rate: 50.0,
            amplitude: 20.0,
            period: Duration::from_secs(30),
            duration: Duration::from_secs(300),
        };
        let yaml = serde_yaml::to_string(&spec).expect("serialize");
        let back: PatternSpec = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(spec, back);
    }
}
