// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Settings for the adaptive load controller.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The configured ceiling of the adaptive search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MaxRateRepr", into = "MaxRateRepr")]
pub enum MaxRate {
    /// A finite ceiling in iterations per second.
    Finite(f64),
    /// No configured ceiling; the controller clamps against a safety
    /// ceiling derived from the substrate capacity instead.
    Unlimited,
}

impl MaxRate {
    /// The finite ceiling, if one is configured.
    #[must_use]
    pub fn finite(&self) -> Option<f64> {
        match self {
            MaxRate::Finite(v) => Some(*v),
            MaxRate::Unlimited => None,
        }
    }
}

impl fmt::Display for MaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxRate::Finite(v) => write!(f, "{v}"),
            MaxRate::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl FromStr for MaxRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(MaxRate::Unlimited);
        }
        let value: f64 = trimmed.parse().map_err(|_| Error::InvalidOption {
            option: "--max-tps",
            details: format!("expected a number or `unlimited`, got `{s}`"),
        })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::InvalidOption {
                option: "--max-tps",
                details: "must be a positive number".to_owned(),
            });
        }
        Ok(MaxRate::Finite(value))
    }
}

/// Serde surface for [`MaxRate`]: either a number or the string `unlimited`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MaxRateRepr {
    /// Numeric ceiling.
    Number(f64),
    /// The literal `unlimited`.
    Text(String),
}

impl TryFrom<MaxRateRepr> for MaxRate {
    type Error = Error;

    fn try_from(repr: MaxRateRepr) -> Result<Self, Self::Error> {
        match repr {
            MaxRateRepr::Number(v) => MaxRate::from_str(&v.to_string()),
            MaxRateRepr::Text(s) => MaxRate::from_str(&s),
        }
    }
}

impl From<MaxRate> for MaxRateRepr {
    fn from(rate: MaxRate) -> Self {
        match rate {
            MaxRate::Finite(v) => MaxRateRepr::Number(v),
            MaxRate::Unlimited => MaxRateRepr::Text("unlimited".to_owned()),
        }
    }
}

/// Immutable settings of the adaptive load controller.
///
/// Invariants, enforced by [`AdaptiveSettings::validate`]:
/// `min_tps <= initial_tps <= max_tps`, positive increments/decrements,
/// positive ramp interval and sustain duration, threshold in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AdaptiveSettings {
    /// Rate the search starts from, in iterations per second.
    pub initial_tps: f64,
    /// Rate added on each stable ramp-up interval.
    pub ramp_increment: f64,
    /// Rate removed on each ramp-down interval.
    pub ramp_decrement: f64,
    /// How often the controller samples metrics and advances its phase.
    #[serde(with = "humantime_serde")]
    pub ramp_interval: Duration,
    /// Lower clamp of the search.
    pub min_tps: f64,
    /// Upper clamp of the search.
    pub max_tps: MaxRate,
    /// How long the stable rate is held in the sustain phase.
    #[serde(with = "humantime_serde")]
    pub sustain_duration: Duration,
    /// Consecutive below-threshold intervals required to call a rate stable.
    pub stable_intervals_required: u32,
    /// Failure ratio at or above which the current rate is considered
    /// saturated.
    pub error_threshold: f64,
    /// Full ramp-up/ramp-down rounds allowed before the search gives up and
    /// reports `Complete`.
    pub max_search_cycles: u32,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            initial_tps: 10.0,
            ramp_increment: 10.0,
            ramp_decrement: 10.0,
            ramp_interval: Duration::from_secs(10),
            min_tps: 1.0,
            max_tps: MaxRate::Finite(1000.0),
            sustain_duration: Duration::from_secs(60),
            stable_intervals_required: 3,
            error_threshold: 0.05,
            max_search_cycles: 3,
        }
    }
}

impl AdaptiveSettings {
    /// Checks every invariant, returning the first violation.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |details: String| Err(Error::InvalidAdaptive { details });
        if !(self.min_tps > 0.0 && self.min_tps.is_finite()) {
            return invalid(format!("min_tps must be positive, got {}", self.min_tps));
        }
        if self.initial_tps < self.min_tps {
            return invalid(format!(
                "initial_tps ({}) must be at least min_tps ({})",
                self.initial_tps, self.min_tps
            ));
        }
        if let Some(max) = self.max_tps.finite() {
            if self.initial_tps > max {
                return invalid(format!(
                    "initial_tps ({}) must not exceed max_tps ({max})",
                    self.initial_tps
                ));
            }
            if max < self.min_tps {
                return invalid(format!(
                    "max_tps ({max}) must be at least min_tps ({})",
                    self.min_tps
                ));
            }
        }
        if !(self.ramp_increment > 0.0) {
            return invalid("ramp_increment must be positive".to_owned());
        }
        if !(self.ramp_decrement > 0.0) {
            return invalid("ramp_decrement must be positive".to_owned());
        }
        if self.ramp_interval.is_zero() {
            return invalid("ramp_interval must be positive".to_owned());
        }
        if self.sustain_duration.is_zero() {
            return invalid("sustain_duration must be positive".to_owned());
        }
        if self.stable_intervals_required == 0 {
            return invalid("stable_intervals_required must be at least 1".to_owned());
        }
        if !(0.0..=1.0).contains(&self.error_threshold) {
            return invalid(format!(
                "error_threshold must be within [0, 1], got {}",
                self.error_threshold
            ));
        }
        if self.max_search_cycles == 0 {
            return invalid("max_search_cycles must be at least 1".to_owned());
        }
        Ok(())
    }
}
