// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Percentile key sets.
//!
//! Keys are kept as thousandths of a quantile (`995` = P99.5) so that the
//! "rounded to three decimals" contract is exact rather than a float
//! comparison. A key set is always sorted, deduplicated, and confined to
//! (0, 1].

use serde::{Deserialize, Serialize};

/// The default percentile keys reported in a snapshot.
pub const DEFAULT_PERCENTILES: &[f64] = &[0.50, 0.75, 0.90, 0.95, 0.99, 0.999];

/// A sanitized, ordered set of percentile keys.
///
/// Construction clips every key to (0, 1], rounds it to three decimals,
/// deduplicates, and sorts. Out-of-range keys are discarded rather than
/// clamped so a nonsensical `1.5` does not masquerade as P100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct PercentileKeys {
    /// Keys as thousandths, sorted ascending, deduplicated, each in 1..=1000.
    thousandths: Vec<u32>,
}

impl PercentileKeys {
    /// Builds a key set from raw quantiles.
    #[must_use]
    pub fn new(raw: &[f64]) -> Self {
        let mut thousandths: Vec<u32> = raw
            .iter()
            .filter(|q| q.is_finite() && **q > 0.0 && **q <= 1.0)
            .map(|q| {
                let t = (q * 1000.0).round() as u32;
                t.clamp(1, 1000)
            })
            .collect();
        thousandths.sort_unstable();
        thousandths.dedup();
        Self { thousandths }
    }

    /// The keys as quantiles in (0, 1], ascending.
    #[must_use]
    pub fn quantiles(&self) -> Vec<f64> {
        self.thousandths.iter().map(|t| f64::from(*t) / 1000.0).collect()
    }

    /// The keys as thousandths of a quantile, ascending.
    #[must_use]
    pub fn thousandths(&self) -> &[u32] {
        &self.thousandths
    }

    /// Number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.thousandths.len()
    }

    /// Whether the set is empty (every raw key was out of range).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thousandths.is_empty()
    }
}

impl Default for PercentileKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PERCENTILES)
    }
}

impl From<Vec<f64>> for PercentileKeys {
    fn from(raw: Vec<f64>) -> Self {
        Self::new(&raw)
    }
}

impl From<PercentileKeys> for Vec<f64> {
    fn from(keys: PercentileKeys) -> Self {
        keys.quantiles()
    }
}
