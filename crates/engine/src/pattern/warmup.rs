// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Warmup/cooldown wrapping.

use super::LoadPattern;
use std::time::Duration;

/// Wraps a pattern, suppressing metric recording during a warmup window at
/// the start and a cooldown window at the end.
///
/// The wrapped pattern keeps its rate over its whole duration — the load
/// itself is unchanged; only recording is confined to the steady window
/// `[warmup, total - cooldown)`. For an unbounded inner pattern the steady
/// window has no upper edge.
pub struct WarmupCooldown {
    inner: Box<dyn LoadPattern>,
    warmup: Duration,
    cooldown: Duration,
}

impl WarmupCooldown {
    /// Wraps `inner` with the given margins. Zero margins are allowed and
    /// make the wrapper transparent.
    #[must_use]
    pub fn new(inner: Box<dyn LoadPattern>, warmup: Duration, cooldown: Duration) -> Self {
        Self { inner, warmup, cooldown }
    }
}

impl LoadPattern for WarmupCooldown {
    fn target_rate(&self, elapsed: Duration) -> f64 {
        self.inner.target_rate(elapsed)
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn records_at(&self, elapsed: Duration) -> bool {
        if elapsed < self.warmup {
            return false;
        }
        match self.inner.total_duration() {
            Some(total) => elapsed < total.saturating_sub(self.cooldown),
            None => true,
        }
    }

    fn completed(&self) -> bool {
        self.inner.completed()
    }

    fn label(&self) -> &'static str {
        "warmup-cooldown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::StaticRate;

    #[test]
    fn steady_window_excludes_margins() {
        let inner = Box::new(StaticRate::new(100.0, Duration::from_secs(1)));
        let wrapped = WarmupCooldown::new(
            inner,
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        // The rate is untouched.
        assert_eq!(wrapped.target_rate(Duration::from_millis(100)), 100.0);
        assert_eq!(wrapped.total_duration(), Some(Duration::from_secs(1)));

        assert!(!wrapped.records_at(Duration::from_millis(100)));
        assert!(wrapped.records_at(Duration::from_millis(200)));
        assert!(wrapped.records_at(Duration::from_millis(799)));
        assert!(!wrapped.records_at(Duration::from_millis(800)));

        // Steady window covers 60% of the run.
        let recorded = (0..1_000)
            .filter(|ms| wrapped.records_at(Duration::from_millis(*ms)))
            .count();
        assert_eq!(recorded, 600);
    }

    #[test]
    fn unbounded_inner_has_open_steady_window() {
        struct Unbounded;
        impl LoadPattern for Unbounded {
            fn target_rate(&self, _: Duration) -> f64 {
                5.0
            }
            fn total_duration(&self) -> Option<Duration> {
                None
            }
            fn label(&self) -> &'static str {
                "unbounded"
            }
        }

        let wrapped = WarmupCooldown::new(
            Box::new(Unbounded),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        assert!(!wrapped.records_at(Duration::from_millis(50)));
        assert!(wrapped.records_at(Duration::from_secs(3_600)));
    }
}
