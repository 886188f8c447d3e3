// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Flexible duration parsing for flags and environment variables.
//!
//! Accepts `humantime` syntax (`500ms`, `30s`, `2m`, `1h`) as well as a bare
//! number, which is interpreted as seconds.

use crate::error::Error;
use std::time::Duration;

/// Parses a duration argument, treating a bare number as seconds.
///
/// `option` is the flag name used in the error message.
pub fn parse_flexible(option: &'static str, value: &str) -> Result<Duration, Error> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<f64>() {
        if !secs.is_finite() || secs < 0.0 {
            return Err(Error::InvalidDuration {
                option,
                value: value.to_owned(),
                details: "must be a non-negative number of seconds".to_owned(),
            });
        }
        return Ok(Duration::from_secs_f64(secs));
    }
    humantime::parse_duration(trimmed).map_err(|e| Error::InvalidDuration {
        option,
        value: value.to_owned(),
        details: e.to_string(),
    })
}
