use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Result, SteplineError};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| SteplineError::Parse(format!("invalid duration {input}: {e}")))
}

/// Unix nanoseconds to fractional seconds.
pub fn nanos_to_secs(nanos: u64) -> f64 {
    nanos as f64 / NANOS_PER_SEC
}

/// Unix nanoseconds to whole seconds, rounding half up.
pub fn nanos_to_rounded_secs(nanos: u64) -> i64 {
    nanos_to_secs(nanos).round() as i64
}

/// Nanosecond duration to seconds rounded to two decimal places.
pub fn nanos_to_centisecs(nanos: u64) -> f64 {
    (nanos as f64 / 10_000_000.0).round() / 100.0
}

pub fn millis_to_secs(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Returns `(start, end)` Unix seconds for a window ending at `now`.
pub fn window_bounds(now: DateTime<Utc>, lookback: Duration) -> Result<(i64, i64)> {
    let end = now.timestamp();
    let lookback = i64::try_from(lookback.as_secs())
        .map_err(|_| SteplineError::InvalidArgument(format!("lookback too large: {lookback:?}")))?;
    Ok((end.saturating_sub(lookback), end))
}
