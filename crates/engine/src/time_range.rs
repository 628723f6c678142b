use crate::error::EngineError;
use crate::util::floor_to_granularity;
use chrono::{DateTime, Duration, Utc};
use core_types::TimeRange;
use once_cell::sync::Lazy;
use regex::Regex;

/// Units of the relative grammar, in the order they must appear.
/// Years and months are fixed-length approximations (365 and 30 days).
const UNIT_SECONDS: [i64; 7] = [
    365 * 24 * 3600, // y
    30 * 24 * 3600,  // mo
    7 * 24 * 3600,   // w
    24 * 3600,       // d
    3600,            // h
    60,              // m
    1,               // s
];

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:last\s*)?(?:(\d+)\s*y\s*)?(?:(\d+)\s*mo\s*)?(?:(\d+)\s*w\s*)?(?:(\d+)\s*d\s*)?(?:(\d+)\s*h\s*)?(?:(\d+)\s*m\s*)?(?:(\d+)\s*s\s*)?$",
    )
    .expect("relative duration regex")
});

/// What the caller said about time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    /// No time given: the leaderboard as of now.
    Now,
    /// A span measured backwards from now, e.g. `"1d12h"`.
    Relative(String),
    /// Explicit bounds. A missing `after` means the start of the Unix epoch,
    /// a missing `before` means now.
    Absolute {
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    },
}

impl TimeSpec {
    /// Whether the caller asked for an explicit time window.
    pub fn is_window(&self) -> bool {
        !matches!(self, TimeSpec::Now)
    }
}

/// Parses `?y?mo?w?d?h?m?s` into a duration.
///
/// Components must appear in that order, each at most once, and at least one
/// must be present. Whitespace between components and a leading `last` are
/// tolerated.
pub fn parse_duration(text: &str) -> Result<Duration, EngineError> {
    let invalid = || EngineError::InvalidDurationFormat(text.to_string());
    let normalized = text.trim().to_lowercase();
    let captures = RELATIVE_RE.captures(&normalized).ok_or_else(invalid)?;

    let mut total: i64 = 0;
    let mut seen_any = false;
    for (group, unit) in UNIT_SECONDS.iter().enumerate() {
        let Some(amount) = captures.get(group + 1) else {
            continue;
        };
        seen_any = true;
        let amount: i64 = amount.as_str().parse().map_err(|_| invalid())?;
        total = amount
            .checked_mul(*unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
    }
    if !seen_any {
        return Err(invalid());
    }
    Duration::try_seconds(total).ok_or_else(invalid)
}

/// Turns a `TimeSpec` into two concrete instants.
///
/// Relative spans get one extra `granularity` and have their lower bound floored
/// to it, so the window always reaches back to a capture at or before
/// `now - span`. Absolute bounds are used as given.
pub fn resolve(
    spec: &TimeSpec,
    now: DateTime<Utc>,
    granularity: Duration,
) -> Result<TimeRange, EngineError> {
    match spec {
        TimeSpec::Now => Ok(TimeRange::instant(now)),
        TimeSpec::Relative(text) => {
            let span = parse_duration(text)?;
            let from = span
                .checked_add(&granularity)
                .and_then(|lookback| now.checked_sub_signed(lookback))
                .ok_or_else(|| EngineError::InvalidDurationFormat(text.clone()))?;
            let from = floor_to_granularity(from, granularity);
            tracing::debug!(%text, %from, to = %now, "Resolved relative time range.");
            Ok(TimeRange { from, to: now })
        }
        TimeSpec::Absolute { after, before } => {
            let from = after.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            let to = before.unwrap_or(now);
            TimeRange::new(from, to).map_err(|_| EngineError::InvalidTimeRange { from, to })
        }
    }
}
