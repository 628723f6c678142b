use crate::error::CoreError;
use crate::structs::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A partition of the metric history.
///
/// Every capture belongs to exactly one epoch (canvas) and carries both an
/// all-time count and an epoch count per entity, so the scope decides which of
/// the two columns a table is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum Scope {
    AllTime,
    Epoch(String),
}

impl Scope {
    /// Returns the epoch code when the scope is bounded to one epoch.
    pub fn epoch_code(&self) -> Option<&str> {
        match self {
            Scope::AllTime => None,
            Scope::Epoch(code) => Some(code.as_str()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::AllTime => write!(f, "all-time"),
            Scope::Epoch(code) => write!(f, "epoch {}", code),
        }
    }
}

/// The scope a caller asks for, before it is pinned to a concrete epoch code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeSelector {
    AllTime,
    /// The epoch of the most recent snapshot at the requested instant.
    CurrentEpoch,
    Epoch(String),
}

impl ScopeSelector {
    /// Pins the selector to a concrete scope, using `current_epoch` for `CurrentEpoch`.
    pub fn resolve(&self, current_epoch: &str) -> Scope {
        match self {
            ScopeSelector::AllTime => Scope::AllTime,
            ScopeSelector::CurrentEpoch => Scope::Epoch(current_epoch.to_string()),
            ScopeSelector::Epoch(code) => Scope::Epoch(code.clone()),
        }
    }
}

/// The quantity a leaderboard is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMetric {
    /// The cumulative count at the upper boundary.
    Count,
    /// The count gained between the two boundaries. Always carries a rate.
    Delta,
}

impl SortMetric {
    pub fn wants_rate(&self) -> bool {
        matches!(self, SortMetric::Delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    PerHour,
    PerDay,
}

impl RateUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            RateUnit::PerHour => "px/h",
            RateUnit::PerDay => "px/d",
        }
    }
}

/// How a numeric rank is shown at the presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RankLabel {
    Numeric(u32),
    /// The rank is above the ceiling; carries the ceiling itself.
    Overflow(u32),
    /// The entity has no activity in the scope, so a rank is meaningless.
    NotApplicable,
}

impl RankLabel {
    pub fn from_rank(rank: u32, ceiling: u32) -> Self {
        if rank > ceiling {
            RankLabel::Overflow(ceiling)
        } else {
            RankLabel::Numeric(rank)
        }
    }
}

impl fmt::Display for RankLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankLabel::Numeric(rank) => write!(f, "{}", rank),
            RankLabel::Overflow(ceiling) => write!(f, ">{}", ceiling),
            RankLabel::NotApplicable => write!(f, "N/A"),
        }
    }
}

/// Difference between the target entity's metric and a row's metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricDiff {
    Exact(i64),
    /// One of the two metrics is unknown.
    Unknown,
}

impl MetricDiff {
    pub fn between(target: Option<i64>, row: Option<i64>) -> Self {
        match (target, row) {
            (Some(t), Some(r)) => MetricDiff::Exact(t - r),
            _ => MetricDiff::Unknown,
        }
    }
}

/// Which slice of the ranked list a caller wants back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    TopN(usize),
    /// 1-based, inclusive on both ends.
    RankRange { low: usize, high: usize },
    CenteredOn { entity_id: EntityId, lines: usize },
}

/// A `low-high` rank range as typed by a user, e.g. `"5-10"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankBounds {
    pub low: usize,
    pub high: usize,
}

impl FromStr for RankBounds {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidInput("ranks".to_string(), s.to_string());
        let (low, high) = s.trim().split_once('-').ok_or_else(invalid)?;
        let low: usize = low.trim().parse().map_err(|_| invalid())?;
        let high: usize = high.trim().parse().map_err(|_| invalid())?;
        if low == 0 || low > high {
            return Err(invalid());
        }
        Ok(Self { low, high })
    }
}

impl From<RankBounds> for Directive {
    fn from(bounds: RankBounds) -> Self {
        Directive::RankRange {
            low: bounds.low,
            high: bounds.high,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_label_switches_to_overflow_above_ceiling() {
        assert_eq!(RankLabel::from_rank(1000, 1000), RankLabel::Numeric(1000));
        assert_eq!(RankLabel::from_rank(1001, 1000), RankLabel::Overflow(1000));
        assert_eq!(RankLabel::Overflow(1000).to_string(), ">1000");
        assert_eq!(RankLabel::NotApplicable.to_string(), "N/A");
    }

    #[test]
    fn metric_diff_is_unknown_when_either_side_is_missing() {
        assert_eq!(MetricDiff::between(Some(50), Some(80)), MetricDiff::Exact(-30));
        assert_eq!(MetricDiff::between(None, Some(80)), MetricDiff::Unknown);
        assert_eq!(MetricDiff::between(Some(50), None), MetricDiff::Unknown);
    }

    #[test]
    fn parses_rank_bounds() {
        let bounds: RankBounds = "5-10".parse().unwrap();
        assert_eq!(bounds, RankBounds { low: 5, high: 10 });
        assert!("10-5".parse::<RankBounds>().is_err());
        assert!("0-5".parse::<RankBounds>().is_err());
        assert!("five-ten".parse::<RankBounds>().is_err());
    }

    #[test]
    fn current_epoch_selector_pins_to_given_code() {
        assert_eq!(
            ScopeSelector::CurrentEpoch.resolve("c42"),
            Scope::Epoch("c42".to_string())
        );
        assert_eq!(ScopeSelector::AllTime.resolve("c42"), Scope::AllTime);
    }
}
