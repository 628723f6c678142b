use crate::enums::{MetricDiff, RankLabel, RateUnit};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Internal identifier of a canvas participant.
pub type EntityId = i64;

/// Identity of one periodic capture. The captured values live in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub snapshot_id: i64,
    pub captured_at: DateTime<Utc>,
    /// The epoch (canvas code) that was live when the capture was taken.
    pub epoch: String,
}

/// One row of a snapshot's table, read in a single scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub entity_id: EntityId,
    pub display_name: String,
    /// `None` when the entity was not observed in the scope.
    pub metric_value: Option<i64>,
}

/// Both counters of a single entity inside one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub alltime: Option<i64>,
    pub epoch: Option<i64>,
}

/// The metric delta over an interval, normalised to a time unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rate {
    pub value: Decimal,
    pub unit: RateUnit,
}

/// A single line of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    /// 1-based position in the full ranked list. Never capped.
    pub rank: u32,
    pub entity_id: EntityId,
    pub display_name: String,
    pub metric_value: Option<i64>,
    pub rate: Option<Rate>,
    pub diff_from_target: Option<MetricDiff>,
}

impl RankedEntry {
    pub fn new(rank: u32, row: TableRow) -> Self {
        Self {
            rank,
            entity_id: row.entity_id,
            display_name: row.display_name,
            metric_value: row.metric_value,
            rate: None,
            diff_from_target: None,
        }
    }

    /// The rank as it should be presented, given the configured ceiling.
    pub fn rank_label(&self, ceiling: u32) -> RankLabel {
        RankLabel::from_rank(self.rank, ceiling)
    }
}

/// A closed interval of time. `from == to` describes a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, CoreError> {
        if from > to {
            return Err(CoreError::InvertedRange(format!("{} is after {}", from, to)));
        }
        Ok(Self { from, to })
    }

    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { from: at, to: at }
    }

    pub fn is_instant(&self) -> bool {
        self.from == self.to
    }
}
