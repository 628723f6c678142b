pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{
    Directive, MetricDiff, RankBounds, RankLabel, RateUnit, Scope, ScopeSelector, SortMetric,
};
pub use error::CoreError;
pub use structs::{EntityCounts, EntityId, RankedEntry, Rate, SnapshotMeta, TableRow, TimeRange};
