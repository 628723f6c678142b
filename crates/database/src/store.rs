use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{EntityCounts, EntityId, Scope, SnapshotMeta, TableRow};

/// The read contract of the external time-series store.
///
/// Snapshots are immutable once written, so every method is a plain read and
/// implementations may be shared freely between concurrent requests.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The most recent capture, regardless of scope.
    async fn latest_snapshot(&self) -> Result<Option<SnapshotMeta>, DbError>;

    /// The latest capture taken at or before `instant`. For an epoch scope only
    /// captures of that epoch are considered.
    async fn nearest_snapshot_at_or_before(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError>;

    /// The first capture taken at or after `instant` within `scope`.
    async fn earliest_snapshot_at_or_after(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError>;

    /// The full table of a capture read in `scope`, ordered by metric
    /// descending (unknown values last) and then by the source's own order.
    async fn ranked_table(&self, snapshot_id: i64, scope: &Scope)
        -> Result<Vec<TableRow>, DbError>;

    /// Looks up the entity currently known under `display_name`.
    async fn resolve_display_name(&self, display_name: &str)
        -> Result<Option<EntityId>, DbError>;

    /// Both counters of one entity in one capture, if the entity was listed.
    async fn entity_counts(
        &self,
        snapshot_id: i64,
        entity_id: EntityId,
    ) -> Result<Option<EntityCounts>, DbError>;
}
