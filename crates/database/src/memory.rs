use crate::store::SnapshotStore;
use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{EntityCounts, EntityId, Scope, SnapshotMeta, TableRow};
use std::cmp::Ordering;
use std::collections::HashMap;

/// The counters recorded for one entity in one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedCounts {
    pub entity_id: EntityId,
    pub alltime: Option<i64>,
    pub epoch: Option<i64>,
}

impl CapturedCounts {
    pub fn new(entity_id: EntityId, alltime: Option<i64>, epoch: Option<i64>) -> Self {
        Self {
            entity_id,
            alltime,
            epoch,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredSnapshot {
    meta: SnapshotMeta,
    // Listing order of the source, used to settle ties.
    rows: Vec<CapturedCounts>,
}

/// A `SnapshotStore` held entirely in memory.
///
/// It is filled up front and then shared read-only, mirroring the
/// write-once nature of the real store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    names: HashMap<EntityId, String>,
    // Sorted by `captured_at`, insertion order among equal instants.
    snapshots: Vec<StoredSnapshot>,
    next_id: i64,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity(&mut self, entity_id: EntityId, display_name: &str) -> &mut Self {
        self.names.insert(entity_id, display_name.to_string());
        self
    }

    /// Records a capture and returns its identity.
    pub fn push_snapshot(
        &mut self,
        captured_at: DateTime<Utc>,
        epoch: &str,
        rows: impl IntoIterator<Item = CapturedCounts>,
    ) -> SnapshotMeta {
        self.next_id += 1;
        let meta = SnapshotMeta {
            snapshot_id: self.next_id,
            captured_at,
            epoch: epoch.to_string(),
        };
        let position = self
            .snapshots
            .partition_point(|s| s.meta.captured_at <= captured_at);
        self.snapshots.insert(
            position,
            StoredSnapshot {
                meta: meta.clone(),
                rows: rows.into_iter().collect(),
            },
        );
        meta
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn in_scope<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a StoredSnapshot> + 'a {
        self.snapshots
            .iter()
            .filter(move |s| scope.epoch_code().is_none_or(|code| s.meta.epoch == code))
    }

    fn find(&self, snapshot_id: i64) -> Result<&StoredSnapshot, DbError> {
        self.snapshots
            .iter()
            .find(|s| s.meta.snapshot_id == snapshot_id)
            .ok_or(DbError::UnknownSnapshot(snapshot_id))
    }

    fn display_name(&self, entity_id: EntityId) -> String {
        self.names
            .get(&entity_id)
            .cloned()
            .unwrap_or_else(|| entity_id.to_string())
    }
}

/// Descending by value with unknown values last.
fn metric_desc(a: &Option<i64>, b: &Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn latest_snapshot(&self) -> Result<Option<SnapshotMeta>, DbError> {
        Ok(self.snapshots.last().map(|s| s.meta.clone()))
    }

    async fn nearest_snapshot_at_or_before(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError> {
        Ok(self
            .in_scope(scope)
            .filter(|s| s.meta.captured_at <= instant)
            .last()
            .map(|s| s.meta.clone()))
    }

    async fn earliest_snapshot_at_or_after(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError> {
        Ok(self
            .in_scope(scope)
            .find(|s| s.meta.captured_at >= instant)
            .map(|s| s.meta.clone()))
    }

    async fn ranked_table(
        &self,
        snapshot_id: i64,
        scope: &Scope,
    ) -> Result<Vec<TableRow>, DbError> {
        let snapshot = self.find(snapshot_id)?;
        let mut rows: Vec<TableRow> = snapshot
            .rows
            .iter()
            .map(|counts| TableRow {
                entity_id: counts.entity_id,
                display_name: self.display_name(counts.entity_id),
                metric_value: match scope {
                    Scope::AllTime => counts.alltime,
                    Scope::Epoch(_) => counts.epoch,
                },
            })
            .collect();
        // `sort_by` is stable, so listing order survives among equal values.
        rows.sort_by(|a, b| metric_desc(&a.metric_value, &b.metric_value));
        Ok(rows)
    }

    async fn resolve_display_name(
        &self,
        display_name: &str,
    ) -> Result<Option<EntityId>, DbError> {
        Ok(self
            .names
            .iter()
            .find(|(_, name)| name.as_str() == display_name)
            .map(|(id, _)| *id))
    }

    async fn entity_counts(
        &self,
        snapshot_id: i64,
        entity_id: EntityId,
    ) -> Result<Option<EntityCounts>, DbError> {
        let snapshot = self.find(snapshot_id)?;
        Ok(snapshot
            .rows
            .iter()
            .find(|counts| counts.entity_id == entity_id)
            .map(|counts| EntityCounts {
                alltime: counts.alltime,
                epoch: counts.epoch,
            }))
    }
}
