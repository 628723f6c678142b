use crate::error::EngineError;
use crate::util::guarded;
use chrono::{DateTime, Utc};
use core_types::{
    EntityId, RankedEntry, Scope, ScopeSelector, SnapshotMeta, SortMetric, TableRow, TimeRange,
};
use database::SnapshotStore;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A ranked leaderboard with an index from entity to position, built once.
#[derive(Debug, Clone, Default)]
pub struct RankedList {
    entries: Vec<RankedEntry>,
    index: HashMap<EntityId, usize>,
}

impl RankedList {
    /// Builds the list from rows that are already in ranking order.
    pub fn from_rows(rows: Vec<TableRow>) -> Self {
        let entries: Vec<RankedEntry> = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| RankedEntry::new(u32::try_from(i + 1).unwrap_or(u32::MAX), row))
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.entity_id, i))
            .collect();
        Self { entries, index }
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zero-based position of `entity_id`.
    pub fn position_of(&self, entity_id: EntityId) -> Option<usize> {
        self.index.get(&entity_id).copied()
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&RankedEntry> {
        self.position_of(entity_id).map(|i| &self.entries[i])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySide {
    Lower,
    Upper,
}

/// The store had no capture for one of the boundaries. Reported alongside a
/// degraded result whose values for that boundary are treated as unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotUnavailable {
    pub side: BoundarySide,
    pub instant: DateTime<Utc>,
    pub scope: Scope,
}

/// Everything the window stage needs from the store.
#[derive(Debug, Clone)]
pub struct BoundaryFetch {
    /// The scope the tables were actually read in. Callers must use this one.
    pub effective_scope: Scope,
    pub last_known_instant: Option<DateTime<Utc>>,
    pub boundary1: Option<SnapshotMeta>,
    pub boundary2: Option<SnapshotMeta>,
    pub ranked: RankedList,
    pub unavailable: Vec<SnapshotUnavailable>,
}

impl BoundaryFetch {
    /// Both boundaries exist and were captured at different instants.
    pub fn has_interval(&self) -> bool {
        match (&self.boundary1, &self.boundary2) {
            (Some(b1), Some(b2)) => b1.captured_at != b2.captured_at,
            _ => false,
        }
    }
}

/// Locates the two boundary snapshots of a range and ranks entities between them.
pub struct BoundaryFetcher<'a, S: SnapshotStore + ?Sized> {
    store: &'a S,
    timeout: Duration,
}

impl<'a, S: SnapshotStore + ?Sized> BoundaryFetcher<'a, S> {
    pub fn new(store: &'a S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn fetch(
        &self,
        range: &TimeRange,
        selector: &ScopeSelector,
        sort: SortMetric,
    ) -> Result<BoundaryFetch, EngineError> {
        let wants_rate = sort.wants_rate();
        if wants_rate && range.is_instant() {
            return Err(EngineError::RangeTooNarrow {
                from: range.from,
                to: range.to,
            });
        }

        let latest = guarded(self.timeout, "latest_snapshot", self.store.latest_snapshot()).await?;
        let last_known_instant = latest.map(|s| s.captured_at);

        let (lookup_scope, upper_hint) = self.lookup_scope(range, selector).await?;
        let needs_lower = wants_rate || !range.is_instant();

        let (boundary2, lower) = futures::try_join!(
            self.upper_boundary(range.to, &lookup_scope, upper_hint),
            self.lower_boundary(range.from, &lookup_scope, needs_lower),
        )?;

        let mut unavailable = Vec::new();
        let Some(boundary2) = boundary2 else {
            tracing::warn!(
                to = %range.to,
                scope = %lookup_scope,
                "No snapshot at or before the upper bound."
            );
            unavailable.push(SnapshotUnavailable {
                side: BoundarySide::Upper,
                instant: range.to,
                scope: lookup_scope.clone(),
            });
            return Ok(BoundaryFetch {
                effective_scope: lookup_scope,
                last_known_instant,
                boundary1: None,
                boundary2: None,
                ranked: RankedList::default(),
                unavailable,
            });
        };

        let boundary1 = if needs_lower {
            // Never let a forward-snapped lower bound overtake the upper one.
            lower.map(|b1| {
                if b1.captured_at > boundary2.captured_at {
                    boundary2.clone()
                } else {
                    b1
                }
            })
        } else {
            Some(boundary2.clone())
        };
        if boundary1.is_none() {
            unavailable.push(SnapshotUnavailable {
                side: BoundarySide::Lower,
                instant: range.from,
                scope: lookup_scope.clone(),
            });
        }

        if wants_rate {
            if let Some(b1) = &boundary1 {
                if b1.captured_at == boundary2.captured_at {
                    return Err(EngineError::RangeTooNarrow {
                        from: b1.captured_at,
                        to: boundary2.captured_at,
                    });
                }
            }
        }

        let effective_scope =
            effective_scope(&lookup_scope, boundary1.as_ref(), &boundary2, wants_rate);

        let ranked = match sort {
            SortMetric::Count => {
                let rows = self.table(&boundary2, &effective_scope).await?;
                RankedList::from_rows(rank_rows(rows))
            }
            SortMetric::Delta => {
                let lower_table = async {
                    match &boundary1 {
                        Some(b1) => self.table(b1, &effective_scope).await,
                        None => Ok(Vec::new()),
                    }
                };
                let (upper_rows, lower_rows) =
                    futures::try_join!(self.table(&boundary2, &effective_scope), lower_table)?;
                RankedList::from_rows(rank_rows(delta_rows(upper_rows, lower_rows)))
            }
        };

        tracing::debug!(
            scope = %effective_scope,
            boundary1 = ?boundary1.as_ref().map(|b| b.captured_at),
            boundary2 = %boundary2.captured_at,
            entries = ranked.len(),
            "Fetched leaderboard boundaries."
        );

        Ok(BoundaryFetch {
            effective_scope,
            last_known_instant,
            boundary1,
            boundary2: Some(boundary2),
            ranked,
            unavailable,
        })
    }

    /// Pins the selector to a scope. For `CurrentEpoch` the epoch is the one of
    /// the capture at the upper bound, which is then reused as that boundary.
    async fn lookup_scope(
        &self,
        range: &TimeRange,
        selector: &ScopeSelector,
    ) -> Result<(Scope, Option<SnapshotMeta>), EngineError> {
        match selector {
            ScopeSelector::AllTime => Ok((Scope::AllTime, None)),
            ScopeSelector::Epoch(code) => Ok((Scope::Epoch(code.clone()), None)),
            ScopeSelector::CurrentEpoch => {
                let upper = guarded(
                    self.timeout,
                    "nearest_snapshot_at_or_before",
                    self.store.nearest_snapshot_at_or_before(range.to, &Scope::AllTime),
                )
                .await?;
                match upper {
                    Some(snapshot) => Ok((selector.resolve(&snapshot.epoch), Some(snapshot))),
                    None => Ok((Scope::AllTime, None)),
                }
            }
        }
    }

    async fn upper_boundary(
        &self,
        to: DateTime<Utc>,
        scope: &Scope,
        hint: Option<SnapshotMeta>,
    ) -> Result<Option<SnapshotMeta>, EngineError> {
        if hint.is_some() {
            return Ok(hint);
        }
        guarded(
            self.timeout,
            "nearest_snapshot_at_or_before",
            self.store.nearest_snapshot_at_or_before(to, scope),
        )
        .await
    }

    /// The capture at or before `from`, or the scope's first capture after it
    /// when the scope did not exist yet at `from`.
    async fn lower_boundary(
        &self,
        from: DateTime<Utc>,
        scope: &Scope,
        needed: bool,
    ) -> Result<Option<SnapshotMeta>, EngineError> {
        if !needed {
            return Ok(None);
        }
        let before = guarded(
            self.timeout,
            "nearest_snapshot_at_or_before",
            self.store.nearest_snapshot_at_or_before(from, scope),
        )
        .await?;
        if before.is_some() {
            return Ok(before);
        }
        tracing::debug!(%from, %scope, "No snapshot before the lower bound, snapping forward.");
        guarded(
            self.timeout,
            "earliest_snapshot_at_or_after",
            self.store.earliest_snapshot_at_or_after(from, scope),
        )
        .await
    }

    async fn table(
        &self,
        snapshot: &SnapshotMeta,
        scope: &Scope,
    ) -> Result<Vec<TableRow>, EngineError> {
        guarded(
            self.timeout,
            "ranked_table",
            self.store.ranked_table(snapshot.snapshot_id, scope),
        )
        .await
    }
}

/// An interval that stays inside one epoch is read from the epoch columns;
/// otherwise the requested scope is kept.
fn effective_scope(
    lookup_scope: &Scope,
    boundary1: Option<&SnapshotMeta>,
    boundary2: &SnapshotMeta,
    interval: bool,
) -> Scope {
    match lookup_scope {
        Scope::Epoch(_) => lookup_scope.clone(),
        Scope::AllTime => match boundary1 {
            Some(b1) if interval && b1.epoch == boundary2.epoch => {
                Scope::Epoch(boundary2.epoch.clone())
            }
            _ => Scope::AllTime,
        },
    }
}

/// Per-entity gain between the two tables, keeping the upper table's order
/// followed by entities that only appear in the lower one.
fn delta_rows(upper: Vec<TableRow>, lower: Vec<TableRow>) -> Vec<TableRow> {
    let before: HashMap<EntityId, Option<i64>> = lower
        .iter()
        .map(|row| (row.entity_id, row.metric_value))
        .collect();
    let listed: HashSet<EntityId> = upper.iter().map(|row| row.entity_id).collect();

    let mut rows: Vec<TableRow> = upper
        .into_iter()
        .map(|row| {
            let start = before.get(&row.entity_id).copied().flatten().unwrap_or(0);
            TableRow {
                metric_value: row.metric_value.map(|end| end - start),
                ..row
            }
        })
        .collect();
    rows.extend(
        lower
            .into_iter()
            .filter(|row| !listed.contains(&row.entity_id))
            .map(|row| TableRow {
                metric_value: None,
                ..row
            }),
    );
    rows
}

/// Stable sort, metric descending, unknown values last.
fn rank_rows(mut rows: Vec<TableRow>) -> Vec<TableRow> {
    rows.sort_by(|a, b| match (a.metric_value, b.metric_value) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows
}
