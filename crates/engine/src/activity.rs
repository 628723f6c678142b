use crate::error::EngineError;
use crate::fetcher::RankedList;
use crate::util::{floor_to_granularity, guarded};
use chrono::{DateTime, Duration, Utc};
use configuration::LeaderboardSettings;
use core_types::{EntityCounts, EntityId, RankLabel, Scope, SnapshotMeta};
use database::SnapshotStore;
use futures::future::try_join_all;
use serde::Serialize;

/// Where an entity stands in one scope at the latest capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub scope: Scope,
    /// `None` when the entity is not listed in the scope.
    pub rank: Option<u32>,
    pub label: RankLabel,
    pub metric_value: Option<i64>,
}

/// Gain over one lookback interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityDelta {
    pub lookback_secs: i64,
    /// The capture the gain is measured from.
    pub since: Option<DateTime<Utc>>,
    pub diff: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub entity_id: EntityId,
    pub display_name: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub alltime: Standing,
    pub epoch: Option<Standing>,
    pub recent_activity: Vec<ActivityDelta>,
}

/// Builds the standings and recent activity of one entity.
pub(crate) async fn summarize<S: SnapshotStore + ?Sized>(
    store: &S,
    timeout: std::time::Duration,
    settings: &LeaderboardSettings,
    entity_id: EntityId,
    now: DateTime<Utc>,
) -> Result<EntitySummary, EngineError> {
    let latest = guarded(timeout, "latest_snapshot", store.latest_snapshot()).await?;
    let Some(latest) = latest else {
        tracing::warn!(entity_id, "Snapshot store is empty, summary has no data.");
        return Ok(EntitySummary {
            entity_id,
            display_name: None,
            last_updated: None,
            alltime: unlisted(Scope::AllTime, settings.rank_ceiling),
            epoch: None,
            recent_activity: settings
                .lookbacks()
                .into_iter()
                .map(|lookback| ActivityDelta {
                    lookback_secs: lookback.num_seconds(),
                    since: None,
                    diff: None,
                })
                .collect(),
        });
    };

    let epoch_scope = Scope::Epoch(latest.epoch.clone());
    let (alltime_rows, epoch_rows) = futures::try_join!(
        guarded(timeout, "ranked_table", store.ranked_table(latest.snapshot_id, &Scope::AllTime)),
        guarded(timeout, "ranked_table", store.ranked_table(latest.snapshot_id, &epoch_scope)),
    )?;
    let alltime_list = RankedList::from_rows(alltime_rows);
    let epoch_list = RankedList::from_rows(epoch_rows);

    let display_name = alltime_list
        .get(entity_id)
        .or_else(|| epoch_list.get(entity_id))
        .map(|e| e.display_name.clone());
    let current = EntityCounts {
        alltime: alltime_list.get(entity_id).and_then(|e| e.metric_value),
        epoch: epoch_list.get(entity_id).and_then(|e| e.metric_value),
    };

    let recent_activity = try_join_all(settings.lookbacks().into_iter().map(|lookback| {
        activity_since(store, timeout, settings, &epoch_scope, entity_id, current, now, lookback)
    }))
    .await?;

    Ok(EntitySummary {
        entity_id,
        display_name,
        last_updated: Some(latest.captured_at),
        alltime: standing(&alltime_list, Scope::AllTime, entity_id, settings.rank_ceiling),
        epoch: Some(standing(&epoch_list, epoch_scope, entity_id, settings.rank_ceiling)),
        recent_activity,
    })
}

#[allow(clippy::too_many_arguments)]
async fn activity_since<S: SnapshotStore + ?Sized>(
    store: &S,
    timeout: std::time::Duration,
    settings: &LeaderboardSettings,
    scope: &Scope,
    entity_id: EntityId,
    current: EntityCounts,
    now: DateTime<Utc>,
    lookback: Duration,
) -> Result<ActivityDelta, EngineError> {
    let Some(target) = now.checked_sub_signed(lookback) else {
        return Ok(ActivityDelta {
            lookback_secs: lookback.num_seconds(),
            since: None,
            diff: None,
        });
    };
    let instant = floor_to_granularity(target, settings.granularity());
    let snapshot: Option<SnapshotMeta> = guarded(
        timeout,
        "nearest_snapshot_at_or_before",
        store.nearest_snapshot_at_or_before(instant, scope),
    )
    .await?;

    let (since, then) = match snapshot {
        Some(snapshot) => {
            let counts = guarded(
                timeout,
                "entity_counts",
                store.entity_counts(snapshot.snapshot_id, entity_id),
            )
            .await?;
            (Some(snapshot.captured_at), counts)
        }
        None => (None, None),
    };

    Ok(ActivityDelta {
        lookback_secs: lookback.num_seconds(),
        since,
        diff: then.and_then(|then| counts_diff(current, then)),
    })
}

/// All-time gain when both all-time counts are known, else the epoch gain.
fn counts_diff(now: EntityCounts, then: EntityCounts) -> Option<i64> {
    match (now.alltime, then.alltime) {
        (Some(now), Some(then)) => Some(now - then),
        _ => match (now.epoch, then.epoch) {
            (Some(now), Some(then)) => Some(now - then),
            _ => None,
        },
    }
}

fn standing(list: &RankedList, scope: Scope, entity_id: EntityId, ceiling: u32) -> Standing {
    let Some(entry) = list.get(entity_id) else {
        return unlisted(scope, ceiling);
    };
    // An epoch count of zero means the entity has not placed anything yet.
    let label = match (&scope, entry.metric_value) {
        (Scope::Epoch(_), Some(0)) => RankLabel::NotApplicable,
        _ => entry.rank_label(ceiling),
    };
    Standing {
        scope,
        rank: Some(entry.rank),
        label,
        metric_value: entry.metric_value,
    }
}

fn unlisted(scope: Scope, ceiling: u32) -> Standing {
    Standing {
        scope,
        rank: None,
        label: RankLabel::Overflow(ceiling),
        metric_value: None,
    }
}
