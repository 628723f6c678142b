use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use configuration::Config;
use core_types::{
    Directive, EntityCounts, EntityId, MetricDiff, RankLabel, RateUnit, Scope, ScopeSelector,
    SnapshotMeta, SortMetric, TableRow,
};
use database::{CapturedCounts, DbError, InMemorySnapshotStore, SnapshotStore};
use engine::{BoundarySide, EngineError, LeaderboardEngine, TimeSpec};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, day, hour, minute, 0).unwrap()
}

fn engine(store: InMemorySnapshotStore) -> LeaderboardEngine<InMemorySnapshotStore> {
    LeaderboardEngine::new(Arc::new(store), Config::default())
}

/// 200 entities named `user<id>`, ranked by id, captured at 10:00 and 12:00.
fn two_hundred() -> InMemorySnapshotStore {
    let mut store = InMemorySnapshotStore::new();
    for id in 1..=200 {
        store.register_entity(id, &format!("user{}", id));
    }
    for (hour, bonus) in [(10, 0), (12, 100)] {
        store.push_snapshot(
            at(1, hour, 0),
            "c9",
            (1..=200).map(|id| {
                let value = 10_000 - id * 10 + bonus;
                CapturedCounts::new(id, Some(value), Some(value))
            }),
        );
    }
    store
}

fn ranks(entries: &[core_types::RankedEntry]) -> Vec<u32> {
    entries.iter().map(|e| e.rank).collect()
}

#[tokio::test]
async fn identical_requests_give_identical_results() {
    let engine = engine(two_hundred());
    let (spec, scope, directive) = (TimeSpec::Now, ScopeSelector::AllTime, Directive::TopN(15));

    let first = engine
        .build_leaderboard_at(at(1, 13, 0), &spec, &scope, &directive, SortMetric::Count)
        .await
        .unwrap();
    let second = engine
        .build_leaderboard_at(at(1, 13, 0), &spec, &scope, &directive, SortMetric::Count)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(ranks(&first.entries), (1..=15).collect::<Vec<_>>());
    assert_eq!(first.rate_unit, None);
    assert_eq!(first.last_known_instant, Some(at(1, 12, 0)));
}

#[tokio::test]
async fn rank_range_beyond_the_list_is_out_of_bounds() {
    let err = engine(two_hundred())
        .build_leaderboard_at(
            at(1, 13, 0),
            &TimeSpec::Now,
            &ScopeSelector::AllTime,
            &Directive::RankRange { low: 5000, high: 5010 },
            SortMetric::Count,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RankOutOfBounds { low: 5000, high: 5010, available: 200 }
    ));
}

#[tokio::test]
async fn unknown_name_is_not_found() {
    let err = engine(two_hundred()).resolve_entity("ghost-user").await.unwrap_err();
    assert!(matches!(err, EngineError::EntityNotFound(ref name) if name == "ghost-user"));
}

#[tokio::test]
async fn centered_window_around_a_named_entity() {
    let engine = engine(two_hundred());
    let entity_id = engine.resolve_entity("user50").await.unwrap();
    let board = engine
        .build_leaderboard_at(
            at(1, 13, 0),
            &TimeSpec::Now,
            &ScopeSelector::AllTime,
            &Directive::CenteredOn { entity_id, lines: 15 },
            SortMetric::Count,
        )
        .await
        .unwrap();

    // 15 lines reach 8 ranks either side of the target.
    assert_eq!(board.entries.len(), 17);
    assert_eq!(board.entries.first().map(|e| e.rank), Some(42));
    assert_eq!(board.entries.last().map(|e| e.rank), Some(58));
    let target = board.entries.iter().find(|e| e.entity_id == entity_id).unwrap();
    assert_eq!(target.diff_from_target, Some(MetricDiff::Exact(0)));
}

#[tokio::test]
async fn degenerate_window_is_too_narrow() {
    let instant = at(1, 12, 0);
    let err = engine(two_hundred())
        .build_leaderboard_at(
            at(1, 13, 0),
            &TimeSpec::Absolute { after: Some(instant), before: Some(instant) },
            &ScopeSelector::AllTime,
            &Directive::TopN(15),
            SortMetric::Count,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RangeTooNarrow { .. }));
}

fn gain_of_120(lower: DateTime<Utc>, upper: DateTime<Utc>) -> InMemorySnapshotStore {
    let mut store = InMemorySnapshotStore::new();
    store.register_entity(1, "ann").register_entity(2, "ben");
    store.push_snapshot(
        lower,
        "c9",
        [CapturedCounts::new(1, Some(100), Some(100)), CapturedCounts::new(2, Some(50), Some(50))],
    );
    store.push_snapshot(
        upper,
        "c9",
        [CapturedCounts::new(1, Some(220), Some(220)), CapturedCounts::new(2, Some(74), Some(74))],
    );
    store
}

#[tokio::test]
async fn hourly_rate_over_two_hours() {
    let (lower, upper) = (at(1, 10, 0), at(1, 12, 0));
    let board = engine(gain_of_120(lower, upper))
        .build_leaderboard_at(
            at(1, 12, 5),
            &TimeSpec::Absolute { after: Some(lower), before: Some(upper) },
            &ScopeSelector::AllTime,
            &Directive::TopN(15),
            SortMetric::Count,
        )
        .await
        .unwrap();

    // An explicit window ranks by delta, and both captures share an epoch.
    assert_eq!(board.sort_metric, SortMetric::Delta);
    assert_eq!(board.effective_scope, Scope::Epoch("c9".to_string()));
    assert_eq!(board.rate_unit, Some(RateUnit::PerHour));
    let first = &board.entries[0];
    assert_eq!(first.metric_value, Some(120));
    assert_eq!(first.rate.map(|r| r.value), Some(dec!(60)));
    assert_eq!(board.entries[1].rate.map(|r| r.value), Some(dec!(12)));
}

#[tokio::test]
async fn daily_rate_over_two_days() {
    let (lower, upper) = (at(1, 0, 0), at(3, 0, 0));
    let board = engine(gain_of_120(lower, upper))
        .build_leaderboard_at(
            at(3, 0, 30),
            &TimeSpec::Absolute { after: Some(lower), before: Some(upper) },
            &ScopeSelector::AllTime,
            &Directive::TopN(15),
            SortMetric::Delta,
        )
        .await
        .unwrap();

    assert_eq!(board.rate_unit, Some(RateUnit::PerDay));
    let rate = board.entries[0].rate.unwrap();
    assert_eq!(rate.value, dec!(60));
    assert_eq!(rate.unit, RateUnit::PerDay);
}

#[tokio::test]
async fn relative_window_reaches_back_past_the_span() {
    let mut store = InMemorySnapshotStore::new();
    store.register_entity(1, "ann");
    let captures = [((11, 0), 10), ((11, 30), 20), ((12, 0), 30), ((12, 30), 40)];
    for ((hour, minute), value) in captures {
        store.push_snapshot(
            at(1, hour, minute),
            "c9",
            [CapturedCounts::new(1, Some(value), Some(value))],
        );
    }
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 34, 50).unwrap();
    let board = engine(store)
        .build_leaderboard_at(
            now,
            &TimeSpec::Relative("1h".to_string()),
            &ScopeSelector::AllTime,
            &Directive::TopN(15),
            SortMetric::Count,
        )
        .await
        .unwrap();

    assert!(board.boundary1.unwrap() <= at(1, 11, 34));
    assert_eq!(board.boundary1, Some(at(1, 11, 30)));
    assert_eq!(board.boundary2, Some(at(1, 12, 30)));
    assert_eq!(board.entries[0].metric_value, Some(20));
}

#[tokio::test]
async fn missing_epoch_degrades_to_an_empty_board() {
    let board = engine(two_hundred())
        .build_leaderboard_at(
            at(1, 13, 0),
            &TimeSpec::Now,
            &ScopeSelector::Epoch("c1".to_string()),
            &Directive::TopN(15),
            SortMetric::Count,
        )
        .await
        .unwrap();

    assert!(board.entries.is_empty());
    assert_eq!(board.unavailable.len(), 1);
    assert_eq!(board.unavailable[0].side, BoundarySide::Upper);
}

#[tokio::test]
async fn line_count_above_the_configured_maximum_is_rejected() {
    let err = engine(two_hundred())
        .build_leaderboard_at(
            at(1, 13, 0),
            &TimeSpec::Now,
            &ScopeSelector::AllTime,
            &Directive::TopN(41),
            SortMetric::Count,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidLineCount { requested: 41, max: 40 }));
}

/// Answers like the wrapped store, but only after `delay`.
struct SlowStore {
    inner: InMemorySnapshotStore,
    delay: Duration,
}

#[async_trait]
impl SnapshotStore for SlowStore {
    async fn latest_snapshot(&self) -> Result<Option<SnapshotMeta>, DbError> {
        tokio::time::sleep(self.delay).await;
        self.inner.latest_snapshot().await
    }

    async fn nearest_snapshot_at_or_before(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError> {
        tokio::time::sleep(self.delay).await;
        self.inner.nearest_snapshot_at_or_before(instant, scope).await
    }

    async fn earliest_snapshot_at_or_after(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError> {
        tokio::time::sleep(self.delay).await;
        self.inner.earliest_snapshot_at_or_after(instant, scope).await
    }

    async fn ranked_table(
        &self,
        snapshot_id: i64,
        scope: &Scope,
    ) -> Result<Vec<TableRow>, DbError> {
        tokio::time::sleep(self.delay).await;
        self.inner.ranked_table(snapshot_id, scope).await
    }

    async fn resolve_display_name(&self, display_name: &str) -> Result<Option<EntityId>, DbError> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve_display_name(display_name).await
    }

    async fn entity_counts(
        &self,
        snapshot_id: i64,
        entity_id: EntityId,
    ) -> Result<Option<EntityCounts>, DbError> {
        tokio::time::sleep(self.delay).await;
        self.inner.entity_counts(snapshot_id, entity_id).await
    }
}

#[tokio::test]
async fn slow_store_surfaces_a_timeout() {
    let mut config = Config::default();
    config.store.timeout_ms = 20;
    let store = SlowStore {
        inner: two_hundred(),
        delay: Duration::from_millis(500),
    };
    let engine = LeaderboardEngine::new(Arc::new(store), config);

    let err = engine
        .build_leaderboard_at(
            at(1, 13, 0),
            &TimeSpec::Now,
            &ScopeSelector::AllTime,
            &Directive::TopN(15),
            SortMetric::Count,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExternalStoreTimeout(d) if d == Duration::from_millis(20)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn engine_works_behind_a_trait_object() {
    let store: Arc<dyn SnapshotStore> = Arc::new(two_hundred());
    let engine = LeaderboardEngine::new(store, Config::default());
    let board = engine
        .build_leaderboard_at(
            at(1, 13, 0),
            &TimeSpec::Now,
            &ScopeSelector::CurrentEpoch,
            &Directive::RankRange { low: 198, high: 250 },
            SortMetric::Count,
        )
        .await
        .unwrap();
    assert_eq!(ranks(&board.entries), [198, 199, 200]);
    assert_eq!(board.effective_scope, Scope::Epoch("c9".to_string()));
}

/// `ann` climbs through the current epoch, `ben` has nothing in it yet.
fn activity_store() -> InMemorySnapshotStore {
    let mut store = InMemorySnapshotStore::new();
    store.register_entity(1, "ann").register_entity(2, "ben");
    store.push_snapshot(at(1, 11, 0), "c9", [CapturedCounts::new(1, Some(450), Some(0))]);
    store.push_snapshot(at(1, 11, 40), "c9", [CapturedCounts::new(1, Some(500), Some(50))]);
    store.push_snapshot(
        at(1, 12, 0),
        "c9",
        [CapturedCounts::new(1, Some(540), Some(90)), CapturedCounts::new(2, Some(2000), Some(0))],
    );
    store
}

#[tokio::test]
async fn summary_reports_recent_activity() {
    let summary = engine(activity_store())
        .entity_summary_at(1, at(1, 12, 0))
        .await
        .unwrap();

    assert_eq!(summary.display_name.as_deref(), Some("ann"));
    assert_eq!(summary.last_updated, Some(at(1, 12, 0)));
    assert_eq!(summary.alltime.rank, Some(2));
    let epoch = summary.epoch.unwrap();
    assert_eq!(epoch.rank, Some(1));
    assert_eq!(epoch.label, RankLabel::Numeric(1));

    let diffs: Vec<_> = summary
        .recent_activity
        .iter()
        .map(|a| (a.lookback_secs, a.diff))
        .collect();
    assert_eq!(
        diffs,
        [(900, Some(40)), (3600, Some(90)), (86_400, None), (604_800, None)]
    );
    assert_eq!(summary.recent_activity[0].since, Some(at(1, 11, 40)));
}

#[tokio::test]
async fn lookback_past_the_calendar_has_no_delta() {
    let mut config = Config::default();
    // A million years reaches before the earliest representable instant.
    config.leaderboard.lookback_secs = vec![900, 1_000_000 * 365 * 24 * 60 * 60];
    let engine = LeaderboardEngine::new(Arc::new(activity_store()), config);

    let summary = engine.entity_summary_at(1, at(1, 12, 0)).await.unwrap();
    assert_eq!(summary.recent_activity[0].diff, Some(40));
    assert_eq!(summary.recent_activity[1].since, None);
    assert_eq!(summary.recent_activity[1].diff, None);
}

#[tokio::test]
async fn summary_labels_idle_and_unlisted_entities() {
    let engine = engine(activity_store());

    let idle = engine.entity_summary_at(2, at(1, 12, 0)).await.unwrap();
    assert_eq!(idle.alltime.label, RankLabel::Numeric(1));
    assert_eq!(idle.epoch.map(|s| s.label), Some(RankLabel::NotApplicable));

    let ghost = engine.entity_summary_at(99, at(1, 12, 0)).await.unwrap();
    assert_eq!(ghost.alltime.rank, None);
    assert_eq!(ghost.alltime.label, RankLabel::Overflow(1000));
    assert_eq!(ghost.display_name, None);
}
