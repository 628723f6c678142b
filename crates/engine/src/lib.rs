//! # Leaderboard Engine
//!
//! Turns a time specification, a scope and a window directive into a ranked,
//! annotated leaderboard read from a [`SnapshotStore`].
//!
//! The pipeline is one-way: [`time_range::resolve`] pins the request to two
//! instants, [`BoundaryFetcher`] reads and ranks the boundary captures, and
//! [`window::select`] trims the ranked list and annotates it. Nothing is cached
//! between requests.

use chrono::{DateTime, Utc};
use configuration::Config;
use core_types::{Directive, EntityId, RankedEntry, RateUnit, Scope, ScopeSelector, SortMetric};
use database::SnapshotStore;
use serde::Serialize;
use std::sync::Arc;

pub mod activity;
pub mod error;
pub mod fetcher;
pub mod rate;
pub mod time_range;
pub mod util;
pub mod window;

pub use activity::{ActivityDelta, EntitySummary, Standing};
pub use error::EngineError;
pub use fetcher::{BoundaryFetch, BoundaryFetcher, BoundarySide, RankedList, SnapshotUnavailable};
pub use rate::RateBasis;
pub use time_range::TimeSpec;

/// A windowed leaderboard together with the context it was computed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    pub entries: Vec<RankedEntry>,
    /// The scope the values were actually read in, which may differ from the
    /// requested one.
    pub effective_scope: Scope,
    pub boundary1: Option<DateTime<Utc>>,
    pub boundary2: Option<DateTime<Utc>>,
    pub last_known_instant: Option<DateTime<Utc>>,
    pub sort_metric: SortMetric,
    /// Set when the entries carry rates.
    pub rate_unit: Option<RateUnit>,
    pub unavailable: Vec<SnapshotUnavailable>,
}

/// The read-only entry point of the crate.
///
/// Holds nothing but a handle on the store and a copy of the configuration, so
/// it can be shared across tasks behind an `Arc` and called concurrently.
pub struct LeaderboardEngine<S: SnapshotStore + ?Sized> {
    store: Arc<S>,
    config: Config,
}

impl<S: SnapshotStore + ?Sized> LeaderboardEngine<S> {
    pub fn new(store: Arc<S>, config: Config) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds a leaderboard as of the current wall-clock time.
    pub async fn build_leaderboard(
        &self,
        time_spec: &TimeSpec,
        scope: &ScopeSelector,
        directive: &Directive,
        sort_metric: SortMetric,
    ) -> Result<Leaderboard, EngineError> {
        self.build_leaderboard_at(Utc::now(), time_spec, scope, directive, sort_metric)
            .await
    }

    /// Builds a leaderboard with `now` as the reference instant.
    ///
    /// An explicit time window always ranks by the gain over that window,
    /// whatever `sort_metric` says.
    #[tracing::instrument(skip(self), fields(effective_scope))]
    pub async fn build_leaderboard_at(
        &self,
        now: DateTime<Utc>,
        time_spec: &TimeSpec,
        scope: &ScopeSelector,
        directive: &Directive,
        sort_metric: SortMetric,
    ) -> Result<Leaderboard, EngineError> {
        let settings = &self.config.leaderboard;
        let sort_metric = if time_spec.is_window() {
            SortMetric::Delta
        } else {
            sort_metric
        };

        let range = time_range::resolve(time_spec, now, settings.granularity())?;
        let fetched = BoundaryFetcher::new(self.store.as_ref(), self.config.store.timeout())
            .fetch(&range, scope, sort_metric)
            .await?;
        tracing::Span::current().record(
            "effective_scope",
            tracing::field::display(&fetched.effective_scope),
        );

        let mut entries = window::select(&fetched.ranked, directive, settings.max_lines)?;

        let mut rate_unit = None;
        if sort_metric.wants_rate() && fetched.has_interval() {
            if let (Some(b1), Some(b2)) = (&fetched.boundary1, &fetched.boundary2) {
                if let Some(basis) = RateBasis::between(b1.captured_at, b2.captured_at) {
                    rate::annotate_rates(&mut entries, &basis);
                    rate_unit = Some(basis.unit);
                }
            }
        }

        tracing::info!(entries = entries.len(), ?sort_metric, "Leaderboard built.");
        Ok(Leaderboard {
            entries,
            effective_scope: fetched.effective_scope,
            boundary1: fetched.boundary1.map(|b| b.captured_at),
            boundary2: fetched.boundary2.map(|b| b.captured_at),
            last_known_instant: fetched.last_known_instant,
            sort_metric,
            rate_unit,
            unavailable: fetched.unavailable,
        })
    }

    /// Resolves a display name to an entity id.
    pub async fn resolve_entity(&self, display_name: &str) -> Result<EntityId, EngineError> {
        util::guarded(
            self.config.store.timeout(),
            "resolve_display_name",
            self.store.resolve_display_name(display_name),
        )
        .await?
        .ok_or_else(|| EngineError::EntityNotFound(display_name.to_string()))
    }

    /// Standings and recent activity of one entity as of now.
    pub async fn entity_summary(&self, entity_id: EntityId) -> Result<EntitySummary, EngineError> {
        self.entity_summary_at(entity_id, Utc::now()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn entity_summary_at(
        &self,
        entity_id: EntityId,
        now: DateTime<Utc>,
    ) -> Result<EntitySummary, EngineError> {
        activity::summarize(
            self.store.as_ref(),
            self.config.store.timeout(),
            &self.config.leaderboard,
            entity_id,
            now,
        )
        .await
    }
}
