use crate::store::SnapshotStore;
use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{EntityCounts, EntityId, Scope, SnapshotMeta, TableRow};
use sqlx::postgres::PgPool;
use sqlx::FromRow;

/// The `DbRepository` reads snapshots out of PostgreSQL. It encapsulates all
/// SQL used by the leaderboard engine.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// Represents a row from the `snapshots` table.
#[derive(Debug, Clone, FromRow)]
struct DbSnapshot {
    snapshot_id: i64,
    captured_at: DateTime<Utc>,
    epoch: String,
}

impl From<DbSnapshot> for SnapshotMeta {
    fn from(row: DbSnapshot) -> Self {
        SnapshotMeta {
            snapshot_id: row.snapshot_id,
            captured_at: row.captured_at,
            epoch: row.epoch,
        }
    }
}

/// A row of `entity_counts` joined with the entity's display name.
#[derive(Debug, Clone, FromRow)]
struct DbTableRow {
    entity_id: i64,
    display_name: String,
    metric_value: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
struct DbEntityCounts {
    alltime_count: Option<i64>,
    epoch_count: Option<i64>,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// The column holding the metric for `scope`. Only ever one of two literals.
fn metric_column(scope: &Scope) -> &'static str {
    match scope {
        Scope::AllTime => "c.alltime_count",
        Scope::Epoch(_) => "c.epoch_count",
    }
}

#[async_trait]
impl SnapshotStore for DbRepository {
    async fn latest_snapshot(&self) -> Result<Option<SnapshotMeta>, DbError> {
        let row = sqlx::query_as::<_, DbSnapshot>(
            "SELECT snapshot_id, captured_at, epoch FROM snapshots ORDER BY captured_at DESC, snapshot_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SnapshotMeta::from))
    }

    async fn nearest_snapshot_at_or_before(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError> {
        let row = sqlx::query_as::<_, DbSnapshot>(
            r#"
            SELECT snapshot_id, captured_at, epoch
            FROM snapshots
            WHERE captured_at <= $1 AND ($2::TEXT IS NULL OR epoch = $2)
            ORDER BY captured_at DESC, snapshot_id DESC
            LIMIT 1
            "#,
        )
        .bind(instant)
        .bind(scope.epoch_code())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SnapshotMeta::from))
    }

    async fn earliest_snapshot_at_or_after(
        &self,
        instant: DateTime<Utc>,
        scope: &Scope,
    ) -> Result<Option<SnapshotMeta>, DbError> {
        let row = sqlx::query_as::<_, DbSnapshot>(
            r#"
            SELECT snapshot_id, captured_at, epoch
            FROM snapshots
            WHERE captured_at >= $1 AND ($2::TEXT IS NULL OR epoch = $2)
            ORDER BY captured_at ASC, snapshot_id ASC
            LIMIT 1
            "#,
        )
        .bind(instant)
        .bind(scope.epoch_code())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SnapshotMeta::from))
    }

    async fn ranked_table(
        &self,
        snapshot_id: i64,
        scope: &Scope,
    ) -> Result<Vec<TableRow>, DbError> {
        let column = metric_column(scope);
        let query = format!(
            r#"
            SELECT c.entity_id, e.display_name, {column} AS metric_value
            FROM entity_counts AS c
            JOIN entities AS e ON e.entity_id = c.entity_id
            WHERE c.snapshot_id = $1
            ORDER BY {column} DESC NULLS LAST, c.position ASC
            "#
        );
        let rows = sqlx::query_as::<_, DbTableRow>(&query)
            .bind(snapshot_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| TableRow {
                entity_id: row.entity_id,
                display_name: row.display_name,
                metric_value: row.metric_value,
            })
            .collect())
    }

    async fn resolve_display_name(
        &self,
        display_name: &str,
    ) -> Result<Option<EntityId>, DbError> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT entity_id FROM entities WHERE display_name = $1",
        )
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn entity_counts(
        &self,
        snapshot_id: i64,
        entity_id: EntityId,
    ) -> Result<Option<EntityCounts>, DbError> {
        let row = sqlx::query_as::<_, DbEntityCounts>(
            "SELECT alltime_count, epoch_count FROM entity_counts WHERE snapshot_id = $1 AND entity_id = $2",
        )
        .bind(snapshot_id)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| EntityCounts {
            alltime: r.alltime_count,
            epoch: r.epoch_count,
        }))
    }
}
