use crate::error::EngineError;
use chrono::{DateTime, DurationRound, Utc};
use database::DbError;
use std::future::Future;
use std::time::Duration;

/// Awaits a store read, turning an elapsed `limit` into `ExternalStoreTimeout`.
///
/// Nothing is retried here; the caller decides whether to try again.
pub(crate) async fn guarded<T, F>(
    limit: Duration,
    operation: &'static str,
    read: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, DbError>>,
{
    match tokio::time::timeout(limit, read).await {
        Ok(result) => Ok(result?),
        Err(_elapsed) => {
            tracing::warn!(operation, ?limit, "Snapshot store read timed out.");
            Err(EngineError::ExternalStoreTimeout(limit))
        }
    }
}

/// Floors `instant` to the capture granularity of the store.
pub fn floor_to_granularity(
    instant: DateTime<Utc>,
    granularity: chrono::Duration,
) -> DateTime<Utc> {
    instant.duration_trunc(granularity).unwrap_or(instant)
}
