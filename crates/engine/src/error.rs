use chrono::{DateTime, Utc};
use thiserror::Error;

/// Every way a leaderboard request can fail. Each error is scoped to one request.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid duration '{0}', the format must be ?y?mo?w?d?h?m?s")]
    InvalidDurationFormat(String),

    #[error("Invalid time range: {from} is after {to}")]
    InvalidTimeRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("The time frame between {from} and {to} is too short to compute a rate")]
    RangeTooNarrow {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("The number of lines must be between 1 and {max} (got {requested})")]
    InvalidLineCount { requested: usize, max: usize },

    #[error("Can't find values between ranks {low} and {high} ({available} entries ranked)")]
    RankOutOfBounds {
        low: usize,
        high: usize,
        available: usize,
    },

    #[error("Entity '{0}' not found on the leaderboard")]
    EntityNotFound(String),

    #[error("The snapshot store did not answer within {0:?}")]
    ExternalStoreTimeout(std::time::Duration),

    #[error("Snapshot store error: {0}")]
    ExternalStore(#[from] database::DbError),
}

impl EngineError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::ExternalStoreTimeout(_) | EngineError::ExternalStore(_)
        )
    }
}
