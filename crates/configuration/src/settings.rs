use crate::error::ConfigError;
use serde::Deserialize;

/// Longest interval accepted for the granularity and the lookbacks: 100 years.
pub const MAX_INTERVAL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// The root configuration structure for the entire application.
///
/// Every section is optional in `config.toml`; missing sections fall back to
/// the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub leaderboard: LeaderboardSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Parameters for building and windowing leaderboards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaderboardSettings {
    /// Number of lines shown when the caller does not ask for a size.
    pub default_lines: usize,
    /// Largest window a caller may request.
    pub max_lines: usize,
    /// Ranks above this value are presented as an overflow marker.
    pub rank_ceiling: u32,
    /// Capture interval of the snapshot store, in seconds.
    pub granularity_secs: i64,
    /// Lookback intervals for the recent-activity deltas, in seconds.
    pub lookback_secs: Vec<i64>,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            default_lines: 15,
            max_lines: 40,
            rank_ceiling: 1000,
            granularity_secs: 60,
            // 15 min, 1 hour, 1 day, 1 week
            lookback_secs: vec![15 * 60, 60 * 60, 24 * 60 * 60, 7 * 24 * 60 * 60],
        }
    }
}

impl LeaderboardSettings {
    pub fn granularity(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.granularity_secs)
    }

    pub fn lookbacks(&self) -> Vec<chrono::Duration> {
        self.lookback_secs
            .iter()
            .map(|secs| chrono::Duration::seconds(*secs))
            .collect()
    }
}

/// Parameters for talking to the snapshot store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Upper bound on a single store read before it is reported as a timeout.
    pub timeout_ms: u64,
    pub max_connections: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_connections: 10,
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directive used when `RUST_LOG` is not set.
    pub default_filter: String,
    /// Directory for the daily-rolling log file. Empty disables file logging.
    pub directory: String,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "pxlstats.log".to_string(),
        }
    }
}

impl Config {
    /// Checks the cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lb = &self.leaderboard;
        if lb.max_lines == 0 {
            return Err(ConfigError::ValidationError(
                "leaderboard.max_lines must be at least 1".to_string(),
            ));
        }
        if lb.default_lines == 0 || lb.default_lines > lb.max_lines {
            return Err(ConfigError::ValidationError(format!(
                "leaderboard.default_lines must be between 1 and {} (got {})",
                lb.max_lines, lb.default_lines
            )));
        }
        if lb.granularity_secs <= 0 || lb.granularity_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "leaderboard.granularity_secs must be between 1 and {} (got {})",
                MAX_INTERVAL_SECS, lb.granularity_secs
            )));
        }
        if let Some(bad) = lb
            .lookback_secs
            .iter()
            .find(|secs| **secs <= 0 || **secs > MAX_INTERVAL_SECS)
        {
            return Err(ConfigError::ValidationError(format!(
                "leaderboard.lookback_secs entries must be between 1 and {} (got {})",
                MAX_INTERVAL_SECS, bad
            )));
        }
        if self.store.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "store.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
