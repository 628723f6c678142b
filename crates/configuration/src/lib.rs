use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, LeaderboardSettings, LoggingSettings, StoreSettings};

/// Loads the application configuration from the `config.toml` file.
///
/// The file is optional. Values can be overridden from the environment with the
/// `PXLS` prefix and `__` as the section separator, e.g.
/// `PXLS__LEADERBOARD__MAX_LINES=25`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from("config.toml")
}

/// Same as [`load_config`], reading the file at `path` instead.
pub fn load_config_from(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("PXLS")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("leaderboard.lookback_secs"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(?config, "Configuration loaded.");
    Ok(config)
}
