use crate::error::DbError;
use configuration::StoreSettings;
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use std::path::PathBuf;

/// Establishes a connection pool to the PostgreSQL snapshot store.
///
/// Reads `DATABASE_URL` from the environment (a `.env` file is honoured when
/// present). Pool size and acquire timeout come from the `[store]` settings.
pub async fn connect(settings: &StoreSettings) -> Result<PgPool, DbError> {
    load_env_file(dotenv())?;

    let database_url = env::var("DATABASE_URL")
        .map_err(|_e| DbError::ConnectionConfigError("DATABASE_URL must be set.".to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.timeout())
        .connect(&database_url)
        .await?;

    tracing::info!(max_connections = settings.max_connections, "Connected to snapshot store.");
    Ok(pool)
}

/// A missing .env file is fine as long as the variable is set some other way;
/// a file that exists but cannot be parsed is not.
fn load_env_file(result: Result<PathBuf, dotenvy::Error>) -> Result<(), DbError> {
    match result {
        Ok(_) | Err(dotenvy::Error::Io(_)) => Ok(()),
        Err(e) => Err(DbError::ConnectionConfigError(e.to_string())),
    }
}

/// Applies the embedded migrations so the snapshot tables exist.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
