use anyhow::{anyhow, Context, Result};
use database::{acquire, create_pool, init_tracing, retry_async, NoSession, RetryPolicy};
use database::{map_db_error, RepositoryError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    // A config file wins; without one, fall back to environment variables
    let app_config = match config::AppConfig::load() {
        Ok(app_config) => app_config,
        Err(config::ConfigError::FileNotFound { .. }) => config::AppConfig::from_env()
            .map_err(|e| anyhow!("Failed to load configuration: {e}"))?,
        Err(e) => return Err(e).context("Failed to load configuration file"),
    };

    init_tracing(&app_config.logging)?;

    let policy =
        RetryPolicy::from_config(&app_config.retry).context("Invalid retry configuration")?;
    info!(
        max_attempts = policy.max_attempts(),
        retry_delay_ms = policy.retry_delay().as_millis() as u64,
        "Retry policy loaded"
    );

    let pool = create_pool(&app_config.database).context("Failed to create connection pool")?;

    let pool_ref = &pool;
    let client = retry_async("acquire_connection", &policy, &NoSession, move || async move {
        acquire(pool_ref).await
    })
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    let client_ref = &client;
    let value: i32 = retry_async("health_check", &policy, &client, move || async move {
        let row = client_ref
            .query_one("SELECT 1", &[])
            .await
            .map_err(map_db_error)?;
        row.try_get(0)
            .map_err(|e| RepositoryError::DataConversionError(e.into()))
    })
    .await
    .context("Health check failed")?;

    info!(result = value, "Database health check succeeded");
    Ok(())
}
