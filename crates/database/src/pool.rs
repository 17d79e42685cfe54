use crate::errors::RepositoryError;
use crate::utils::map_pool_error;
use config::DatabaseConfig;
use deadpool_postgres::{
    Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

/// Connection pool type alias
pub type DbPool = Pool;

/// Create a connection pool from configuration
///
/// No connection is opened here; the first checkout does that.
pub fn create_pool(config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.database.clone());
    cfg.user = Some(config.username.clone());
    cfg.password = Some(config.password.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let timeout = Duration::from_secs(config.pool_timeout_secs);
    let mut timeouts = Timeouts::default();
    timeouts.wait = Some(timeout);
    timeouts.create = Some(timeout);
    timeouts.recycle = Some(timeout);
    let mut pool_config = PoolConfig::new(config.max_connections);
    pool_config.timeouts = timeouts;
    cfg.pool = Some(pool_config);

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?;

    info!(
        "Database connection pool created: {}:{}/{}",
        config.host, config.port, config.database
    );

    Ok(pool)
}

/// Check a connection out of the pool
pub async fn acquire(pool: &DbPool) -> Result<Object, RepositoryError> {
    pool.get().await.map_err(map_pool_error)
}
