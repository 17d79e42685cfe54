use crate::errors::RepositoryError;
use crate::utils::map_db_error;
use async_trait::async_trait;

/// Transactional context that a retried operation runs against.
///
/// Rolled back after every failed attempt so the next attempt starts clean.
pub trait Session {
    fn rollback(&mut self) -> Result<(), RepositoryError>;
}

/// Async counterpart of [`Session`].
///
/// Takes `&self` because async database handles share the connection
/// internally; the operation being retried borrows the same handle.
#[async_trait]
pub trait AsyncSession: Send + Sync {
    async fn rollback(&self) -> Result<(), RepositoryError>;
}

/// Used when an operation has no surrounding transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl Session for NoSession {
    fn rollback(&mut self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl AsyncSession for NoSession {
    async fn rollback(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl AsyncSession for tokio_postgres::Client {
    async fn rollback(&self) -> Result<(), RepositoryError> {
        // Outside a transaction PostgreSQL only emits a warning here
        self.batch_execute("ROLLBACK").await.map_err(map_db_error)
    }
}

#[async_trait]
impl AsyncSession for deadpool_postgres::Object {
    async fn rollback(&self) -> Result<(), RepositoryError> {
        self.batch_execute("ROLLBACK").await.map_err(map_db_error)
    }
}
