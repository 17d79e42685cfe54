use crate::errors::RepositoryError;
use deadpool_postgres::PoolError;
use tokio_postgres::error::SqlState;

/// Convert tokio_postgres::Error to RepositoryError
pub fn map_db_error(err: tokio_postgres::Error) -> RepositoryError {
    // Handle database-level errors (connection, auth, etc.)
    if err.is_closed() {
        return RepositoryError::ConnectionFailed("Connection closed".to_string());
    }

    // Handle SQL state errors
    if let Some(db_err) = err.as_db_error() {
        let message = db_err.message();

        match db_err.code() {
            // Integrity constraint violations
            &SqlState::UNIQUE_VIOLATION => RepositoryError::AlreadyExists,
            &SqlState::FOREIGN_KEY_VIOLATION => {
                RepositoryError::ForeignKeyViolation(message.to_string())
            }
            &SqlState::NOT_NULL_VIOLATION => {
                RepositoryError::RequiredFieldMissing(message.to_string())
            }
            &SqlState::CHECK_VIOLATION => RepositoryError::ValidationFailed(message.to_string()),
            &SqlState::RESTRICT_VIOLATION => RepositoryError::DependencyExists(message.to_string()),

            // Malformed values
            &SqlState::INVALID_TEXT_REPRESENTATION
            | &SqlState::NUMERIC_VALUE_OUT_OF_RANGE
            | &SqlState::STRING_DATA_RIGHT_TRUNCATION => {
                RepositoryError::ValidationFailed(message.to_string())
            }

            // Transaction errors
            &SqlState::T_R_SERIALIZATION_FAILURE | &SqlState::T_R_DEADLOCK_DETECTED => {
                RepositoryError::TransactionConflict
            }

            // statement_timeout and lock_timeout both surface here
            &SqlState::QUERY_CANCELED | &SqlState::LOCK_NOT_AVAILABLE => {
                RepositoryError::Timeout(message.to_string())
            }

            // Connection/auth errors
            &SqlState::INVALID_PASSWORD | &SqlState::INVALID_AUTHORIZATION_SPECIFICATION => {
                RepositoryError::AuthenticationFailed
            }
            &SqlState::CONNECTION_EXCEPTION
            | &SqlState::CONNECTION_DOES_NOT_EXIST
            | &SqlState::CONNECTION_FAILURE
            | &SqlState::ADMIN_SHUTDOWN
            | &SqlState::CRASH_SHUTDOWN
            | &SqlState::CANNOT_CONNECT_NOW => {
                RepositoryError::ConnectionFailed(message.to_string())
            }

            // Default case - wrap in generic database error
            _ => RepositoryError::DatabaseError(anyhow::anyhow!(
                "Database error ({}): {}",
                db_err.code().code(),
                message
            )),
        }
    } else if let Some(io_err) = std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
    {
        // Refused, reset or unreachable sockets
        RepositoryError::ConnectionFailed(io_err.to_string())
    } else {
        // Non-SQL errors (protocol issues, etc.)
        RepositoryError::DatabaseError(err.into())
    }
}

/// Convert a connection pool error to RepositoryError
pub fn map_pool_error(err: PoolError) -> RepositoryError {
    match err {
        PoolError::Timeout(kind) => {
            RepositoryError::Timeout(format!("Timed out waiting for pool ({kind:?})"))
        }
        PoolError::Backend(db_err) => map_db_error(db_err),
        PoolError::Closed => RepositoryError::ConnectionFailed("Pool is closed".to_string()),
        other => RepositoryError::PoolError(anyhow::anyhow!("{other}")),
    }
}
