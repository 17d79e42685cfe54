use std::fmt;
use std::str::FromStr;

/// Errors surfaced by database operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("'{0}' does not exist")]
    NotFound(String),
    #[error("Cannot add this resource as it already exists")]
    AlreadyExists,
    #[error("Required field is missing: {0}")]
    RequiredFieldMissing(String),
    #[error("Referenced entity does not exist: {0}")]
    ForeignKeyViolation(String),
    #[error("Data validation failed: {0}")]
    ValidationFailed(String),
    #[error("Cannot delete due to existing dependencies: {0}")]
    DependencyExists(String),
    #[error("Transaction conflict, please retry")]
    TransactionConflict,
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Database operation timed out: {0}")]
    Timeout(String),
    #[error("Database authentication failed")]
    AuthenticationFailed,
    #[error("Database connection pool error: {0}")]
    PoolError(#[source] anyhow::Error),
    #[error("Database operation error: {0}")]
    DatabaseError(#[source] anyhow::Error),
    #[error("Data conversion error: {0}")]
    DataConversionError(#[source] anyhow::Error),
    #[error("Service unavailable: '{operation}' failed after {attempts} attempts: {last_error}")]
    ServiceUnavailable {
        operation: String,
        attempts: u32,
        #[source]
        last_error: Box<RepositoryError>,
    },
}

impl RepositoryError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RepositoryError::NotFound(_) => FailureKind::NotFound,
            RepositoryError::AlreadyExists
            | RepositoryError::RequiredFieldMissing(_)
            | RepositoryError::ForeignKeyViolation(_)
            | RepositoryError::DependencyExists(_) => FailureKind::Integrity,
            RepositoryError::ValidationFailed(_) => FailureKind::Validation,
            RepositoryError::TransactionConflict => FailureKind::TransactionConflict,
            RepositoryError::ConnectionFailed(_) => FailureKind::Connection,
            RepositoryError::Timeout(_) => FailureKind::Timeout,
            RepositoryError::AuthenticationFailed => FailureKind::Authentication,
            RepositoryError::PoolError(_) => FailureKind::Pool,
            RepositoryError::DatabaseError(_) => FailureKind::Database,
            RepositoryError::DataConversionError(_) => FailureKind::DataConversion,
            RepositoryError::ServiceUnavailable { .. } => FailureKind::Unavailable,
        }
    }
}

/// Coarse category of a failed database operation.
///
/// Retry policies are expressed in terms of these kinds rather than
/// individual error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    Timeout,
    Pool,
    TransactionConflict,
    Integrity,
    Validation,
    NotFound,
    DataConversion,
    Authentication,
    Database,
    Unavailable,
}

impl FailureKind {
    pub const ALL: [FailureKind; 11] = [
        FailureKind::Connection,
        FailureKind::Timeout,
        FailureKind::Pool,
        FailureKind::TransactionConflict,
        FailureKind::Integrity,
        FailureKind::Validation,
        FailureKind::NotFound,
        FailureKind::DataConversion,
        FailureKind::Authentication,
        FailureKind::Database,
        FailureKind::Unavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::Pool => "pool",
            FailureKind::TransactionConflict => "transaction_conflict",
            FailureKind::Integrity => "integrity",
            FailureKind::Validation => "validation",
            FailureKind::NotFound => "not_found",
            FailureKind::DataConversion => "data_conversion",
            FailureKind::Authentication => "authentication",
            FailureKind::Database => "database",
            FailureKind::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown failure kind: '{0}'")]
pub struct UnknownFailureKind(pub String);

impl FromStr for FailureKind {
    type Err = UnknownFailureKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FailureKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownFailureKind(s.to_string()))
    }
}
