pub mod errors;
pub mod pool;
pub mod retry;
pub mod session;
pub mod telemetry;
pub mod utils;

pub use errors::{FailureKind, RepositoryError, UnknownFailureKind};
pub use pool::{acquire, create_pool, DbPool};
pub use retry::{
    retry_async, retry_blocking, Disposition, RetryConfigError, RetryPolicy, RetryableError,
};
pub use session::{AsyncSession, NoSession, Session};
pub use telemetry::init_tracing;
pub use utils::{map_db_error, map_pool_error};
