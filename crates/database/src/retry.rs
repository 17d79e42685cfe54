//! Retrying wrapper for database operations.
//!
//! An operation is attempted until it succeeds, fails with a non-retryable
//! error, or runs out of attempts. After every failed attempt the session is
//! rolled back so the next attempt starts from a clean transaction.
//!
//! Delay before attempt `n + 1` is `retry_delay * 2^(n - 1)` (optionally capped
//! by `max_delay`) plus a uniform jitter in `[0, retry_delay / 4]`.

use crate::errors::{FailureKind, RepositoryError, UnknownFailureKind};
use crate::session::{AsyncSession, Session};
use config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};

const JITTER_FRACTION: f64 = 0.25;

const DEFAULT_RETRYABLE_KINDS: [FailureKind; 4] = [
    FailureKind::Connection,
    FailureKind::Timeout,
    FailureKind::Pool,
    FailureKind::TransactionConflict,
];

const DEFAULT_FATAL_KINDS: [FailureKind; 4] = [
    FailureKind::Integrity,
    FailureKind::Validation,
    FailureKind::NotFound,
    FailureKind::DataConversion,
];

/// Errors that the retry wrapper knows how to classify and wrap.
pub trait RetryableError: std::error::Error + Sized {
    fn failure_kind(&self) -> FailureKind;

    /// Build the error returned once every attempt failed transiently.
    fn service_unavailable(operation: &str, attempts: u32, last_error: Self) -> Self;
}

impl RetryableError for RepositoryError {
    fn failure_kind(&self) -> FailureKind {
        RepositoryError::failure_kind(self)
    }

    fn service_unavailable(operation: &str, attempts: u32, last_error: Self) -> Self {
        RepositoryError::ServiceUnavailable {
            operation: operation.to_string(),
            attempts,
            last_error: Box::new(last_error),
        }
    }
}

/// What the wrapper does with a failure of a given kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry,
    FailFast,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryConfigError {
    #[error(transparent)]
    UnknownKind(#[from] UnknownFailureKind),
    #[error("Failure kind '{0}' is listed as both retryable and fatal")]
    ConflictingKind(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
    max_delay: Option<Duration>,
    retryable: Vec<FailureKind>,
    fatal: Vec<FailureKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// `max_retries` is the total number of attempts, the first one included.
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            max_delay: None,
            retryable: DEFAULT_RETRYABLE_KINDS.to_vec(),
            fatal: DEFAULT_FATAL_KINDS.to_vec(),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_retryable_kinds(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    pub fn with_fatal_kinds(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.fatal = kinds.into_iter().collect();
        self
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self, RetryConfigError> {
        let retryable = parse_kinds(&config.retryable_failure_kinds)?;
        let fatal = parse_kinds(&config.fatal_failure_kinds)?;

        if let Some(kind) = retryable.iter().find(|kind| fatal.contains(kind)) {
            return Err(RetryConfigError::ConflictingKind(*kind));
        }

        Ok(Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: config.max_delay_ms.map(Duration::from_millis),
            retryable,
            fatal,
        })
    }

    /// Attempts actually allowed. A policy of zero still runs the operation once.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn classify(&self, kind: FailureKind) -> Disposition {
        if self.retryable.contains(&kind) {
            Disposition::Retry
        } else if self.fatal.contains(&kind) {
            Disposition::FailFast
        } else {
            Disposition::Unexpected
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.retry_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Upper bound of the random jitter added on top of [`Self::base_delay`].
    pub fn jitter_ceiling(&self) -> Duration {
        self.retry_delay.mul_f64(JITTER_FRACTION)
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let fraction = rand::rng().random_range(0.0..=JITTER_FRACTION);
        self.base_delay(attempt)
            .saturating_add(self.retry_delay.mul_f64(fraction))
    }
}

fn parse_kinds(names: &[String]) -> Result<Vec<FailureKind>, RetryConfigError> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind: FailureKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

enum Next<E> {
    RetryAfter(Duration),
    Fail(E),
}

fn after_failure<E: RetryableError>(
    policy: &RetryPolicy,
    operation: &str,
    attempt: u32,
    start: Instant,
    err: E,
) -> Next<E> {
    let kind = err.failure_kind();
    let max_attempts = policy.max_attempts();

    match policy.classify(kind) {
        Disposition::Retry if attempt < max_attempts => {
            let backoff = policy.backoff_delay(attempt);
            tracing::warn!(
                operation = operation,
                attempt = attempt,
                max_attempts = max_attempts,
                failure_kind = %kind,
                error = %err,
                backoff_ms = backoff.as_millis() as u64,
                "Database operation failed, retrying"
            );
            Next::RetryAfter(backoff)
        }
        Disposition::Retry => {
            tracing::error!(
                operation = operation,
                attempt = attempt,
                duration_ms = start.elapsed().as_millis() as u64,
                failure_kind = %kind,
                error = %err,
                "Database operation failed, retries exhausted"
            );
            Next::Fail(E::service_unavailable(operation, attempt, err))
        }
        Disposition::FailFast => {
            tracing::error!(
                operation = operation,
                attempt = attempt,
                failure_kind = %kind,
                error = %err,
                "Database operation failed permanently"
            );
            Next::Fail(err)
        }
        Disposition::Unexpected => {
            tracing::error!(
                operation = operation,
                attempt = attempt,
                failure_kind = %kind,
                error = ?err,
                "Unexpected error in database operation"
            );
            Next::Fail(err)
        }
    }
}

fn log_rollback_failure(operation: &str, attempt: u32, err: &RepositoryError) {
    tracing::warn!(
        operation = operation,
        attempt = attempt,
        error = %err,
        "Rollback after failed database operation also failed"
    );
}

fn log_recovered(operation: &str, attempt: u32, start: Instant) {
    if attempt > 1 {
        tracing::info!(
            operation = operation,
            attempt = attempt,
            duration_ms = start.elapsed().as_millis() as u64,
            "Database operation succeeded after retry"
        );
    }
}

/// Run `op` against `session`, retrying transient failures.
///
/// Blocks the calling thread between attempts.
pub fn retry_blocking<T, E, S, F>(
    operation: &str,
    policy: &RetryPolicy,
    session: &mut S,
    op: F,
) -> Result<T, E>
where
    S: Session + ?Sized,
    F: FnMut(&mut S) -> Result<T, E>,
    E: RetryableError,
{
    retry_blocking_with_sleep(operation, policy, session, op, std::thread::sleep)
}

fn retry_blocking_with_sleep<T, E, S, F, Z>(
    operation: &str,
    policy: &RetryPolicy,
    session: &mut S,
    mut op: F,
    mut sleep: Z,
) -> Result<T, E>
where
    S: Session + ?Sized,
    F: FnMut(&mut S) -> Result<T, E>,
    E: RetryableError,
    Z: FnMut(Duration),
{
    let mut attempt = 0u32;
    let start = Instant::now();

    loop {
        tracing::debug!(operation = operation, "Starting database operation");

        attempt += 1;

        match op(&mut *session) {
            Ok(value) => {
                log_recovered(operation, attempt, start);
                return Ok(value);
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback() {
                    log_rollback_failure(operation, attempt, &rollback_err);
                }
                match after_failure(policy, operation, attempt, start, err) {
                    Next::RetryAfter(delay) => sleep(delay),
                    Next::Fail(err) => return Err(err),
                }
            }
        }
    }
}

/// Async variant of [`retry_blocking`]; waits with `tokio::time::sleep`.
///
/// The operation borrows whatever it needs itself, so pass handles in with
/// `move || async move { .. }`.
pub async fn retry_async<T, E, S, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    session: &S,
    mut op: F,
) -> Result<T, E>
where
    S: AsyncSession + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let mut attempt = 0u32;
    let start = Instant::now();

    loop {
        tracing::debug!(operation = operation, "Starting database operation");

        attempt += 1;

        match op().await {
            Ok(value) => {
                log_recovered(operation, attempt, start);
                return Ok(value);
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    log_rollback_failure(operation, attempt, &rollback_err);
                }
                match after_failure(policy, operation, attempt, start, err) {
                    Next::RetryAfter(delay) => tokio::time::sleep(delay).await,
                    Next::Fail(err) => return Err(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSession {
        rollbacks: u32,
        fail_rollback: bool,
    }

    impl Session for CountingSession {
        fn rollback(&mut self) -> Result<(), RepositoryError> {
            self.rollbacks += 1;
            if self.fail_rollback {
                Err(RepositoryError::ConnectionFailed("rollback lost".into()))
            } else {
                Ok(())
            }
        }
    }

    fn transient() -> RepositoryError {
        RepositoryError::ConnectionFailed("server closed the connection".into())
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.retry_delay(), Duration::from_millis(500));
        assert_eq!(policy.jitter_ceiling(), Duration::from_millis(125));
    }

    #[test]
    fn test_from_default_config_matches_default_policy() {
        let policy = RetryPolicy::from_config(&RetryConfig::default()).unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_from_config_rejects_unknown_kind() {
        let config = RetryConfig {
            retryable_failure_kinds: vec!["connection".into(), "cosmic_rays".into()],
            ..RetryConfig::default()
        };
        let err = RetryPolicy::from_config(&config).unwrap_err();
        assert_eq!(
            err,
            RetryConfigError::UnknownKind(UnknownFailureKind("cosmic_rays".into()))
        );
    }

    #[test]
    fn test_from_config_rejects_kind_in_both_lists() {
        let config = RetryConfig {
            retryable_failure_kinds: vec!["timeout".into()],
            fatal_failure_kinds: vec!["integrity".into(), "timeout".into()],
            ..RetryConfig::default()
        };
        let err = RetryPolicy::from_config(&config).unwrap_err();
        assert_eq!(err, RetryConfigError::ConflictingKind(FailureKind::Timeout));
    }

    #[test]
    fn test_classify() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.classify(FailureKind::Connection), Disposition::Retry);
        assert_eq!(
            policy.classify(FailureKind::TransactionConflict),
            Disposition::Retry
        );
        assert_eq!(policy.classify(FailureKind::Integrity), Disposition::FailFast);
        assert_eq!(
            policy.classify(FailureKind::Database),
            Disposition::Unexpected
        );
        assert_eq!(
            policy.classify(FailureKind::Authentication),
            Disposition::Unexpected
        );
    }

    #[test]
    fn test_base_delay_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(400));
        assert_eq!(policy.base_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_max_delay_caps_base_delay() {
        let policy =
            RetryPolicy::new(10, Duration::from_millis(100)).with_max_delay(Duration::from_millis(250));
        assert_eq!(policy.base_delay(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(250));
        assert_eq!(policy.base_delay(9), Duration::from_millis(250));
    }

    #[test]
    fn test_no_overflow_on_large_attempt() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1));
        // Should saturate rather than panic
        let delay = policy.backoff_delay(200);
        assert!(delay >= policy.base_delay(200));
    }

    #[test]
    fn test_backoff_stays_within_jitter_window() {
        let policy = RetryPolicy::new(5, Duration::from_millis(400));
        for attempt in 1..=4 {
            for _ in 0..50 {
                let delay = policy.backoff_delay(attempt);
                let low = policy.base_delay(attempt);
                let high = low + policy.jitter_ceiling();
                assert!(delay >= low, "delay {:?} below {:?}", delay, low);
                assert!(delay <= high, "delay {:?} above {:?}", delay, high);
            }
        }
    }

    #[test]
    fn test_exhaustion_sleeps_between_attempts_only() {
        let policy = RetryPolicy::default();
        let mut session = CountingSession::default();
        let mut calls = 0;
        let mut delays = Vec::new();

        let result: Result<(), RepositoryError> = retry_blocking_with_sleep(
            "load_user",
            &policy,
            &mut session,
            |_| {
                calls += 1;
                Err(transient())
            },
            |delay| delays.push(delay),
        );

        assert_eq!(calls, 3);
        assert_eq!(session.rollbacks, 3);
        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= Duration::from_millis(500) && delays[0] <= Duration::from_millis(625));
        assert!(delays[1] >= Duration::from_millis(1000) && delays[1] <= Duration::from_millis(1250));

        match result {
            Err(RepositoryError::ServiceUnavailable {
                operation,
                attempts,
                last_error,
            }) => {
                assert_eq!(operation, "load_user");
                assert_eq!(attempts, 3);
                assert!(matches!(*last_error, RepositoryError::ConnectionFailed(_)));
            }
            other => panic!("expected ServiceUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_max_retries_still_attempts_once() {
        let policy = RetryPolicy::new(0, Duration::from_millis(500));
        let mut session = CountingSession::default();
        let mut calls = 0;
        let mut delays = Vec::new();

        let result: Result<(), RepositoryError> = retry_blocking_with_sleep(
            "noop",
            &policy,
            &mut session,
            |_| {
                calls += 1;
                Err(transient())
            },
            |delay| delays.push(delay),
        );

        assert_eq!(calls, 1);
        assert!(delays.is_empty());
        assert!(matches!(
            result,
            Err(RepositoryError::ServiceUnavailable { attempts: 1, .. })
        ));
    }

    #[test]
    fn test_failing_rollback_does_not_stop_retries() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut session = CountingSession {
            fail_rollback: true,
            ..Default::default()
        };
        let mut calls = 0;

        let result = retry_blocking_with_sleep(
            "update_balance",
            &policy,
            &mut session,
            |_| {
                calls += 1;
                if calls < 3 {
                    Err(transient())
                } else {
                    Ok(calls)
                }
            },
            |_| {},
        );

        assert_eq!(result.unwrap(), 3);
        assert_eq!(session.rollbacks, 2);
    }

    #[test]
    fn test_operation_receives_session() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let mut session = CountingSession::default();

        let result = retry_blocking_with_sleep(
            "inspect",
            &policy,
            &mut session,
            |s: &mut CountingSession| {
                if s.rollbacks == 0 {
                    Err(RepositoryError::TransactionConflict)
                } else {
                    Ok(s.rollbacks)
                }
            },
            |_| {},
        );

        assert_eq!(result.unwrap(), 1);
    }
}
