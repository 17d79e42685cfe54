use serde::Deserialize;
use std::{collections::HashMap, env};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            retry: RetryConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
        })
    }
}

/// Retry behavior for database operations
///
/// `max_retries` is the total number of attempts, the first one included.
/// Failure kinds are kept as their string names here; the database crate
/// resolves and validates them when it builds a retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds
    pub retry_delay_ms: u64,
    /// Optional ceiling on the exponential part of the delay. Unbounded when absent.
    pub max_delay_ms: Option<u64>,
    pub retryable_failure_kinds: Vec<String>,
    pub fatal_failure_kinds: Vec<String>,
}

impl RetryConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_retries = match lookup("DB_RETRY_MAX_RETRIES") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|_| "DB_RETRY_MAX_RETRIES must be a non-negative integer")?,
            None => defaults.max_retries,
        };
        let retry_delay_ms = match lookup("DB_RETRY_DELAY_MS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|_| "DB_RETRY_DELAY_MS must be a non-negative integer")?,
            None => defaults.retry_delay_ms,
        };
        let max_delay_ms = match lookup("DB_RETRY_MAX_DELAY_MS") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| "DB_RETRY_MAX_DELAY_MS must be a non-negative integer")?,
            ),
            None => defaults.max_delay_ms,
        };

        Ok(Self {
            max_retries,
            retry_delay_ms,
            max_delay_ms,
            retryable_failure_kinds: lookup("DB_RETRY_RETRYABLE_KINDS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.retryable_failure_kinds),
            fatal_failure_kinds: lookup("DB_RETRY_FATAL_KINDS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.fatal_failure_kinds),
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            max_delay_ms: None,
            retryable_failure_kinds: ["connection", "timeout", "pool", "transaction_conflict"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fatal_failure_kinds: ["integrity", "validation", "not_found", "data_conversion"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Logging Configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub modules: HashMap<String, String>,
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        if let Ok(level) = env::var("LOG_MODULE_DATABASE") {
            modules.insert("database".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_DB_PROBE") {
            modules.insert("db_probe".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("database".to_string(), "debug".to_string());

        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            modules,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds to wait for a pooled connection before giving up
    #[serde(default = "default_pool_timeout_secs")]
    pub pool_timeout_secs: u64,
}

fn default_max_connections() -> usize {
    5
}

fn default_pool_timeout_secs() -> u64 {
    5
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("DATABASE_HOST").map_err(|_| "DATABASE_HOST not set")?,
            port: env::var("DATABASE_PORT")
                .map_err(|_| "DATABASE_PORT not set")?
                .parse()
                .map_err(|_| "DATABASE_PORT must be a valid port number")?,
            database: env::var("DATABASE_NAME").map_err(|_| "DATABASE_NAME not set")?,
            username: env::var("DATABASE_USERNAME").map_err(|_| "DATABASE_USERNAME not set")?,
            password: env::var("DATABASE_PASSWORD").map_err(|_| "DATABASE_PASSWORD not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| "DATABASE_MAX_CONNECTIONS must be a valid number")?,
            pool_timeout_secs: env::var("DATABASE_POOL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| "DATABASE_POOL_TIMEOUT_SECS must be a valid number")?,
        })
    }
}
