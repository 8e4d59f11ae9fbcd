/// Configuration management for Forum Service
///
/// Everything is read from environment variables (a `.env` file is loaded by
/// `main` first). Parsing goes through a lookup function so tests can supply
/// their own variables without touching the process environment.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Logging configuration
    pub log: LogConfig,
    /// Content store selection
    pub storage: StorageConfig,
    /// Live comment feed
    pub subscriptions: SubscriptionConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Deadline for a single service call
    pub request_timeout_ms: u64,
    /// Time allowed for releasing resources on shutdown
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageKind {
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Present only for `StorageKind::Postgres`
    pub database: Option<DatabaseConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
    /// How long to wait for a pooled connection
    pub acquire_timeout_secs: u64,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Per-subscriber buffer; comments beyond it are dropped
    pub channel_capacity: usize,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = lookup("APP_ENV").unwrap_or_else(|| "development".to_string());

        let format = match lookup("APP_LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => {
                return Err(format!(
                    "APP_LOG_FORMAT must be 'json' or 'pretty', got '{}'",
                    other
                ))
            }
        };

        let kind = match lookup("STORAGE_TYPE").as_deref() {
            None | Some("INMEMORY") => StorageKind::InMemory,
            Some("POSTGRES") => StorageKind::Postgres,
            Some(other) => {
                return Err(format!(
                    "STORAGE_TYPE must be INMEMORY or POSTGRES, got '{}'",
                    other
                ))
            }
        };

        let database = match kind {
            StorageKind::InMemory => None,
            StorageKind::Postgres => Some(DatabaseConfig {
                url: database_url(&lookup)?,
                max_connections: parse_or_default(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                acquire_timeout_secs: parse_or_default(
                    &lookup,
                    "DATABASE_ACQUIRE_TIMEOUT_SECS",
                    5,
                )?,
                run_migrations: parse_or_default(&lookup, "DATABASE_RUN_MIGRATIONS", true)?,
            }),
        };

        let channel_capacity = parse_or_default(&lookup, "SUBSCRIPTION_CHANNEL_CAPACITY", 16)?;
        if channel_capacity == 0 {
            return Err("SUBSCRIPTION_CHANNEL_CAPACITY must be greater than 0".to_string());
        }

        Ok(Config {
            app: AppConfig {
                env: app_env,
                request_timeout_ms: parse_or_default(&lookup, "REQUEST_TIMEOUT_MS", 5_000)?,
                shutdown_timeout_ms: parse_or_default(&lookup, "SHUTDOWN_TIMEOUT_MS", 10_000)?,
            },
            log: LogConfig {
                level: lookup("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                format,
            },
            storage: StorageConfig { kind, database },
            subscriptions: SubscriptionConfig { channel_capacity },
        })
    }

    /// In-memory configuration with short deadlines
    pub fn for_tests() -> Self {
        Config {
            app: AppConfig {
                env: "test".to_string(),
                request_timeout_ms: 1_000,
                shutdown_timeout_ms: 1_000,
            },
            log: LogConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            storage: StorageConfig {
                kind: StorageKind::InMemory,
                database: None,
            },
            subscriptions: SubscriptionConfig {
                channel_capacity: 16,
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }
}

/// `DATABASE_URL`, or a URL assembled from the `DB_*` parts
fn database_url<F>(lookup: &F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        return Ok(url);
    }

    let host = lookup("DB_HOST")
        .ok_or_else(|| "DATABASE_URL or DB_HOST must be set when STORAGE_TYPE=POSTGRES".to_string())?;
    let port: u16 = parse_or_default(lookup, "DB_PORT", 5432)?;
    let user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
    let name = lookup("DB_NAME").unwrap_or_else(|| "forum".to_string());

    Ok(match lookup("DB_PASSWORD") {
        Some(pass) => format!("postgres://{}:{}@{}:{}/{}", user, pass, host, port, name),
        None => format!("postgres://{}@{}:{}/{}", user, host, port, name),
    })
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        None => Ok(default),
    }
}
