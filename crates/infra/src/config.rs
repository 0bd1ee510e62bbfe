//! Service configuration.
//!
//! Loaded once at startup and passed by value into constructors. Nothing here
//! is global, so tests build isolated instances with [`AppConfig::from_lookup`].

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in {1} environment")]
    Missing(&'static str, String),

    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl: Duration,
}

/// Bounds on how long a ledger operation may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Per-transaction `lock_timeout`.
    pub lock_timeout: Duration,
    /// Deadline for a whole operation, enforced by the caller.
    pub operation_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2_000),
            operation_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `development` | `staging` | `production`.
    pub environment: String,
    pub server: ServerConfig,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub ledger: LedgerConfig,
    /// `json` or `pretty`.
    pub log_format: String,
}

impl AppConfig {
    /// Load `.env` (if present) and then read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".into());

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment == "development" => "dev-JWT_SECRET-not-for-production".into(),
            None => return Err(ConfigError::Missing("JWT_SECRET", environment)),
        };

        let database = match var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
                acquire_timeout: millis_or(&var, "DB_ACQUIRE_TIMEOUT_MS", 5_000)?,
            }),
            None => None,
        };

        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            lock_timeout: millis_or(
                &var,
                "LEDGER_LOCK_TIMEOUT_MS",
                defaults.lock_timeout.as_millis() as u64,
            )?,
            operation_timeout: millis_or(
                &var,
                "LEDGER_OPERATION_TIMEOUT_MS",
                defaults.operation_timeout.as_millis() as u64,
            )?,
        };
        if ledger.lock_timeout.is_zero() {
            // lock_timeout = 0 means "wait forever" in Postgres.
            return Err(ConfigError::Invalid {
                key: "LEDGER_LOCK_TIMEOUT_MS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            server: ServerConfig {
                host: var("SRV_HOST").unwrap_or_else(|| "0.0.0.0".into()),
                port: parse_or(&var, "SRV_PORT", 8080)?,
            },
            database,
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl: Duration::from_secs(parse_or(&var, "JWT_TTL_SECS", 86_400)?),
            },
            ledger,
            log_format: var("LOG_FORMAT").unwrap_or_else(|| "json".into()),
            environment,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn millis_or<F>(var: &F, key: &'static str, default_ms: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(var, key, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn development_defaults() {
        let cfg = config_from(&[]).unwrap();

        assert_eq!(cfg.environment, "development");
        assert_eq!(cfg.server.bind_addr(), "0.0.0.0:8080");
        assert!(cfg.database.is_none());
        assert_eq!(cfg.jwt.ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.ledger, LedgerConfig::default());
        assert_eq!(cfg.log_format, "json");
    }

    #[test]
    fn production_requires_jwt_secret() {
        let err = config_from(&[("ENVIRONMENT", "production")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing("JWT_SECRET", "production".to_string())
        );
    }

    #[test]
    fn reads_database_and_ledger_settings() {
        let cfg = config_from(&[
            ("DATABASE_URL", "postgres://pvz@localhost/pvz"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("LEDGER_LOCK_TIMEOUT_MS", "250"),
            ("LEDGER_OPERATION_TIMEOUT_MS", "1500"),
            ("SRV_PORT", "9000"),
        ])
        .unwrap();

        let db = cfg.database.unwrap();
        assert_eq!(db.url, "postgres://pvz@localhost/pvz");
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.acquire_timeout, Duration::from_millis(5_000));
        assert_eq!(cfg.ledger.lock_timeout, Duration::from_millis(250));
        assert_eq!(cfg.ledger.operation_timeout, Duration::from_millis(1_500));
        assert_eq!(cfg.server.port, 9000);
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = config_from(&[("SRV_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SRV_PORT", .. }));
    }

    #[test]
    fn rejects_zero_lock_timeout() {
        let err = config_from(&[("LEDGER_LOCK_TIMEOUT_MS", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "LEDGER_LOCK_TIMEOUT_MS", .. }
        ));
    }
}
