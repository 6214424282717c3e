//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `LedgerStore` implementation backs the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailTransportConfig {
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        use_tls: bool,
    },
    File {
        path: PathBuf,
    },
    Log,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailConfig {
    pub from: String,
    pub transport: EmailTransportConfig,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub log_level: Level,
    /// Upper bound on waiting for the global request lock.
    pub lock_wait: Duration,
    pub sweep_enabled: bool,
    pub sweep_interval: Duration,
    pub school_name: String,
    pub cors_origin: Option<String>,
    pub email: EmailConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Store Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let store = match backend.to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Locking and Scheduling ---
        let lock_wait = Duration::from_millis(parse_or(&lookup, "LOCK_WAIT_MS", 10_000u64)?);
        let sweep_enabled = parse_or(&lookup, "SWEEP_ENABLED", true)?;
        let sweep_interval = Duration::from_secs(parse_or(&lookup, "SWEEP_INTERVAL_SECS", 86_400u64)?);
        if sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SWEEP_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let school_name = lookup("SCHOOL_NAME").unwrap_or_else(|| "Colegio LB".to_string());
        let cors_origin = lookup("CORS_ORIGIN");

        // --- Outgoing Mail ---
        let from = lookup("MAIL_FROM").unwrap_or_else(|| "pagos@colegio.edu.ve".to_string());
        let transport = if let Some(host) = lookup("SMTP_HOST") {
            EmailTransportConfig::Smtp {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 587u16)?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD"),
                use_tls: parse_or(&lookup, "SMTP_USE_TLS", true)?,
            }
        } else if let Some(dir) = lookup("EMAIL_FILE_DIR") {
            EmailTransportConfig::File { path: PathBuf::from(dir) }
        } else {
            EmailTransportConfig::Log
        };

        Ok(Self {
            bind_address,
            store,
            log_level,
            lock_wait,
            sweep_enabled,
            sweep_interval,
            school_name,
            cors_origin,
            email: EmailConfig { from, transport },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn defaults_for_memory_backend() {
        let config = load(&[("STORE_BACKEND", "memory")]).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.lock_wait, Duration::from_millis(10_000));
        assert_eq!(config.sweep_interval, Duration::from_secs(86_400));
        assert!(config.sweep_enabled);
        assert_eq!(config.school_name, "Colegio LB");
        assert_eq!(config.email.transport, EmailTransportConfig::Log);
    }

    #[test]
    fn smtp_settings_are_read() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/oficina"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USE_TLS", "false"),
        ])
        .unwrap();
        assert_eq!(
            config.email.transport,
            EmailTransportConfig::Smtp {
                host: "smtp.example.com".to_string(),
                port: 2525,
                username: None,
                password: None,
                use_tls: false,
            }
        );
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = load(&[("STORE_BACKEND", "memory"), ("LOCK_WAIT_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "LOCK_WAIT_MS"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = load(&[("STORE_BACKEND", "sheets")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "STORE_BACKEND"));
    }
}
