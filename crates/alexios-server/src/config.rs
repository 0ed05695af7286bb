//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Store selection and database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Message retention settings.
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline for the store calls of a single request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Which [`alexios_store::MessageStore`] implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Store implementation.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "alexios_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Retention configuration. Messages are kept forever unless
/// `message_days` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Maximum message age in days.
    #[serde(default)]
    pub message_days: Option<u32>,

    /// Seconds between purge runs.
    #[serde(default = "default_retention_interval")]
    pub interval_seconds: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_db_path() -> String {
    "alexios.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_interval() -> u64 {
    3_600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            message_days: None,
            interval_seconds: default_retention_interval(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ALEXIOS_HOST` overrides `server.host`
/// - `ALEXIOS_PORT` overrides `server.port`
/// - `ALEXIOS_REQUEST_TIMEOUT_MS` overrides `server.request_timeout_ms`
/// - `ALEXIOS_DB_BACKEND` overrides `database.backend` (`sqlite` or `memory`)
/// - `ALEXIOS_DB_PATH` overrides `database.path`
/// - `ALEXIOS_LOG_LEVEL` overrides `logging.level`
/// - `ALEXIOS_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `ALEXIOS_RETENTION_DAYS` overrides `retention.message_days`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Applies `ALEXIOS_*` overrides using `lookup` to read variables.
///
/// Values that fail to parse are ignored with a warning.
pub fn apply_env_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    fn parsed<T: std::str::FromStr>(key: &str, raw: String) -> Option<T> {
        let value = raw.parse().ok();
        if value.is_none() {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
        }
        value
    }

    if let Some(host) = lookup("ALEXIOS_HOST").and_then(|v| parsed("ALEXIOS_HOST", v)) {
        config.server.host = host;
    }
    if let Some(port) = lookup("ALEXIOS_PORT").and_then(|v| parsed("ALEXIOS_PORT", v)) {
        config.server.port = port;
    }
    if let Some(timeout) = lookup("ALEXIOS_REQUEST_TIMEOUT_MS")
        .and_then(|v| parsed("ALEXIOS_REQUEST_TIMEOUT_MS", v))
    {
        config.server.request_timeout_ms = timeout;
    }
    if let Some(backend) =
        lookup("ALEXIOS_DB_BACKEND").and_then(|v| parsed("ALEXIOS_DB_BACKEND", v))
    {
        config.database.backend = backend;
    }
    if let Some(db_path) = lookup("ALEXIOS_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("ALEXIOS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("ALEXIOS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(days) =
        lookup("ALEXIOS_RETENTION_DAYS").and_then(|v| parsed("ALEXIOS_RETENTION_DAYS", v))
    {
        config.retention.message_days = Some(days);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").expect("empty config parses");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.database.backend, StoreBackend::Sqlite);
        assert_eq!(config.database.path, "alexios.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.retention.message_days, None);
    }

    #[test]
    fn parses_full_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000
            request_timeout_ms = 250

            [database]
            backend = "memory"
            pool_max_size = 2

            [logging]
            level = "debug"
            json = true

            [retention]
            message_days = 30
            interval_seconds = 60
            "#,
        )
        .expect("config parses");

        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout_ms, 250);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.database.pool_max_size, 2);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(config.logging.json);
        assert_eq!(config.retention.message_days, Some(30));
        assert_eq!(config.retention.interval_seconds, 60);
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let err = toml::from_str::<Config>("[database]\nbackend = \"postgres\"");
        assert!(err.is_err());
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("ALEXIOS_PORT", "7000"),
            ("ALEXIOS_DB_BACKEND", "memory"),
            ("ALEXIOS_DB_PATH", "/tmp/x.db"),
            ("ALEXIOS_LOG_JSON", "1"),
            ("ALEXIOS_RETENTION_DAYS", "7"),
            ("ALEXIOS_HOST", "not-an-ip"),
        ]
        .into_iter()
        .collect();

        let config = apply_env_overrides(Config::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, default_host(), "bad host is ignored");
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.database.path, "/tmp/x.db");
        assert!(config.logging.json);
        assert_eq!(config.retention.message_days, Some(7));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).expect("missing file is fine");
        assert_eq!(config.database.path, default_db_path());
    }
}
