//! TOML-based configuration for rowgraph.
//!
//! Supports a config file (rowgraph.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [database]
//! url = "${DATABASE_URL}"
//! driver = "sqlite"
//! namespace = "main"
//!
//! [database.pool]
//! max_connections = 10
//! acquire_timeout = "5s"
//! idle_timeout = "1m"
//! max_lifetime = "30m"
//!
//! [live]
//! channel_capacity = 1024
//! subscriber_buffer = 16
//! coalesce_events = true
//!
//! [live.retry]
//! max_retries = 3
//! backoff = "250ms"
//!
//! [cdc]
//! source_name = "rowgraph"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::live::{LiveConfig, RetryPolicy};
use crate::query::PoolConfig;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
    Postgres,
}

impl Driver {
    /// Schema used when none is configured.
    pub fn default_namespace(&self) -> &'static str {
        match self {
            Driver::Sqlite => "main",
            Driver::Postgres => "public",
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Driver::Sqlite => Dialect::Sqlite,
            Driver::Postgres => Dialect::Postgres,
        }
    }
}

impl FromStr for Driver {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            other => Err(SettingsError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Sqlite => f.write_str("sqlite"),
            Driver::Postgres => f.write_str("postgres"),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub live: LiveSettings,
    pub cdc: CdcSettings,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL (supports ${ENV_VAR} expansion).
    pub url: String,

    /// Database driver (sqlite, postgres).
    pub driver: String,

    /// Schema used for introspection and change-event matching.
    pub namespace: Option<String>,

    /// Connection pool settings.
    pub pool: PoolSettings,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            driver: "sqlite".to_string(),
            namespace: None,
            pool: PoolSettings::default(),
        }
    }
}

impl DatabaseSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        self.driver.parse()
    }

    /// Get the URL with environment variables expanded.
    pub fn resolved_url(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.url)
    }

    /// Configured namespace, or the driver's default.
    pub fn namespace(&self) -> Result<String, SettingsError> {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => Ok(ns.clone()),
            Some(_) => Err(SettingsError::InvalidConfig(
                "database.namespace must not be empty".into(),
            )),
            None => Ok(self.driver_type()?.default_namespace().to_string()),
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of open connections.
    pub max_connections: u32,

    /// How long to wait for a free connection (e.g., "5s").
    pub acquire_timeout: String,

    /// Close connections idle for longer than this ("0s" disables).
    pub idle_timeout: String,

    /// Recycle connections older than this ("0s" disables).
    pub max_lifetime: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: "5s".to_string(),
            idle_timeout: "1m".to_string(),
            max_lifetime: "30m".to_string(),
        }
    }
}

impl PoolSettings {
    pub fn to_pool_config(&self) -> Result<PoolConfig, SettingsError> {
        if self.max_connections == 0 {
            return Err(SettingsError::InvalidConfig(
                "database.pool.max_connections must be at least 1".into(),
            ));
        }
        let optional = |d: Duration| if d.is_zero() { None } else { Some(d) };
        Ok(PoolConfig {
            max_connections: self.max_connections,
            acquire_timeout: parse_duration(&self.acquire_timeout)?,
            idle_timeout: optional(parse_duration(&self.idle_timeout)?),
            max_lifetime: optional(parse_duration(&self.max_lifetime)?),
        })
    }
}

/// Live query configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveSettings {
    /// Capacity of the shared change-event broadcast.
    pub channel_capacity: usize,

    /// Buffered deliveries per live query.
    pub subscriber_buffer: usize,

    /// Collapse already-queued matching events into one refetch.
    pub coalesce_events: bool,

    pub retry: RetrySettings,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            subscriber_buffer: 16,
            coalesce_events: true,
            retry: RetrySettings::default(),
        }
    }
}

impl LiveSettings {
    /// Live query config, naming attached change sources after `cdc`.
    pub fn to_live_config(&self, cdc: &CdcSettings) -> Result<LiveConfig, SettingsError> {
        if self.channel_capacity == 0 || self.subscriber_buffer == 0 {
            return Err(SettingsError::InvalidConfig(
                "live.channel_capacity and live.subscriber_buffer must be at least 1".into(),
            ));
        }
        // Topics are `source.schema.table`, so the name cannot hold a dot.
        if cdc.source_name.is_empty() || cdc.source_name.contains('.') {
            return Err(SettingsError::InvalidConfig(format!(
                "cdc.source_name must be non-empty without '.': {:?}",
                cdc.source_name
            )));
        }
        Ok(LiveConfig {
            channel_capacity: self.channel_capacity,
            subscriber_buffer: self.subscriber_buffer,
            coalesce_events: self.coalesce_events,
            retry: RetryPolicy {
                max_retries: self.retry.max_retries,
                backoff: parse_duration(&self.retry.backoff)?,
            },
            source_name: cdc.source_name.clone(),
        })
    }
}

/// Refetch retry settings for resource-exhaustion errors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    /// Initial backoff, doubled on each attempt (e.g., "250ms").
    pub backoff: String,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: "250ms".to_string(),
        }
    }
}

/// Change-data-capture naming.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CdcSettings {
    /// The `source` part of `source.schema.table`.
    pub source_name: String,
}

impl Default for CdcSettings {
    fn default() -> Self {
        Self {
            source_name: "rowgraph".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `ROWGRAPH_CONFIG`
    /// 2. `./rowgraph.toml`
    /// 3. `~/.config/rowgraph/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("ROWGRAPH_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("rowgraph.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rowgraph").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }
}

/// Parse `250ms`, `5s`, `1m` or `2h`.
pub fn parse_duration(s: &str) -> Result<Duration, SettingsError> {
    let s = s.trim();
    let invalid = || SettingsError::InvalidDuration(s.to_string());

    let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(invalid()),
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let name: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
            name
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
