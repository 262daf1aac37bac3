//! Exporter configuration
//!
//! The configuration is read once at startup from a YAML file (or JSON, when
//! the file name ends in `.json`) and validated before anything connects.
//! Keys are camelCase; the all-lowercase spellings (`querytimeout`,
//! `maxidleconns`, ...) are accepted as aliases.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

use crate::util::{
    get_default_database_host, get_default_database_port, get_default_listen_addr,
    get_default_listen_port, get_default_pool_size, get_default_query_interval,
    get_default_query_timeout, mask_secret,
};

/// Errors raised while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Database driver family
///
/// The driver decides both the pool implementation and the shape of the
/// connection string. Only these two families are supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Driver {
    #[default]
    Postgres,
    MySql,
}

impl FromStr for Driver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::MySql),
            other => Err(ConfigError::Invalid(format!(
                "unknown driver '{other}' (expected 'postgres' or 'mysql')"
            ))),
        }
    }
}

impl TryFrom<String> for Driver {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Postgres => write!(f, "postgres"),
            Driver::MySql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Address the metrics endpoint binds to
    #[serde(default = "get_default_listen_addr")]
    pub host: IpAddr,

    /// Port the metrics endpoint binds to
    #[serde(default = "get_default_listen_port")]
    pub port: u16,

    /// Timeout in seconds applied to every query of every database
    #[serde(
        default = "get_default_query_timeout",
        alias = "querytimeout",
        alias = "query_timeout"
    )]
    pub query_timeout: u64,

    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "get_default_database_host")]
    pub host: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Name of the database; also used as the `database` metric label
    pub database: String,

    #[serde(default = "get_default_database_port")]
    pub port: u16,

    #[serde(default)]
    pub driver: Driver,

    #[serde(
        default = "get_default_pool_size",
        alias = "maxidleconns",
        alias = "max_idle_conns"
    )]
    pub max_idle_conns: u32,

    #[serde(
        default = "get_default_pool_size",
        alias = "maxopenconns",
        alias = "max_open_conns"
    )]
    pub max_open_conns: u32,

    #[serde(default)]
    pub queries: Vec<QueryJob>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &mask_secret(&self.password))
            .field("database", &self.database)
            .field("port", &self.port)
            .field("driver", &self.driver)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("max_open_conns", &self.max_open_conns)
            .field("queries", &self.queries)
            .finish()
    }
}

/// A single scheduled query
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryJob {
    pub sql: String,

    /// Used as the `name` metric label, unique per database
    pub name: String,

    /// Repeat interval in minutes
    #[serde(default = "get_default_query_interval")]
    pub interval: u64,
}

/// Longest accepted query interval, one year in minutes
pub const MAX_QUERY_INTERVAL_MINUTES: u64 = 60 * 24 * 365;

impl QueryJob {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.saturating_mul(60))
    }
}

/// Immutable settings shared by every component, derived from [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExporterSettings {
    /// Deadline for a single query execution (and for acquiring a connection)
    pub query_timeout: Duration,
}

impl ExporterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            query_timeout: Duration::from_secs(config.query_timeout),
        }
    }
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(get_default_query_timeout()),
        }
    }
}

impl Config {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> ExporterSettings {
        ExporterSettings::from_config(self)
    }

    /// Check everything serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout == 0 {
            return Err(ConfigError::Invalid(
                "queryTimeout must be at least 1 second".to_string(),
            ));
        }

        let mut databases = HashSet::new();
        for database in &self.databases {
            if !databases.insert(database.database.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "database '{}' is configured more than once",
                    database.database
                )));
            }
            database.validate()?;
        }

        Ok(())
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database name must not be empty".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "database '{}': host must not be empty",
                self.database
            )));
        }
        if self.max_open_conns == 0 {
            return Err(ConfigError::Invalid(format!(
                "database '{}': maxOpenConns must be at least 1",
                self.database
            )));
        }

        let mut names = HashSet::new();
        for query in &self.queries {
            if query.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "database '{}': query name must not be empty",
                    self.database
                )));
            }
            if query.sql.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "database '{}', query '{}': sql must not be empty",
                    self.database, query.name
                )));
            }
            if query.interval == 0 {
                return Err(ConfigError::Invalid(format!(
                    "database '{}', query '{}': interval must be at least 1 minute",
                    self.database, query.name
                )));
            }
            if query.interval > MAX_QUERY_INTERVAL_MINUTES {
                return Err(ConfigError::Invalid(format!(
                    "database '{}', query '{}': interval must be at most {} minutes",
                    self.database, query.name, MAX_QUERY_INTERVAL_MINUTES
                )));
            }
            if !names.insert(query.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "database '{}': duplicate query name '{}'",
                    self.database, query.name
                )));
            }
        }

        Ok(())
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config = if is_json {
        Config::from_json_str(&content)
    } else {
        Config::from_yaml_str(&content)
    };

    config.inspect(|config| trace!("loaded config: {config:?}"))
}
