/// Service configuration loader - parses service.toml
///
/// Keeps deployment knobs (listen address, worker count, anchor date,
/// query timeout) out of the code. Every field has a default, so a missing
/// `service.toml` in the working directory is not an error; a path given
/// explicitly with `--config` must exist.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::MalformedDateError;
use crate::model::{self, LATEST};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "service.toml";

/// Last day of the reference Hawaii observation snapshot.
pub const DEFAULT_ANCHOR_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2017, 8, 23) {
    Some(date) => date,
    None => panic!("default anchor is not a calendar date"),
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {0}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse {0}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub query: QueryConfig,
}

/// `[server]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Worker threads; each holds one data-store session.
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            workers: 4,
        }
    }
}

/// `[query]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Reference date for the last-365-days windows.
    pub anchor_date: AnchorDate,
    /// Statement timeout applied to every data-store session.
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            anchor_date: AnchorDate::default(),
            timeout_ms: 5_000,
        }
    }
}

/// Where the last-365-days window is anchored.
///
/// Never wall-clock time: the dataset is a static snapshot, and "now" would
/// move the window off the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AnchorDate {
    Fixed(NaiveDate),
    /// The maximum measurement date present in the dataset.
    DatasetLatest,
}

impl Default for AnchorDate {
    fn default() -> Self {
        AnchorDate::Fixed(DEFAULT_ANCHOR_DATE)
    }
}

impl TryFrom<String> for AnchorDate {
    type Error = MalformedDateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case(LATEST) {
            Ok(AnchorDate::DatasetLatest)
        } else {
            model::parse_date(&value).map(AnchorDate::Fixed)
        }
    }
}

impl std::fmt::Display for AnchorDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorDate::Fixed(date) => f.write_str(&model::format_date(*date)),
            AnchorDate::DatasetLatest => f.write_str(LATEST),
        }
    }
}

impl ServiceConfig {
    /// Parses configuration from TOML text and validates it.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(origin.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid("server.workers must be at least 1".into()));
        }
        if self.query.timeout_ms == 0 {
            return Err(ConfigError::Invalid("query.timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Loads the service configuration.
///
/// With `Some(path)` the file must exist. With `None`, `service.toml` in the
/// working directory is used if present, otherwise the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    if !required && !path.exists() {
        log::info!("{} not found, using built-in defaults", path.display());
        return Ok(ServiceConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
    ServiceConfig::from_toml_str(&contents, &path)
}
