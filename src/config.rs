//! Service Configuration
//!
//! Settings are layered, lowest precedence first:
//! 1. optional TOML file
//! 2. `POWER_POSITION_*` environment variables
//! 3. command-line overrides (applied by the binary)
//!
//! Log settings resolve separately from reporting settings so the logger can
//! exist before the rest of the configuration is validated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::scheduler::{RetryBudget, SchedulerConfig};

pub const ENV_REPORTING_LOCATION: &str = "POWER_POSITION_REPORTING_LOCATION";
pub const ENV_REPORTING_INTERVAL: &str = "POWER_POSITION_REPORTING_INTERVAL";
pub const ENV_MAX_RETRIES: &str = "POWER_POSITION_MAX_RETRIES";
pub const ENV_TICK_INTERVAL_MS: &str = "POWER_POSITION_TICK_INTERVAL_MS";
pub const ENV_LOG_FILENAME: &str = "POWER_POSITION_LOG_FILENAME";
pub const ENV_LOG_LEVEL: &str = "POWER_POSITION_LOG_LEVEL";
pub const ENV_SOURCE: &str = "POWER_POSITION_SOURCE";
pub const ENV_SOURCE_URL: &str = "POWER_POSITION_SOURCE_URL";
pub const ENV_SOURCE_TIMEOUT_SECS: &str = "POWER_POSITION_SOURCE_TIMEOUT_SECS";
pub const ENV_SIMULATED_FAILURE_RATE: &str = "POWER_POSITION_SIMULATED_FAILURE_RATE";

const MILLIS_PER_MINUTE: i64 = 60_000;
const DEFAULT_TICK_INTERVAL_MS: i64 = 5_000;
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Unvalidated settings as read from file/env/CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub reporting_location: Option<PathBuf>,
    pub reporting_interval_minutes: Option<i64>,
    pub max_retries: Option<i64>,
    pub tick_interval_ms: Option<i64>,
    pub log_filename: Option<PathBuf>,
    pub log_level: Option<String>,
    pub source: RawSourceSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSourceSettings {
    /// `simulated` or `http`
    pub kind: Option<String>,
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub failure_rate: Option<f64>,
}

impl RawSettings {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values found through `lookup`; blank values are ignored
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_REPORTING_LOCATION) {
            self.reporting_location = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_REPORTING_INTERVAL) {
            self.reporting_interval_minutes = Some(parse_env(ENV_REPORTING_INTERVAL, &v)?);
        }
        if let Some(v) = get(ENV_MAX_RETRIES) {
            self.max_retries = Some(parse_env(ENV_MAX_RETRIES, &v)?);
        }
        if let Some(v) = get(ENV_TICK_INTERVAL_MS) {
            self.tick_interval_ms = Some(parse_env(ENV_TICK_INTERVAL_MS, &v)?);
        }
        if let Some(v) = get(ENV_LOG_FILENAME) {
            self.log_filename = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_LOG_LEVEL) {
            self.log_level = Some(v);
        }
        if let Some(v) = get(ENV_SOURCE) {
            self.source.kind = Some(v);
        }
        if let Some(v) = get(ENV_SOURCE_URL) {
            self.source.url = Some(v);
        }
        if let Some(v) = get(ENV_SOURCE_TIMEOUT_SECS) {
            self.source.timeout_secs = Some(parse_env(ENV_SOURCE_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = get(ENV_SIMULATED_FAILURE_RATE) {
            self.source.failure_rate = Some(parse_env(ENV_SIMULATED_FAILURE_RATE, &v)?);
        }
        Ok(())
    }
}

fn parse_env<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// `None` logs to stderr
    pub filename: Option<PathBuf>,
    pub level: String,
}

impl LogSettings {
    pub fn from_raw(raw: &RawSettings) -> Result<Self, ConfigError> {
        let level = raw
            .log_level
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid(
                "log_level",
                &level,
                format!("expected one of {}", LOG_LEVELS.join(", ")),
            ));
        }

        Ok(Self {
            filename: raw.log_filename.clone(),
            level,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceSettings {
    Simulated { failure_rate: f64 },
    Http { url: String, timeout: Duration },
}

impl SourceSettings {
    fn from_raw(raw: &RawSourceSettings) -> Result<Self, ConfigError> {
        let kind = raw
            .kind
            .as_deref()
            .map(str::trim)
            .unwrap_or("simulated")
            .to_lowercase();

        match kind.as_str() {
            "simulated" => {
                let failure_rate = raw.failure_rate.unwrap_or(0.1);
                if !(0.0..=1.0).contains(&failure_rate) {
                    return Err(ConfigError::invalid(
                        "source.failure_rate",
                        failure_rate,
                        "must be between 0 and 1",
                    ));
                }
                Ok(Self::Simulated { failure_rate })
            }
            "http" => {
                let url = raw
                    .url
                    .clone()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or(ConfigError::MissingKey("source.url"))?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::invalid("source.url", &url, "must be an http(s) URL"));
                }
                let timeout_secs = raw.timeout_secs.unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECS).max(1);
                Ok(Self::Http {
                    url,
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            other => Err(ConfigError::invalid(
                "source.kind",
                other,
                "expected 'simulated' or 'http'",
            )),
        }
    }
}

/// Validated reporting configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub reporting_location: PathBuf,
    pub reporting_interval_minutes: u32,
    pub max_retries: RetryBudget,
    pub tick_interval: Duration,
    pub source: SourceSettings,
}

impl ServiceConfig {
    pub fn from_raw(raw: &RawSettings) -> Result<Self, ConfigError> {
        let reporting_location = raw
            .reporting_location
            .clone()
            .ok_or(ConfigError::MissingKey("reporting_location"))?;
        let interval = raw
            .reporting_interval_minutes
            .ok_or(ConfigError::MissingKey("reporting_interval_minutes"))?;
        let max_retries = raw
            .max_retries
            .ok_or(ConfigError::MissingKey("max_retries"))?;

        if !reporting_location.is_dir() {
            return Err(ConfigError::MissingDirectory(reporting_location));
        }

        let reporting_interval_minutes = u32::try_from(interval)
            .ok()
            .filter(|&m| m >= 1)
            .ok_or_else(|| {
                ConfigError::invalid("reporting_interval_minutes", interval, "must be at least 1")
            })?;

        let max_retries = RetryBudget::from_setting(max_retries).ok_or_else(|| {
            ConfigError::invalid(
                "max_retries",
                max_retries,
                format!(
                    "must be >= 0, or {} for unlimited",
                    RetryBudget::UNBOUNDED_SENTINEL
                ),
            )
        })?;

        let tick_ms = raw.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        if tick_ms <= 0 || MILLIS_PER_MINUTE % tick_ms != 0 {
            return Err(ConfigError::invalid(
                "tick_interval_ms",
                tick_ms,
                "must be a positive factor of 60000",
            ));
        }

        Ok(Self {
            reporting_location,
            reporting_interval_minutes,
            max_retries,
            tick_interval: Duration::from_millis(tick_ms as u64),
            source: SourceSettings::from_raw(&raw.source)?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::from_minutes(self.reporting_interval_minutes, self.max_retries)
            .with_tick_interval(self.tick_interval)
    }
}
