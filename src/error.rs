//! Error types for report generation and service configuration

use chrono::NaiveDate;
use std::path::PathBuf;

/// Failure of a single report attempt
#[derive(Debug)]
pub enum ReportError {
    /// The trade source could not supply trades for the day-ahead date
    SourceUnavailable {
        date: NaiveDate,
        source: anyhow::Error,
    },
    /// The CSV could not be created, written or moved into place
    ReportWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ReportError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::ReportWriteFailed { .. } => "report_write_failed",
        }
    }
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable { date, .. } => {
                write!(f, "report failed whilst retrieving trades for {}", date)
            }
            Self::ReportWriteFailed { path, .. } => {
                write!(f, "report failed whilst writing {}", path.display())
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceUnavailable { source, .. } => Some(source.as_ref()),
            Self::ReportWriteFailed { source, .. } => Some(source),
        }
    }
}

/// Invalid or missing service configuration. Fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    MissingKey(&'static str),
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    MissingDirectory(PathBuf),
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "missing key '{}' in configuration", key),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value '{}' for '{}': {}", value, key, reason)
            }
            Self::MissingDirectory(path) => {
                write!(f, "reporting location '{}' does not exist", path.display())
            }
            Self::Read { path, .. } => write!(f, "failed to read config {}", path.display()),
            Self::Parse { path, .. } => write!(f, "failed to parse config {}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_report_error_keeps_cause() {
        let err = ReportError::SourceUnavailable {
            date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            source: anyhow::anyhow!("connection refused"),
        };

        assert_eq!(err.kind(), "source_unavailable");
        assert!(err.to_string().contains("2024-01-16"));
        assert_eq!(err.source().unwrap().to_string(), "connection refused");
    }

    #[test]
    fn test_write_failure_exposes_io_error() {
        let err = ReportError::ReportWriteFailed {
            path: PathBuf::from("/nope/PowerPosition_20240115_2330.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };

        let io = err
            .source()
            .and_then(|e| e.downcast_ref::<std::io::Error>())
            .unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
    }
}
