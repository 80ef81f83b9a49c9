//! Power Position Reporting Library
//!
//! Exposes the report generator, the retry scheduler and trade sources for
//! use by the service binary and tests.

pub mod config;
pub mod error;
pub mod models;
pub mod reporting;
pub mod scheduler;
pub mod sources;

pub use error::{ConfigError, ReportError};
