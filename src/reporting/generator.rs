//! Power position report generator

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::aggregate::{build_rows, day_ahead_date};
use super::writer::{render_csv, report_filename, write_atomically};
use crate::error::ReportError;
use crate::sources::TradeSource;

/// Fetches trades for the day-ahead date and writes the aggregated hourly CSV
#[derive(Clone)]
pub struct PowerPositionReporter {
    source: Arc<dyn TradeSource>,
    reporting_path: PathBuf,
}

impl PowerPositionReporter {
    pub fn new(source: Arc<dyn TradeSource>, reporting_path: impl Into<PathBuf>) -> Self {
        let reporting_path = reporting_path.into();
        debug!("Reporting path is {}", reporting_path.display());
        Self {
            source,
            reporting_path,
        }
    }

    pub fn reporting_path(&self) -> &Path {
        &self.reporting_path
    }

    /// Generate a report for the host's current local time
    pub async fn generate_report_now(&self) -> Result<PathBuf, ReportError> {
        self.generate_report(Local::now().naive_local()).await
    }

    /// Generate a report for `point_in_time` (host local time).
    ///
    /// Returns the path of the written CSV. Calling twice for the same minute
    /// overwrites the same file.
    pub async fn generate_report(&self, point_in_time: NaiveDateTime) -> Result<PathBuf, ReportError> {
        info!("Report started");

        let day_ahead = day_ahead_date(point_in_time);

        let trades = match self.source.get_trades(day_ahead).await {
            Ok(trades) => trades,
            Err(e) => {
                error!(date = %day_ahead, "Report failed whilst retrieving trades: {:#}", e);
                return Err(ReportError::SourceUnavailable {
                    date: day_ahead,
                    source: e,
                });
            }
        };
        debug!("{} trades retrieved for {}", trades.len(), day_ahead);

        let filename = report_filename(&self.reporting_path, point_in_time);
        info!(filename = %filename.display(), "Report filename is {}", filename.display());

        let rows = build_rows(day_ahead, &trades);
        debug!("Maximum period count was {}", rows.len());

        let written = match render_csv(&rows) {
            Ok(bytes) => write_atomically(&filename, &bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            error!(filename = %filename.display(), "Report failed whilst writing report: {}", e);
            return Err(ReportError::ReportWriteFailed {
                path: filename,
                source: e,
            });
        }

        info!("Report complete");
        Ok(filename)
    }
}
