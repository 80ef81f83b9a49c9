use std::path::PathBuf;

use crate::error::ReportError;
use crate::reporting::PowerPositionReporter;

/// One report attempt, as seen by the scheduler
#[async_trait::async_trait]
pub trait ReportRunner: Send + Sync {
    async fn run_report(&self) -> Result<PathBuf, ReportError>;
}

#[async_trait::async_trait]
impl ReportRunner for PowerPositionReporter {
    async fn run_report(&self) -> Result<PathBuf, ReportError> {
        self.generate_report_now().await
    }
}
