//! Power Position Service
//!
//! Writes an hourly day-ahead power position CSV on start and then once per
//! reporting interval, retrying failed reports within each interval.
//!
//! Usage:
//!   power-position --config power-position.toml
//!   power-position --reporting-location ./reports --reporting-interval 15 --max-retries 3
//!   power-position --config power-position.toml --once --at "2024-01-15 23:30"
//!
//! Environment Variables:
//!   POWER_POSITION_CONFIG              - Path to TOML config file
//!   POWER_POSITION_REPORTING_LOCATION  - Output directory (must exist)
//!   POWER_POSITION_REPORTING_INTERVAL  - Minutes between reports
//!   POWER_POSITION_MAX_RETRIES         - Retries per interval (-1 = until success)
//!   POWER_POSITION_LOG_FILENAME        - Log file (default: stderr)
//!   POWER_POSITION_LOG_LEVEL           - trace|debug|info|warn|error (default: info)
//!   RUST_LOG                           - Overrides the log filter entirely

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use dotenv::dotenv;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use power_position::config::{LogSettings, RawSettings, ServiceConfig, SourceSettings};
use power_position::reporting::PowerPositionReporter;
use power_position::scheduler::{HostedService, RetryScheduler};
use power_position::sources::{
    HttpTradeSource, SimulatedSourceConfig, SimulatedTradeSource, TradeSource,
};
use power_position::ConfigError;

const STARTUP_ERROR: &str = "An error occurred during service start";

#[derive(Parser, Debug)]
#[command(name = "power-position")]
#[command(about = "Scheduled day-ahead power position reporting")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "POWER_POSITION_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the CSV reports are written to
    #[arg(long)]
    reporting_location: Option<PathBuf>,

    /// Minutes between scheduled reports
    #[arg(long)]
    reporting_interval: Option<i64>,

    /// Retries per reporting interval (-1 retries until success)
    #[arg(long, allow_hyphen_values = true)]
    max_retries: Option<i64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Generate a single report and exit
    #[arg(long)]
    once: bool,

    /// Local time to report for with --once, "YYYY-MM-DD HH:MM" (default: now)
    #[arg(long, requires = "once", value_parser = parse_local_time)]
    at: Option<NaiveDateTime>,
}

impl Args {
    fn apply_overrides(&self, raw: &mut RawSettings) {
        if let Some(v) = &self.reporting_location {
            raw.reporting_location = Some(v.clone());
        }
        if let Some(v) = self.reporting_interval {
            raw.reporting_interval_minutes = Some(v);
        }
        if let Some(v) = self.max_retries {
            raw.max_retries = Some(v);
        }
        if let Some(v) = &self.log_level {
            raw.log_level = Some(v.clone());
        }
    }
}

fn parse_local_time(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M")
        .map_err(|e| format!("expected \"YYYY-MM-DD HH:MM\": {}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    load_env();
    let args = Args::parse();

    // Until the logger exists, startup errors can only go to stderr
    let raw = match load_raw_settings(&args) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("{} {:#}", STARTUP_ERROR, anyhow::Error::from(e));
            return ExitCode::FAILURE;
        }
    };
    let log_settings = match LogSettings::from_raw(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", STARTUP_ERROR, anyhow::Error::from(e));
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&log_settings) {
        eprintln!("{} {:#}", STARTUP_ERROR, e);
        return ExitCode::FAILURE;
    }

    info!(
        "LogFilename={}",
        log_settings
            .filename
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stderr>".to_string())
    );
    info!("LogLevel={}", log_settings.level);

    let config = match ServiceConfig::from_raw(&raw) {
        Ok(config) => config,
        Err(e) => {
            error!("{}: {:#}", STARTUP_ERROR, anyhow::Error::from(e));
            return ExitCode::FAILURE;
        }
    };
    debug!("ReportingLocation={}", config.reporting_location.display());
    debug!("ReportingInterval={}", config.reporting_interval_minutes);
    debug!("Retries={}", config.max_retries);
    debug!("TickIntervalMs={}", config.tick_interval.as_millis());

    let source = match build_source(&config.source) {
        Ok(source) => source,
        Err(e) => {
            error!("{}: {:#}", STARTUP_ERROR, e);
            return ExitCode::FAILURE;
        }
    };
    let reporter = PowerPositionReporter::new(source, &config.reporting_location);

    if args.once {
        return run_once(&reporter, args.at).await;
    }

    debug!("Requesting service start");
    let mut scheduler = RetryScheduler::new(config.scheduler_config(), Arc::new(reporter));
    if let Err(e) = scheduler.start() {
        error!("{}: {:#}", STARTUP_ERROR, e);
        return ExitCode::FAILURE;
    }

    shutdown_signal().await;
    scheduler.stop();
    scheduler.wait().await;

    ExitCode::SUCCESS
}

fn load_raw_settings(args: &Args) -> Result<RawSettings, ConfigError> {
    let mut raw = match &args.config {
        Some(path) => RawSettings::from_toml_file(path)?,
        None => RawSettings::default(),
    };
    raw.apply_env()?;
    args.apply_overrides(&mut raw);
    Ok(raw)
}

fn build_source(settings: &SourceSettings) -> Result<Arc<dyn TradeSource>> {
    match settings {
        SourceSettings::Simulated { failure_rate } => {
            info!("Using simulated trade source (failure rate {})", failure_rate);
            Ok(Arc::new(SimulatedTradeSource::new(SimulatedSourceConfig {
                failure_rate: *failure_rate,
                ..Default::default()
            })))
        }
        SourceSettings::Http { url, timeout } => {
            info!("Using HTTP trade source at {}", url);
            let source = HttpTradeSource::new(url.clone(), *timeout)?;
            Ok(Arc::new(source))
        }
    }
}

async fn run_once(reporter: &PowerPositionReporter, at: Option<NaiveDateTime>) -> ExitCode {
    let result = match at {
        Some(point_in_time) => reporter.generate_report(point_in_time).await,
        None => reporter.generate_report_now().await,
    };

    match result {
        Ok(path) => {
            info!("Report written to {}", path.display());
            ExitCode::SUCCESS
        }
        // Already logged with its cause by the reporter
        Err(_) => ExitCode::FAILURE,
    }
}

/// Initialize tracing: stderr by default, or append to the configured log file
fn init_tracing(settings: &LogSettings) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("warn,power_position={}", settings.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    match &settings.filename {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .try_init()?;
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }
    Ok(())
}

fn load_env() {
    // Standard dotenv search (cwd + parents), then the crate directory
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
