//! Retry scheduler service
//!
//! One task owns the [`RetryState`] and multiplexes three inputs:
//! - the short tick interval
//! - outcomes of spawned report attempts
//! - the stop signal
//!
//! Attempts run on their own tasks so slow I/O never holds up ticking, and at
//! most one attempt is in flight at a time.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::runner::ReportRunner;
use super::state::{AttemptOutcome, AttemptTicket, RetryBudget, RetryState};

const MILLIS_PER_MINUTE: u64 = 60_000;

/// Start/stop hooks a process host drives
pub trait HostedService {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between scheduled reports
    pub reporting_interval: Duration,
    /// Check cadence; also the retry spacing
    pub tick_interval: Duration,
    pub max_retries: RetryBudget,
}

impl SchedulerConfig {
    pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(5_000);

    pub fn from_minutes(reporting_interval_minutes: u32, max_retries: RetryBudget) -> Self {
        Self {
            reporting_interval: Duration::from_millis(
                reporting_interval_minutes as u64 * MILLIS_PER_MINUTE,
            ),
            tick_interval: Self::DEFAULT_TICK_INTERVAL,
            max_retries,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn ticks_per_cycle(&self) -> u64 {
        let tick_ms = self.tick_interval.as_millis().max(1);
        (self.reporting_interval.as_millis() / tick_ms).max(1) as u64
    }
}

/// Scheduler lifecycle and attempt events
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    CycleStarted { cycle: u64 },
    AttemptStarted { cycle: u64 },
    /// A report was due but the previous attempt is still running
    AttemptSkipped { cycle: u64 },
    ReportWritten { path: PathBuf },
    RetryScheduled { retries_remaining: Option<u32> },
    RetriesExhausted { cycle: u64 },
    Stopped,
}

struct AttemptResult {
    ticket: AttemptTicket,
    succeeded: bool,
}

pub struct RetryScheduler {
    config: SchedulerConfig,
    runner: Arc<dyn ReportRunner>,
    event_tx: broadcast::Sender<SchedulerEvent>,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl RetryScheduler {
    pub fn new(config: SchedulerConfig, runner: Arc<dyn ReportRunner>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            runner,
            event_tx,
            stop_tx: None,
            handle: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the scheduler loop to exit after [`HostedService::stop`]
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Scheduler task ended abnormally: {}", e);
            }
        }
    }
}

impl HostedService for RetryScheduler {
    fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(anyhow!("scheduler already running"));
        }

        info!(
            reporting_interval_secs = self.config.reporting_interval.as_secs(),
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            max_retries = %self.config.max_retries,
            "Service starting"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.config.clone(),
            self.runner.clone(),
            stop_rx,
            self.event_tx.clone(),
        ));

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        info!("Service stopping");
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
    }
}

async fn run_loop(
    config: SchedulerConfig,
    runner: Arc<dyn ReportRunner>,
    mut stop_rx: watch::Receiver<bool>,
    event_tx: broadcast::Sender<SchedulerEvent>,
) {
    let mut state = RetryState::new(config.ticks_per_cycle(), config.max_retries);
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<AttemptResult>(8);

    // Reporting happens as soon as the service starts, then on each boundary
    let startup = state.begin_startup_attempt();
    state.reset_cycle();
    if let Some(ticket) = startup {
        launch_attempt(&runner, ticket, &outcome_tx, &event_tx);
    }
    let _ = event_tx.send(SchedulerEvent::CycleStarted {
        cycle: state.cycle(),
    });

    let mut ticker = interval_at(Instant::now() + config.tick_interval, config.tick_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("Service timer callback");
                if state.tick() {
                    debug!("Reporting interval complete");
                    let _ = event_tx.send(SchedulerEvent::CycleStarted { cycle: state.cycle() });
                }

                if state.is_due() {
                    match state.try_begin_attempt() {
                        Some(ticket) => launch_attempt(&runner, ticket, &outcome_tx, &event_tx),
                        None => {
                            debug!("Report attempt still in flight, skipping tick");
                            let _ = event_tx.send(SchedulerEvent::AttemptSkipped { cycle: state.cycle() });
                        }
                    }
                }
            }
            Some(result) = outcome_rx.recv() => {
                match state.complete_attempt(result.ticket, result.succeeded) {
                    AttemptOutcome::Succeeded => {}
                    AttemptOutcome::RetryScheduled { retries_remaining } => {
                        match retries_remaining {
                            Some(n) => warn!(retries_remaining = n, "Report failed - {} retries remaining", n),
                            None => warn!("Report failed - retrying until success"),
                        }
                        let _ = event_tx.send(SchedulerEvent::RetryScheduled { retries_remaining });
                    }
                    AttemptOutcome::Exhausted => {
                        warn!("Report failed - no retries remaining");
                        let _ = event_tx.send(SchedulerEvent::RetriesExhausted { cycle: result.ticket.cycle });
                    }
                    AttemptOutcome::Stale => {
                        debug!(cycle = result.ticket.cycle, "Attempt from earlier cycle completed");
                    }
                }
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Service stopped");
    let _ = event_tx.send(SchedulerEvent::Stopped);
}

fn launch_attempt(
    runner: &Arc<dyn ReportRunner>,
    ticket: AttemptTicket,
    outcome_tx: &mpsc::Sender<AttemptResult>,
    event_tx: &broadcast::Sender<SchedulerEvent>,
) {
    debug!(cycle = ticket.cycle, "Report run required");
    let _ = event_tx.send(SchedulerEvent::AttemptStarted { cycle: ticket.cycle });

    let runner = runner.clone();
    let outcome_tx = outcome_tx.clone();
    let event_tx = event_tx.clone();
    tokio::spawn(async move {
        let succeeded = match runner.run_report().await {
            Ok(path) => {
                let _ = event_tx.send(SchedulerEvent::ReportWritten { path });
                true
            }
            Err(e) => {
                warn!(kind = e.kind(), cycle = ticket.cycle, "Report attempt failed: {}", e);
                false
            }
        };
        // The loop may already be gone after stop(); the attempt has logged its outcome
        let _ = outcome_tx.send(AttemptResult { ticket, succeeded }).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_per_cycle_from_minutes() {
        let config = SchedulerConfig::from_minutes(15, RetryBudget::Limited(3));
        assert_eq!(config.ticks_per_cycle(), 15 * 12);

        let config = config.with_tick_interval(Duration::from_millis(1_000));
        assert_eq!(config.ticks_per_cycle(), 15 * 60);
    }

    #[test]
    fn test_ticks_per_cycle_never_zero() {
        let config = SchedulerConfig {
            reporting_interval: Duration::from_millis(10),
            tick_interval: Duration::from_millis(100),
            max_retries: RetryBudget::Unbounded,
        };
        assert_eq!(config.ticks_per_cycle(), 1);
    }
}
