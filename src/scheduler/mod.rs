//! Report Scheduler
//!
//! Runs a report when started and then once per reporting interval. Failed
//! attempts are retried on the following tick until the cycle's retry budget
//! is spent; the budget resets at every reporting boundary.

pub mod runner;
pub mod service;
pub mod state;

pub use runner::ReportRunner;
pub use service::{HostedService, RetryScheduler, SchedulerConfig, SchedulerEvent};
pub use state::{AttemptOutcome, AttemptTicket, RetryBudget, RetryState, SchedulerPhase};
