//! Retry/cycle bookkeeping for the report scheduler
//!
//! Pure state machine, no timers or I/O. The scheduler loop owns the only
//! instance and feeds it ticks and attempt outcomes.

/// Consecutive-failure budget per reporting cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    Limited(u32),
    Unbounded,
}

impl RetryBudget {
    /// Configuration value meaning "retry until success within the cycle"
    pub const UNBOUNDED_SENTINEL: i64 = -1;

    /// Map a configured integer onto a budget. Negative values other than the
    /// sentinel are rejected.
    pub fn from_setting(value: i64) -> Option<Self> {
        match value {
            Self::UNBOUNDED_SENTINEL => Some(Self::Unbounded),
            n if n >= 0 => u32::try_from(n).ok().map(Self::Limited),
            _ => None,
        }
    }
}

impl std::fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{}", n),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Waiting for the next reporting boundary
    Idle,
    /// A report must run on the next opportunity
    DueImmediately,
    /// An attempt is in flight
    Running,
}

/// Issued when an attempt starts; handed back with its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTicket {
    pub cycle: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    /// Failed; the next tick retries. `None` remaining means unbounded.
    RetryScheduled { retries_remaining: Option<u32> },
    /// Failed and the cycle's budget is spent
    Exhausted,
    /// Outcome of an attempt launched in an earlier cycle; budget untouched
    Stale,
}

/// Cycle number carried by the start-up attempt, which precedes the first cycle
pub const STARTUP_CYCLE: u64 = 0;

#[derive(Debug, Clone)]
pub struct RetryState {
    ticks_per_cycle: u64,
    budget: RetryBudget,
    ticks_remaining: u64,
    retries_remaining: RetryBudget,
    due: bool,
    in_flight: Option<u64>,
    cycle: u64,
}

impl RetryState {
    pub fn new(ticks_per_cycle: u64, budget: RetryBudget) -> Self {
        let ticks_per_cycle = ticks_per_cycle.max(1);
        Self {
            ticks_per_cycle,
            budget,
            ticks_remaining: ticks_per_cycle,
            retries_remaining: budget,
            due: false,
            in_flight: None,
            cycle: 0,
        }
    }

    /// Start a new cycle: both counters back to their configured values
    pub fn reset_cycle(&mut self) {
        self.ticks_remaining = self.ticks_per_cycle;
        self.retries_remaining = self.budget;
        self.cycle += 1;
    }

    /// Claim the one start-up attempt. It sits outside every cycle's budget,
    /// so callers follow it with [`RetryState::reset_cycle`].
    ///
    /// Returns `None` once any cycle has begun.
    pub fn begin_startup_attempt(&mut self) -> Option<AttemptTicket> {
        if self.cycle != STARTUP_CYCLE || self.in_flight.is_some() {
            return None;
        }
        self.in_flight = Some(STARTUP_CYCLE);
        Some(AttemptTicket {
            cycle: STARTUP_CYCLE,
        })
    }

    pub fn mark_due(&mut self) {
        self.due = true;
    }

    /// Advance one tick. Returns `true` when a reporting boundary was reached,
    /// in which case a report is due and a fresh cycle has begun.
    pub fn tick(&mut self) -> bool {
        self.ticks_remaining = self.ticks_remaining.saturating_sub(1);
        if self.ticks_remaining == 0 {
            self.due = true;
            self.reset_cycle();
            return true;
        }
        false
    }

    /// Claim the due flag for a new attempt.
    ///
    /// Returns `None` when nothing is due or an attempt is already in flight;
    /// in the latter case the due flag is kept and no budget is consumed.
    pub fn try_begin_attempt(&mut self) -> Option<AttemptTicket> {
        if !self.due || self.in_flight.is_some() {
            return None;
        }
        self.due = false;
        self.in_flight = Some(self.cycle);
        Some(AttemptTicket { cycle: self.cycle })
    }

    pub fn complete_attempt(&mut self, ticket: AttemptTicket, succeeded: bool) -> AttemptOutcome {
        if self.in_flight == Some(ticket.cycle) {
            self.in_flight = None;
        }

        // Start-up outcomes only count until the first boundary
        if ticket.cycle == STARTUP_CYCLE && self.cycle == STARTUP_CYCLE + 1 {
            return self.complete_startup(succeeded);
        }
        if ticket.cycle != self.cycle {
            return AttemptOutcome::Stale;
        }
        if succeeded {
            return AttemptOutcome::Succeeded;
        }

        match self.retries_remaining {
            RetryBudget::Unbounded => {
                self.due = true;
                AttemptOutcome::RetryScheduled {
                    retries_remaining: None,
                }
            }
            RetryBudget::Limited(n) => {
                let remaining = n.saturating_sub(1);
                self.retries_remaining = RetryBudget::Limited(remaining);
                if remaining > 0 {
                    self.due = true;
                    AttemptOutcome::RetryScheduled {
                        retries_remaining: Some(remaining),
                    }
                } else {
                    AttemptOutcome::Exhausted
                }
            }
        }
    }

    /// A failed start-up attempt counts as the first of `n` tries, so a retry
    /// follows only when `n > 1`. The cycle budget itself is left intact.
    fn complete_startup(&mut self, succeeded: bool) -> AttemptOutcome {
        if succeeded {
            return AttemptOutcome::Succeeded;
        }
        match self.budget {
            RetryBudget::Unbounded => {
                self.due = true;
                AttemptOutcome::RetryScheduled {
                    retries_remaining: None,
                }
            }
            RetryBudget::Limited(n) if n > 1 => {
                self.due = true;
                AttemptOutcome::RetryScheduled {
                    retries_remaining: Some(n),
                }
            }
            RetryBudget::Limited(_) => AttemptOutcome::Exhausted,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.in_flight.is_some() {
            SchedulerPhase::Running
        } else if self.due {
            SchedulerPhase::DueImmediately
        } else {
            SchedulerPhase::Idle
        }
    }

    pub fn is_due(&self) -> bool {
        self.due
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn ticks_remaining(&self) -> u64 {
        self.ticks_remaining
    }

    pub fn retries_remaining(&self) -> RetryBudget {
        self.retries_remaining
    }
}
