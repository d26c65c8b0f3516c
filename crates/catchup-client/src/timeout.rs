//! Time budgets and backoff for retried requests.

use std::time::Duration;

use tokio::time::Instant;

/// A total-time budget for retrying one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaximumTotalTime {
    budget: Duration,
}

impl MaximumTotalTime {
    pub const fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Start the clock for one request.
    pub fn start(&self) -> TerminationCondition {
        TerminationCondition {
            started: Instant::now(),
            budget: self.budget,
        }
    }
}

/// A running budget.
#[derive(Debug, Clone, Copy)]
pub struct TerminationCondition {
    started: Instant,
    budget: Duration,
}

impl TerminationCondition {
    pub fn can_continue(&self) -> bool {
        self.started.elapsed() < self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Doubling delay between retries, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let shift = self.attempt.min(16);
        self.attempt = self.attempt.saturating_add(1);
        self.initial.saturating_mul(1u32 << shift).min(self.max)
    }
}
