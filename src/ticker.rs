//! Fixed-cadence tick scheduling for the refresh loop.
//!
//! The ticker does not sleep or spawn anything; the owner asks how long to
//! wait and then polls. Once started it keeps running until dropped.

use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    Stopped,
    Running,
}

#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> TickerState {
        if self.next_due.is_some() {
            TickerState::Running
        } else {
            TickerState::Stopped
        }
    }

    /// Start ticking; the first tick is due one interval after `at`.
    /// Calling again while running leaves the schedule untouched.
    pub fn start(&mut self, at: Instant) {
        if self.next_due.is_none() {
            self.next_due = Some(at + self.interval);
        }
    }

    /// Returns true if a tick is due at `now` and schedules the next one.
    ///
    /// Missed intervals collapse into a single tick; the next deadline stays
    /// on the original cadence.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }

        let mut next = due + self.interval;
        if next <= now && !self.interval.is_zero() {
            let behind = now.duration_since(due).as_nanos() / self.interval.as_nanos();
            let skip = u32::try_from(behind).unwrap_or(u32::MAX);
            next = due + self.interval * skip.saturating_add(1);
        }
        self.next_due = Some(next);
        true
    }

    /// How long until the next tick is due; zero if due or stopped
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_due
            .map(|due| due.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_INTERVAL_MS))
    }
}
