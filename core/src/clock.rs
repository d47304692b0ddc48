//! Ledger clock: owns the current calendar date and pause state.

use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerClock {
    /// The last day that was run. Before the first tick this is the
    /// day before the start date.
    pub today:  NaiveDate,
    pub paused: bool,
}

impl LedgerClock {
    /// A paused clock whose first `advance()` lands on `start`.
    pub fn starting_at(start: NaiveDate) -> Self {
        Self {
            today: start.pred_opt().unwrap_or(start),
            paused: true,
        }
    }

    /// Advance one day. Returns the new date.
    /// Panics if called while paused; callers must check.
    pub fn advance(&mut self) -> NaiveDate {
        assert!(!self.paused, "advance() called on paused clock");
        self.today = self.today.succ_opt().unwrap_or(self.today);
        self.today
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }
}
