//! Scheduled job trait and calendar triggers.
//!
//! RULE: Every periodic job implements ScheduledJob.
//! The engine runs due jobs in registration order, once per day.
//! Execution order is fixed and documented in engine.rs.

use crate::{error::LedgerResult, event::LedgerEvent};
use chrono::NaiveDate;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// When a job is due, relative to the calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily,
    MonthStart,
    MonthEnd,
    MonthStartAndEnd,
}

impl Schedule {
    pub fn is_due(&self, today: NaiveDate) -> bool {
        let first = is_first_of_month(today);
        let last = is_last_of_month(today);
        match self {
            Schedule::Daily            => true,
            Schedule::MonthStart       => first,
            Schedule::MonthEnd         => last,
            Schedule::MonthStartAndEnd => first || last,
        }
    }
}

pub fn is_first_of_month(date: NaiveDate) -> bool {
    use chrono::Datelike;
    date.day() == 1
}

pub fn is_last_of_month(date: NaiveDate) -> bool {
    use chrono::Datelike;
    date.succ_opt().map(|d| d.day() == 1).unwrap_or(true)
}

/// The contract every scheduled job must fulfill.
pub trait ScheduledJob: Send {
    /// Unique stable name for this job.
    fn name(&self) -> &'static str;

    fn schedule(&self) -> Schedule;

    /// Run once for `today`. Returns the events to add to the day's log.
    ///
    /// Failures inside an independent phase should be caught and
    /// reported as `LedgerEvent::PhaseFailed`; an `Err` here means the
    /// whole job failed.
    fn run(&mut self, today: NaiveDate) -> LedgerResult<Vec<LedgerEvent>>;

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;
}

/// A job shared between the engine and the report façade. The mutex is
/// the single-flight guard: a run holds it from start to finish.
pub type JobSlot = Arc<Mutex<dyn ScheduledJob>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_boundaries() {
        assert!(Schedule::MonthEnd.is_due(d(2024, 2, 29)));
        assert!(!Schedule::MonthEnd.is_due(d(2023, 2, 27)));
        assert!(Schedule::MonthStart.is_due(d(2025, 1, 1)));
        assert!(Schedule::MonthStartAndEnd.is_due(d(2024, 12, 31)));
        assert!(!Schedule::MonthStartAndEnd.is_due(d(2024, 12, 15)));
    }
}
