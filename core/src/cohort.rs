//! Cohort reports: per-kind monthly statistics over the aggregate records.

use crate::{
    aggregate::Aggregate,
    error::LedgerResult,
    event::LedgerEvent,
    job::{Schedule, ScheduledJob},
    store::{CohortReportRow, LedgerStore},
    types::{Money, Period, SubjectKind},
};
use chrono::NaiveDate;

/// Summarise one monthly cohort. `new_subjects` is supplied by the caller.
pub fn summarise(
    kind: SubjectKind,
    period: Period,
    cohort: &[Aggregate],
    new_subjects: i64,
) -> CohortReportRow {
    let total_subjects = cohort.len() as i64;
    let total_monetary: Money = cohort.iter().map(|a| a.monetary).sum();
    let total_rates: i64 = cohort.iter().map(|a| a.rating_count).sum();
    let rating_sum: f64 = cohort.iter().map(|a| a.avg_rating * a.rating_count as f64).sum();
    let satisfied: i64 = cohort.iter().map(|a| a.satisfied_count).sum();

    CohortReportRow {
        kind,
        period,
        total_subjects,
        new_subjects,
        total_monetary,
        avg_monetary: if total_subjects > 0 { total_monetary / total_subjects } else { 0 },
        total_rates,
        avg_rating: if total_rates > 0 { rating_sum / total_rates as f64 } else { 0.0 },
        avg_satisfaction: if total_rates > 0 {
            satisfied as f64 * 100.0 / total_rates as f64
        } else {
            0.0
        },
    }
}

pub struct CohortReporter {
    store: LedgerStore,
}

impl CohortReporter {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Rebuild and persist the report for (`kind`, `period`).
    pub fn generate(&mut self, kind: SubjectKind, period: Period) -> LedgerResult<CohortReportRow> {
        let cohort = self.store.monthly_cohort(kind, period)?;
        let new_subjects = self.store.newly_seen_subjects(kind, period)?;
        let row = summarise(kind, period, &cohort, new_subjects);
        self.store.save_cohort_report(&row)?;
        log::debug!("{kind} {period}: cohort of {}", row.total_subjects);
        Ok(row)
    }
}

impl ScheduledJob for CohortReporter {
    fn name(&self) -> &'static str {
        "cohort_reports"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Daily
    }

    fn run(&mut self, today: NaiveDate) -> LedgerResult<Vec<LedgerEvent>> {
        let period = Period::of(today);
        let mut events = Vec::new();
        for kind in SubjectKind::ALL {
            match self.generate(kind, period) {
                Ok(row) => events.push(LedgerEvent::CohortReportGenerated {
                    kind,
                    period,
                    subjects: row.total_subjects,
                }),
                Err(e) => {
                    log::error!("cohort report for {kind} {period} failed: {e}");
                    events.push(LedgerEvent::PhaseFailed {
                        job: self.name().to_string(),
                        phase: kind.as_str().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
