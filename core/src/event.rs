//! Ledger events: what each scheduled job did on a given day.
//!
//! Every event returned by a job is persisted to the event log by the
//! engine, including the failures it caught.

use crate::types::{Money, Period, SubjectKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    Monthly,
    Career,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Engine events ──────────────────────────────
    DayStarted {
        date: NaiveDate,
    },
    DayCompleted {
        date: NaiveDate,
    },

    // ── Ranking events ─────────────────────────────
    AggregatesEnsured {
        kind: SubjectKind,
        period: Period,
        created_monthly: usize,
        created_career: usize,
    },
    ScoresRecomputed {
        kind: SubjectKind,
        monthly_records: usize,
        career_records: usize,
    },
    RanksAssigned {
        kind: SubjectKind,
        cohort: Cohort,
        ranked: usize,
    },

    // ── Report events ──────────────────────────────
    CohortReportGenerated {
        kind: SubjectKind,
        period: Period,
        subjects: i64,
    },
    FinancialReportRefreshed {
        period: Period,
        total_revenue: Money,
        payments: usize,
        created: bool,
    },
    SalaryFinalized {
        period: Period,
        agents_paid: usize,
        month_salary: Money,
    },

    // ── Failures caught and contained ──────────────
    PhaseFailed {
        job: String,
        phase: String,
        error: String,
    },
    JobFailed {
        job: String,
        error: String,
    },
}

impl LedgerEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            LedgerEvent::DayStarted { .. }               => "day_started",
            LedgerEvent::DayCompleted { .. }             => "day_completed",
            LedgerEvent::AggregatesEnsured { .. }        => "aggregates_ensured",
            LedgerEvent::ScoresRecomputed { .. }         => "scores_recomputed",
            LedgerEvent::RanksAssigned { .. }            => "ranks_assigned",
            LedgerEvent::CohortReportGenerated { .. }    => "cohort_report_generated",
            LedgerEvent::FinancialReportRefreshed { .. } => "financial_report_refreshed",
            LedgerEvent::SalaryFinalized { .. }          => "salary_finalized",
            LedgerEvent::PhaseFailed { .. }              => "phase_failed",
            LedgerEvent::JobFailed { .. }                => "job_failed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub date:       NaiveDate,
    pub job:        String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized LedgerEvent
}
