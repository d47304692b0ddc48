//! Store methods for per-kind monthly cohort reports.

use super::LedgerStore;
use crate::{
    error::LedgerResult,
    types::{Money, Period, SubjectKind},
};
use rusqlite::{params, types::Type, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CohortReportRow {
    pub kind:             SubjectKind,
    pub period:           Period,
    pub total_subjects:   i64,
    pub new_subjects:     i64,
    pub total_monetary:   Money,
    pub avg_monetary:     Money,
    pub total_rates:      i64,
    pub avg_rating:       f64,
    pub avg_satisfaction: f64,
}

fn row_to_cohort(kind: SubjectKind, row: &Row<'_>) -> rusqlite::Result<CohortReportRow> {
    let period = Period::new(row.get(1)?, row.get(0)?).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(e))
    })?;
    Ok(CohortReportRow {
        kind,
        period,
        total_subjects: row.get(2)?,
        new_subjects: row.get(3)?,
        total_monetary: row.get(4)?,
        avg_monetary: row.get(5)?,
        total_rates: row.get(6)?,
        avg_rating: row.get(7)?,
        avg_satisfaction: row.get(8)?,
    })
}

impl LedgerStore {
    pub fn save_cohort_report(&self, r: &CohortReportRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO cohort_report (
                kind, year, month, total_subjects, new_subjects, total_monetary,
                avg_monetary, total_rates, avg_rating, avg_satisfaction
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(kind, year, month) DO UPDATE SET
                total_subjects   = excluded.total_subjects,
                new_subjects     = excluded.new_subjects,
                total_monetary   = excluded.total_monetary,
                avg_monetary     = excluded.avg_monetary,
                total_rates      = excluded.total_rates,
                avg_rating       = excluded.avg_rating,
                avg_satisfaction = excluded.avg_satisfaction",
            params![
                r.kind.as_str(),
                r.period.year(),
                r.period.month(),
                r.total_subjects,
                r.new_subjects,
                r.total_monetary,
                r.avg_monetary,
                r.total_rates,
                r.avg_rating,
                r.avg_satisfaction,
            ],
        )?;
        Ok(())
    }

    pub fn cohort_report(
        &self,
        kind: SubjectKind,
        period: Period,
    ) -> LedgerResult<Option<CohortReportRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT year, month, total_subjects, new_subjects, total_monetary,
                        avg_monetary, total_rates, avg_rating, avg_satisfaction
                 FROM cohort_report WHERE kind = ?1 AND year = ?2 AND month = ?3",
                params![kind.as_str(), period.year(), period.month()],
                |row| row_to_cohort(kind, row),
            )
            .optional()?;
        Ok(row)
    }

    /// Every cohort report of `kind` in `year`, January first.
    pub fn cohort_reports_for_year(
        &self,
        kind: SubjectKind,
        year: i32,
    ) -> LedgerResult<Vec<CohortReportRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT year, month, total_subjects, new_subjects, total_monetary,
                    avg_monetary, total_rates, avg_rating, avg_satisfaction
             FROM cohort_report WHERE kind = ?1 AND year = ?2 ORDER BY month",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str(), year], |row| row_to_cohort(kind, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
