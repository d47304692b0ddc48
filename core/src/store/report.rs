//! Store methods for financial report documents.

use super::LedgerStore;
use crate::{error::LedgerResult, report::FinancialReport, types::Period};
use rusqlite::{params, OptionalExtension};

impl LedgerStore {
    pub fn load_report(&self, period: Period) -> LedgerResult<Option<FinancialReport>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT report_json FROM financial_report WHERE year = ?1 AND month = ?2",
                params![period.year(), period.month()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(Into::into))
            .transpose()
    }

    /// Persist `report` as the document for its period, replacing any
    /// previous version. A report without an identity is given one.
    pub fn save_report(&self, report: &mut FinancialReport) -> LedgerResult<()> {
        let report_id = report
            .report_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        let json = serde_json::to_string(report)?;
        self.conn.execute(
            "INSERT INTO financial_report (year, month, report_id, report_json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(year, month) DO UPDATE SET
                report_id   = excluded.report_id,
                report_json = excluded.report_json",
            params![report.period.year(), report.period.month(), report_id, json],
        )?;
        Ok(())
    }

    /// Every stored report of `year`, January first.
    pub fn reports_for_year(&self, year: i32) -> LedgerResult<Vec<FinancialReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_json FROM financial_report WHERE year = ?1 ORDER BY month",
        )?;
        let docs = stmt
            .query_map(params![year], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        docs.iter()
            .map(|j| serde_json::from_str(j).map_err(Into::into))
            .collect()
    }

    pub fn report_count(&self) -> LedgerResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM financial_report", [], |row| row.get(0))?;
        Ok(count)
    }
}
