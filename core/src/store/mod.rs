//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Jobs call store methods; they never execute SQL directly.

use crate::{
    error::LedgerResult,
    event::EventLogEntry,
};
use chrono::NaiveDate;
use rusqlite::{params, types::Type, Connection, Transaction, TransactionBehavior};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

mod aggregate;
mod cohort;
mod directory;
mod report;

pub use cohort::CohortReportRow;
pub use directory::NewPayment;

pub struct LedgerStore {
    conn: Connection,
    path: String,
    // Keeps a scratch database's directory alive until the last
    // connection to it is dropped.
    scratch: Option<Arc<TempDir>>,
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        // Readers never block the writer; writers wait for each other.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: path.to_string(),
            scratch: None,
        })
    }

    /// A fresh database in its own temporary directory, removed once every
    /// connection to it is gone. Used for `--db :memory:` runs and tests.
    /// Connections opened with `reopen` share it and wait on each other's
    /// locks like any file database.
    pub fn temporary() -> LedgerResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("tierledger-")
            .tempdir()
            .map_err(|e| anyhow::anyhow!("cannot create scratch directory: {e}"))?;
        let path = dir.path().join("ledger.db");
        let path = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("scratch path is not UTF-8: {}", path.display()))?
            .to_string();
        let mut store = Self::open(&path)?;
        store.scratch = Some(Arc::new(dir));
        Ok(store)
    }

    /// Open a second connection to the same database.
    pub fn reopen(&self) -> LedgerResult<Self> {
        let mut store = Self::open(&self.path)?;
        store.scratch = self.scratch.clone();
        Ok(store)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `f` inside one write transaction, taken before `f` reads
    /// anything. Another connection's read-modify-write of the same rows
    /// waits until this one commits. Rolled back if `f` fails.
    pub fn atomically<T>(&self, f: impl FnOnce() -> LedgerResult<T>) -> LedgerResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f()?;
        tx.commit()?;
        Ok(value)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_directory.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_aggregates.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_reports.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (occurred_on, job, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.date.to_string(),
                entry.job,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_on(&self, date: NaiveDate) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, occurred_on, job, event_type, payload
             FROM event_log WHERE occurred_on = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![date.to_string()], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    date: parse_date(1, &row.get::<_, String>(1)?)?,
                    job: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Dates are written by this store as ISO `YYYY-MM-DD`.
fn parse_date(column: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    s.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
