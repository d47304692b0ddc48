//! Store methods for monthly and career aggregates.

use super::LedgerStore;
use crate::{
    aggregate::{Aggregate, Counter, Scope},
    error::LedgerResult,
    types::{Period, SubjectKind, Tier},
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

const MONTHLY_COLUMNS: &str =
    "kind, subject_id, year, month, counters_json, monetary, rating_count,
     avg_rating, satisfied_count, score, tier, rank_position";

const CAREER_COLUMNS: &str =
    "kind, subject_id, 0, 0, counters_json, monetary, rating_count,
     avg_rating, satisfied_count, score, tier, rank_position";

/// Columns as read, before the counters JSON is decoded.
struct RawAggregate {
    kind:            String,
    subject_id:      String,
    year:            i32,
    month:           u32,
    counters_json:   String,
    monetary:        i64,
    rating_count:    i64,
    avg_rating:      f64,
    satisfied_count: i64,
    score:           i64,
    tier:            String,
    rank_position:   u32,
}

impl RawAggregate {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            kind:            row.get(0)?,
            subject_id:      row.get(1)?,
            year:            row.get(2)?,
            month:           row.get(3)?,
            counters_json:   row.get(4)?,
            monetary:        row.get(5)?,
            rating_count:    row.get(6)?,
            avg_rating:      row.get(7)?,
            satisfied_count: row.get(8)?,
            score:           row.get(9)?,
            tier:            row.get(10)?,
            rank_position:   row.get(11)?,
        })
    }

    fn into_aggregate(self, career: bool) -> LedgerResult<Aggregate> {
        let counters: BTreeMap<Counter, i64> = serde_json::from_str(&self.counters_json)?;
        let kind = SubjectKind::parse(&self.kind).ok_or_else(|| {
            anyhow::anyhow!("unknown subject kind '{}' for {}", self.kind, self.subject_id)
        })?;
        let tier = Tier::parse(&self.tier).ok_or_else(|| {
            anyhow::anyhow!("unknown tier '{}' for {}", self.tier, self.subject_id)
        })?;
        let scope = if career {
            Scope::Career
        } else {
            Scope::Month { period: Period::new(self.month, self.year)? }
        };
        Ok(Aggregate {
            kind,
            subject_id: self.subject_id,
            scope,
            counters,
            monetary: self.monetary,
            rating_count: self.rating_count,
            avg_rating: self.avg_rating,
            satisfied_count: self.satisfied_count,
            score: self.score,
            tier,
            rank_position: self.rank_position,
        })
    }
}

/// Upsert one aggregate on `conn` (a plain connection or a transaction).
fn write_aggregate(conn: &Connection, agg: &Aggregate) -> LedgerResult<()> {
    let counters_json = serde_json::to_string(&agg.counters)?;
    match agg.scope {
        Scope::Month { period } => {
            conn.execute(
                "INSERT INTO monthly_aggregate (
                    kind, subject_id, year, month, counters_json, monetary, rating_count,
                    avg_rating, satisfied_count, score, tier, rank_position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(kind, subject_id, year, month) DO UPDATE SET
                    counters_json   = excluded.counters_json,
                    monetary        = excluded.monetary,
                    rating_count    = excluded.rating_count,
                    avg_rating      = excluded.avg_rating,
                    satisfied_count = excluded.satisfied_count,
                    score           = excluded.score,
                    tier            = excluded.tier,
                    rank_position   = excluded.rank_position",
                params![
                    agg.kind.as_str(),
                    agg.subject_id,
                    period.year(),
                    period.month(),
                    counters_json,
                    agg.monetary,
                    agg.rating_count,
                    agg.avg_rating,
                    agg.satisfied_count,
                    agg.score,
                    agg.tier.as_str(),
                    agg.rank_position,
                ],
            )?;
        }
        Scope::Career => {
            conn.execute(
                "INSERT INTO career_aggregate (
                    kind, subject_id, counters_json, monetary, rating_count,
                    avg_rating, satisfied_count, score, tier, rank_position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(kind, subject_id) DO UPDATE SET
                    counters_json   = excluded.counters_json,
                    monetary        = excluded.monetary,
                    rating_count    = excluded.rating_count,
                    avg_rating      = excluded.avg_rating,
                    satisfied_count = excluded.satisfied_count,
                    score           = excluded.score,
                    tier            = excluded.tier,
                    rank_position   = excluded.rank_position",
                params![
                    agg.kind.as_str(),
                    agg.subject_id,
                    counters_json,
                    agg.monetary,
                    agg.rating_count,
                    agg.avg_rating,
                    agg.satisfied_count,
                    agg.score,
                    agg.tier.as_str(),
                    agg.rank_position,
                ],
            )?;
        }
    }
    Ok(())
}

impl LedgerStore {
    pub fn monthly_aggregate(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        period: Period,
    ) -> LedgerResult<Option<Aggregate>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {MONTHLY_COLUMNS} FROM monthly_aggregate
                     WHERE kind = ?1 AND subject_id = ?2 AND year = ?3 AND month = ?4"
                ),
                params![kind.as_str(), subject_id, period.year(), period.month()],
                RawAggregate::from_row,
            )
            .optional()?;
        raw.map(|r| r.into_aggregate(false)).transpose()
    }

    pub fn career_aggregate(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> LedgerResult<Option<Aggregate>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CAREER_COLUMNS} FROM career_aggregate
                     WHERE kind = ?1 AND subject_id = ?2"
                ),
                params![kind.as_str(), subject_id],
                RawAggregate::from_row,
            )
            .optional()?;
        raw.map(|r| r.into_aggregate(true)).transpose()
    }

    /// Insert or overwrite one aggregate.
    pub fn save_aggregate(&self, agg: &Aggregate) -> LedgerResult<()> {
        write_aggregate(&self.conn, agg)
    }

    /// Persist many aggregates in one transaction.
    pub fn save_aggregates(&self, aggs: &[Aggregate]) -> LedgerResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for agg in aggs {
            write_aggregate(&tx, agg)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Write back only score and tier, leaving counters that an action
    /// may have touched since the records were read.
    pub fn save_scores(&self, aggs: &[Aggregate]) -> LedgerResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for agg in aggs {
            match agg.scope {
                Scope::Month { period } => tx.execute(
                    "UPDATE monthly_aggregate SET score = ?1, tier = ?2
                     WHERE kind = ?3 AND subject_id = ?4 AND year = ?5 AND month = ?6",
                    params![
                        agg.score,
                        agg.tier.as_str(),
                        agg.kind.as_str(),
                        agg.subject_id,
                        period.year(),
                        period.month()
                    ],
                )?,
                Scope::Career => tx.execute(
                    "UPDATE career_aggregate SET score = ?1, tier = ?2
                     WHERE kind = ?3 AND subject_id = ?4",
                    params![agg.score, agg.tier.as_str(), agg.kind.as_str(), agg.subject_id],
                )?,
            };
        }
        tx.commit()?;
        Ok(())
    }

    /// Persist a cohort's rank positions in one batch.
    pub fn save_rank_positions(&self, aggs: &[Aggregate]) -> LedgerResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for agg in aggs {
            match agg.scope {
                Scope::Month { period } => tx.execute(
                    "UPDATE monthly_aggregate SET rank_position = ?1
                     WHERE kind = ?2 AND subject_id = ?3 AND year = ?4 AND month = ?5",
                    params![
                        agg.rank_position,
                        agg.kind.as_str(),
                        agg.subject_id,
                        period.year(),
                        period.month()
                    ],
                )?,
                Scope::Career => tx.execute(
                    "UPDATE career_aggregate SET rank_position = ?1
                     WHERE kind = ?2 AND subject_id = ?3",
                    params![agg.rank_position, agg.kind.as_str(), agg.subject_id],
                )?,
            };
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert `agg` only if no record with its natural key exists.
    /// Returns true when a row was created.
    pub fn insert_aggregate_if_missing(&self, agg: &Aggregate) -> LedgerResult<bool> {
        let counters_json = serde_json::to_string(&agg.counters)?;
        let inserted = match agg.scope {
            Scope::Month { period } => self.conn.execute(
                "INSERT OR IGNORE INTO monthly_aggregate (
                    kind, subject_id, year, month, counters_json, tier
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    agg.kind.as_str(),
                    agg.subject_id,
                    period.year(),
                    period.month(),
                    counters_json,
                    agg.tier.as_str(),
                ],
            )?,
            Scope::Career => self.conn.execute(
                "INSERT OR IGNORE INTO career_aggregate (kind, subject_id, counters_json, tier)
                 VALUES (?1, ?2, ?3, ?4)",
                params![agg.kind.as_str(), agg.subject_id, counters_json, agg.tier.as_str()],
            )?,
        };
        Ok(inserted > 0)
    }

    /// Every monthly record of `kind`, oldest period first.
    pub fn monthly_aggregates(&self, kind: SubjectKind) -> LedgerResult<Vec<Aggregate>> {
        self.query_aggregates(
            &format!(
                "SELECT {MONTHLY_COLUMNS} FROM monthly_aggregate
                 WHERE kind = ?1 ORDER BY year, month, subject_id"
            ),
            params![kind.as_str()],
            false,
        )
    }

    /// The monthly cohort of `kind` for one period.
    pub fn monthly_cohort(&self, kind: SubjectKind, period: Period) -> LedgerResult<Vec<Aggregate>> {
        self.query_aggregates(
            &format!(
                "SELECT {MONTHLY_COLUMNS} FROM monthly_aggregate
                 WHERE kind = ?1 AND year = ?2 AND month = ?3 ORDER BY subject_id"
            ),
            params![kind.as_str(), period.year(), period.month()],
            false,
        )
    }

    pub fn career_aggregates(&self, kind: SubjectKind) -> LedgerResult<Vec<Aggregate>> {
        self.query_aggregates(
            &format!(
                "SELECT {CAREER_COLUMNS} FROM career_aggregate
                 WHERE kind = ?1 ORDER BY subject_id"
            ),
            params![kind.as_str()],
            true,
        )
    }

    pub fn monthly_aggregate_count(&self, kind: SubjectKind) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM monthly_aggregate WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn career_aggregate_count(&self, kind: SubjectKind) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM career_aggregate WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Subjects whose first monthly record is in `period`.
    pub fn newly_seen_subjects(&self, kind: SubjectKind, period: Period) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM monthly_aggregate m
             WHERE m.kind = ?1 AND m.year = ?2 AND m.month = ?3
               AND NOT EXISTS (
                   SELECT 1 FROM monthly_aggregate e
                   WHERE e.kind = m.kind AND e.subject_id = m.subject_id
                     AND (e.year * 12 + e.month) < (?2 * 12 + ?3)
               )",
            params![kind.as_str(), period.year(), period.month()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_aggregates(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        career: bool,
    ) -> LedgerResult<Vec<Aggregate>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws = stmt
            .query_map(params, RawAggregate::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(|r| r.into_aggregate(career)).collect()
    }
}
