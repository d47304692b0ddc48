//! Directory tables: subjects, locations, property types, properties,
//! payments and contracts. The engine reads them only through the
//! traits in `crate::directory`; the insert helpers feed tests and the
//! synthetic workload.

use super::LedgerStore;
use crate::{
    directory::{
        Dimension, DimensionDirectory, PaymentLedger, PaymentStatus, PaymentType,
        PropertyLocation, RevenuePayment, SubjectDirectory,
    },
    error::LedgerResult,
    types::{EntityId, Money, Period, SubjectKind},
};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

/// A payment as inserted by the workload or a test.
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub payment_id:   &'a str,
    pub property_id:  Option<&'a str>,
    pub amount:       Money,
    pub payment_type: PaymentType,
    pub status:       PaymentStatus,
    pub paid_on:      NaiveDate,
}

impl LedgerStore {
    // ── Subjects ─────────────────────────────────────────────────

    pub fn insert_subject(&self, subject_id: &str, kind: SubjectKind, name: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO subject (subject_id, kind, display_name, active) VALUES (?1, ?2, ?3, 1)",
            params![subject_id, kind.as_str(), name],
        )?;
        Ok(())
    }

    pub fn set_subject_active(&self, subject_id: &str, active: bool) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE subject SET active = ?1 WHERE subject_id = ?2",
            params![if active { 1i64 } else { 0i64 }, subject_id],
        )?;
        Ok(())
    }

    // ── Locations and property types ─────────────────────────────

    pub fn insert_city(&self, city_id: &str, name: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO city (city_id, name) VALUES (?1, ?2)",
            params![city_id, name],
        )?;
        Ok(())
    }

    pub fn delete_city(&self, city_id: &str) -> LedgerResult<()> {
        self.conn.execute("DELETE FROM city WHERE city_id = ?1", params![city_id])?;
        Ok(())
    }

    pub fn insert_district(&self, district_id: &str, city_id: &str, name: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO district (district_id, city_id, name) VALUES (?1, ?2, ?3)",
            params![district_id, city_id, name],
        )?;
        Ok(())
    }

    pub fn insert_ward(&self, ward_id: &str, district_id: &str, name: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO ward (ward_id, district_id, name) VALUES (?1, ?2, ?3)",
            params![ward_id, district_id, name],
        )?;
        Ok(())
    }

    pub fn insert_property_type(&self, property_type_id: &str, name: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO property_type (property_type_id, name, available) VALUES (?1, ?2, 1)",
            params![property_type_id, name],
        )?;
        Ok(())
    }

    pub fn set_property_type_available(&self, property_type_id: &str, available: bool) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE property_type SET available = ?1 WHERE property_type_id = ?2",
            params![if available { 1i64 } else { 0i64 }, property_type_id],
        )?;
        Ok(())
    }

    // ── Properties, payments, contracts ──────────────────────────

    pub fn insert_property(
        &self,
        property_id: &str,
        ward_id: Option<&str>,
        property_type_id: Option<&str>,
        owner_id: Option<&str>,
        agent_id: Option<&str>,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO property (property_id, ward_id, property_type_id, owner_id, agent_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![property_id, ward_id, property_type_id, owner_id, agent_id],
        )?;
        Ok(())
    }

    pub fn insert_payment(&self, p: &NewPayment<'_>) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO payment (payment_id, property_id, amount, payment_type, status, paid_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                p.payment_id,
                p.property_id,
                p.amount,
                p.payment_type.as_str(),
                p.status.as_str(),
                p.paid_on.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_contract(
        &self,
        contract_id: &str,
        property_id: Option<&str>,
        signed_on: NaiveDate,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO contract (contract_id, property_id, signed_on) VALUES (?1, ?2, ?3)",
            params![contract_id, property_id, signed_on.to_string()],
        )?;
        Ok(())
    }

    pub fn payment_count(&self) -> LedgerResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM payment", [], |row| row.get(0))?;
        Ok(count)
    }

    fn ids(&self, sql: &str, params: impl rusqlite::Params) -> LedgerResult<Vec<EntityId>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl SubjectDirectory for LedgerStore {
    fn active_subjects(&self, kind: SubjectKind) -> LedgerResult<Vec<EntityId>> {
        self.ids(
            "SELECT subject_id FROM subject WHERE kind = ?1 AND active = 1 ORDER BY subject_id",
            params![kind.as_str()],
        )
    }
}

impl PaymentLedger for LedgerStore {
    fn revenue_payments(
        &self,
        period: Period,
        excluded: &[PaymentType],
    ) -> LedgerResult<Vec<RevenuePayment>> {
        // The exclusion list is short and fixed by config; filter it here
        // rather than building a variable-length IN clause.
        let mut stmt = self.conn.prepare(
            "SELECT p.payment_id, p.amount, p.payment_type,
                    c.city_id, d.district_id, w.ward_id, t.property_type_id
             FROM payment p
             LEFT JOIN property pr     ON pr.property_id = p.property_id
             LEFT JOIN ward w          ON w.ward_id = pr.ward_id
             LEFT JOIN district d      ON d.district_id = w.district_id
             LEFT JOIN city c          ON c.city_id = d.city_id
             LEFT JOIN property_type t ON t.property_type_id = pr.property_type_id
             WHERE p.status = 'SUCCESS'
               AND p.paid_on >= ?1 AND p.paid_on < ?2
             ORDER BY p.paid_on, p.payment_id",
        )?;
        let rows = stmt
            .query_map(
                params![
                    period.first_day().to_string(),
                    period.end_exclusive().to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let payments = rows
            .into_iter()
            .filter(|(_, _, ptype, ..)| !excluded.iter().any(|e| e.as_str() == ptype.as_str()))
            .map(|(payment_id, amount, _, city, district, ward, ptype)| {
                let location = match (city, district, ward, ptype) {
                    (Some(city_id), Some(district_id), Some(ward_id), Some(property_type_id)) => {
                        Some(PropertyLocation { city_id, district_id, ward_id, property_type_id })
                    }
                    _ => None,
                };
                RevenuePayment { payment_id, amount, location }
            })
            .collect();
        Ok(payments)
    }

    fn signed_contract_count(&self, period: Period) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM contract WHERE signed_on >= ?1 AND signed_on < ?2",
            params![
                period.first_day().to_string(),
                period.end_exclusive().to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl DimensionDirectory for LedgerStore {
    fn valid_ids(&self, dimension: Dimension) -> LedgerResult<Vec<EntityId>> {
        let sql = match dimension {
            Dimension::City => "SELECT city_id FROM city ORDER BY city_id",
            Dimension::District => "SELECT district_id FROM district ORDER BY district_id",
            Dimension::Ward => "SELECT ward_id FROM ward ORDER BY ward_id",
            Dimension::PropertyType => {
                "SELECT property_type_id FROM property_type WHERE available = 1
                 ORDER BY property_type_id"
            }
        };
        self.ids(sql, [])
    }

    fn dimension_name(&self, dimension: Dimension, id: &str) -> LedgerResult<Option<String>> {
        let sql = match dimension {
            Dimension::City => "SELECT name FROM city WHERE city_id = ?1",
            Dimension::District => "SELECT name FROM district WHERE district_id = ?1",
            Dimension::Ward => "SELECT name FROM ward WHERE ward_id = ?1",
            Dimension::PropertyType => {
                "SELECT name FROM property_type WHERE property_type_id = ?1"
            }
        };
        let name = self
            .conn
            .query_row(sql, params![id], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(name)
    }
}
