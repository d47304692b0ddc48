//! Read-only views of the collaborators this engine depends on.
//!
//! The subject directory, payment ledger and dimension directories are
//! owned elsewhere. The engine reaches them only through these traits;
//! `LedgerStore` implements all of them over its directory tables.

use crate::{
    error::LedgerResult,
    types::{EntityId, Money, Period, SubjectKind},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    ServiceFee,
    Deposit,
    Commission,
    Salary,
    Bonus,
    MoneySale,
    MoneyRental,
    Penalty,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceFee  => "SERVICE_FEE",
            Self::Deposit     => "DEPOSIT",
            Self::Commission  => "COMMISSION",
            Self::Salary      => "SALARY",
            Self::Bonus       => "BONUS",
            Self::MoneySale   => "MONEY_SALE",
            Self::MoneyRental => "MONEY_RENTAL",
            Self::Penalty     => "PENALTY",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed  => "FAILED",
        }
    }
}

/// The four revenue dimensions a payment is bucketed by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    City,
    District,
    Ward,
    PropertyType,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::City,
        Dimension::District,
        Dimension::Ward,
        Dimension::PropertyType,
    ];
}

/// A property resolved all the way through ward → district → city,
/// plus its type. Only fully resolvable properties produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLocation {
    pub city_id:          EntityId,
    pub district_id:      EntityId,
    pub ward_id:          EntityId,
    pub property_type_id: EntityId,
}

impl PropertyLocation {
    pub fn id_for(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::City         => &self.city_id,
            Dimension::District     => &self.district_id,
            Dimension::Ward         => &self.ward_id,
            Dimension::PropertyType => &self.property_type_id,
        }
    }
}

/// A SUCCESS payment that counts as platform revenue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevenuePayment {
    pub payment_id: EntityId,
    pub amount:     Money,
    pub location:   Option<PropertyLocation>,
}

pub trait SubjectDirectory {
    /// Every currently active subject of `kind`.
    fn active_subjects(&self, kind: SubjectKind) -> LedgerResult<Vec<EntityId>>;
}

pub trait PaymentLedger {
    /// SUCCESS payments dated within `period`, minus the excluded types.
    fn revenue_payments(
        &self,
        period: Period,
        excluded: &[PaymentType],
    ) -> LedgerResult<Vec<RevenuePayment>>;

    /// Contracts signed within `period`.
    fn signed_contract_count(&self, period: Period) -> LedgerResult<i64>;
}

pub trait DimensionDirectory {
    /// Every currently valid id of `dimension`, in stable order.
    fn valid_ids(&self, dimension: Dimension) -> LedgerResult<Vec<EntityId>>;

    /// Human-readable label for chart keys.
    fn dimension_name(&self, dimension: Dimension, id: &str) -> LedgerResult<Option<String>>;
}
