//! Period and career aggregate records.
//!
//! One record shape serves all three subject kinds and both scopes.
//! A monthly record is keyed by (kind, subject, month, year), a career
//! record by (kind, subject). Records are created lazily with every
//! counter at zero and the tier at BRONZE.

use crate::types::{EntityId, Money, Period, SubjectKind, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every activity counter across all subject kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    // agent
    PropertiesAssigned,
    HandlingProperties,
    AppointmentsAssigned,
    AppointmentsCompleted,
    // agent and customer
    ContractsSigned,
    // customer
    ViewingsRequested,
    ViewingsAttended,
    Purchases,
    Rentals,
    // owner
    PropertiesListed,
    ListedForSale,
    ListedForRent,
    PropertiesSold,
    PropertiesRented,
}

impl Counter {
    /// The counters a record of `kind` starts with.
    pub fn for_kind(kind: SubjectKind) -> &'static [Counter] {
        match kind {
            SubjectKind::Agent => &[
                Counter::PropertiesAssigned,
                Counter::HandlingProperties,
                Counter::AppointmentsAssigned,
                Counter::AppointmentsCompleted,
                Counter::ContractsSigned,
            ],
            SubjectKind::Customer => &[
                Counter::ViewingsRequested,
                Counter::ViewingsAttended,
                Counter::Purchases,
                Counter::Rentals,
                Counter::ContractsSigned,
            ],
            SubjectKind::Owner => &[
                Counter::PropertiesListed,
                Counter::ListedForSale,
                Counter::ListedForRent,
                Counter::PropertiesSold,
                Counter::PropertiesRented,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    Month { period: Period },
    Career,
}

impl Scope {
    pub fn period(&self) -> Option<Period> {
        match self {
            Scope::Month { period } => Some(*period),
            Scope::Career => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    pub kind:            SubjectKind,
    pub subject_id:      EntityId,
    pub scope:           Scope,
    pub counters:        BTreeMap<Counter, i64>,
    /// Spending (customers), contribution value (owners); unused for agents.
    pub monetary:        Money,
    pub rating_count:    i64,
    pub avg_rating:      f64,
    /// Ratings strictly above 3 stars.
    pub satisfied_count: i64,
    pub score:           i64,
    pub tier:            Tier,
    /// 1-based; 0 until the first ranking pass.
    pub rank_position:   u32,
}

impl Aggregate {
    fn zeroed(kind: SubjectKind, subject_id: &str, scope: Scope) -> Self {
        Self {
            kind,
            subject_id: subject_id.to_string(),
            scope,
            counters: Counter::for_kind(kind).iter().map(|c| (*c, 0)).collect(),
            monetary: 0,
            rating_count: 0,
            avg_rating: 0.0,
            satisfied_count: 0,
            score: 0,
            tier: Tier::Bronze,
            rank_position: 0,
        }
    }

    pub fn new_monthly(kind: SubjectKind, subject_id: &str, period: Period) -> Self {
        Self::zeroed(kind, subject_id, Scope::Month { period })
    }

    pub fn new_career(kind: SubjectKind, subject_id: &str) -> Self {
        Self::zeroed(kind, subject_id, Scope::Career)
    }

    pub fn period(&self) -> Option<Period> {
        self.scope.period()
    }

    pub fn counter(&self, counter: Counter) -> i64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, counter: Counter) {
        *self.counters.entry(counter).or_insert(0) += 1;
    }

    /// Share of ratings that were satisfied, as a percentage.
    pub fn satisfaction_pct(&self) -> f64 {
        if self.rating_count == 0 {
            0.0
        } else {
            self.satisfied_count as f64 * 100.0 / self.rating_count as f64
        }
    }

    /// Fold one star rating into the running mean.
    pub fn record_rating(&mut self, stars: i64) {
        let old_count = self.rating_count as f64;
        self.avg_rating = (self.avg_rating * old_count + stars as f64) / (old_count + 1.0);
        self.rating_count += 1;
        if stars > 3 {
            self.satisfied_count += 1;
        }
    }
}
