//! Shared primitive types used across the entire ledger.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LedgerError, LedgerResult};

/// A stable, unique identifier for any subject, location or payment.
pub type EntityId = String;

/// Money in whole currency units. Integer so that sums are exact and
/// independent of the order a parallel reduction visits them in.
pub type Money = i64;

/// One reporting month. Only `new` and `of` construct one, so the month
/// is always in 1..=12.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "PeriodParts")]
pub struct Period {
    // Field order matters: derived Ord compares year first.
    year:  i32,
    month: u32,
}

#[derive(Deserialize)]
struct PeriodParts {
    year:  i32,
    month: u32,
}

impl TryFrom<PeriodParts> for Period {
    type Error = LedgerError;

    fn try_from(parts: PeriodParts) -> LedgerResult<Self> {
        Period::new(parts.month, parts.year)
    }
}

impl Period {
    pub fn new(month: u32, year: i32) -> LedgerResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::InvalidPeriod { month, year });
        }
        Ok(Self { year, month })
    }

    /// December of `year`.
    pub fn december(year: i32) -> Self {
        Self { year, month: 12 }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The period containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// January wraps to December of the previous year.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // Period::new validates the month, and every year chrono can
        // represent has a first of the month.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Exclusive upper bound: the first day of the following month.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.next().first_day()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end_exclusive().pred_opt().unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Period::of(date) == *self
    }

    /// Months since year 0, used for chronological SQL comparisons.
    pub fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// The three ranked populations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Agent,
    Customer,
    Owner,
}

impl SubjectKind {
    pub const ALL: [SubjectKind; 3] = [SubjectKind::Agent, SubjectKind::Customer, SubjectKind::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent    => "agent",
            Self::Customer => "customer",
            Self::Owner    => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent"    => Some(Self::Agent),
            "customer" => Some(Self::Customer),
            "owner"    => Some(Self::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered tiers: BRONZE < SILVER < GOLD < PLATINUM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze   => "BRONZE",
            Self::Silver   => "SILVER",
            Self::Gold     => "GOLD",
            Self::Platinum => "PLATINUM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BRONZE"   => Some(Self::Bronze),
            "SILVER"   => Some(Self::Silver),
            "GOLD"     => Some(Self::Gold),
            "PLATINUM" => Some(Self::Platinum),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
