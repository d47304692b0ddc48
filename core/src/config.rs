use crate::{
    aggregate::Counter,
    directory::PaymentType,
    types::{Money, SubjectKind, Tier},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Tiers ──────────────────────────────────────────────────────────

/// Lower bounds (inclusive) of each tier above BRONZE.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierThresholds {
    pub silver:   i64,
    pub gold:     i64,
    pub platinum: i64,
}

impl TierThresholds {
    pub const fn standard() -> Self {
        Self { silver: 50, gold: 75, platinum: 90 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub agent:    TierThresholds,
    pub customer: TierThresholds,
    pub owner:    TierThresholds,
}

impl TierConfig {
    pub fn for_kind(&self, kind: SubjectKind) -> &TierThresholds {
        match kind {
            SubjectKind::Agent    => &self.agent,
            SubjectKind::Customer => &self.customer,
            SubjectKind::Owner    => &self.owner,
        }
    }
}

/// A value per tier. Used for carry-over points and commission rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerTier {
    pub bronze:   i64,
    pub silver:   i64,
    pub gold:     i64,
    pub platinum: i64,
}

impl PerTier {
    pub fn get(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Bronze   => self.bronze,
            Tier::Silver   => self.silver,
            Tier::Gold     => self.gold,
            Tier::Platinum => self.platinum,
        }
    }
}

// ── Scoring ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Points per unit of each counter. Counters absent here score zero.
    pub counters: BTreeMap<Counter, i64>,
    /// Monetary value is scored in whole steps of this size.
    pub monetary_step: Money,
    pub monetary_weight: i64,
    /// Multiplied by the average star rating, then rounded.
    pub rating_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// When false the recompute phase keeps stored scores and only reassigns tiers.
    pub enabled: bool,
    /// Points a monthly record inherits from the subject's previous-month tier.
    pub carry_over_bonus: PerTier,
    pub agent:    ScoringWeights,
    pub customer: ScoringWeights,
    pub owner:    ScoringWeights,
}

impl ScoringConfig {
    pub fn for_kind(&self, kind: SubjectKind) -> &ScoringWeights {
        match kind {
            SubjectKind::Agent    => &self.agent,
            SubjectKind::Customer => &self.customer,
            SubjectKind::Owner    => &self.owner,
        }
    }
}

// ── Finance ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryConfig {
    /// Commission on the month's net profit, in basis points.
    pub tier_rates_bps: PerTier,
    /// Flat bonus per property assigned to the agent this month.
    pub support_bonus_per_property: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Internal transfers that are not platform revenue.
    pub excluded_payment_types: Vec<PaymentType>,
    pub tax_rate_bps: i64,
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub tiers:   TierConfig,
    pub scoring: ScoringConfig,
    pub salary:  SalaryConfig,
    pub rollup:  RollupConfig,
}

impl LedgerConfig {
    /// Load every config document under `data_dir`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        Ok(Self {
            tiers:   read_json(data_dir, "ranking/tiers.json")?,
            scoring: read_json(data_dir, "ranking/scoring.json")?,
            salary:  read_json(data_dir, "finance/salary.json")?,
            rollup:  read_json(data_dir, "finance/rollup.json")?,
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Mirrors the documents shipped under data/.
    pub fn default_test() -> Self {
        let agent = ScoringWeights {
            counters: BTreeMap::from([
                (Counter::PropertiesAssigned, 2),
                (Counter::AppointmentsAssigned, 1),
                (Counter::AppointmentsCompleted, 3),
                (Counter::ContractsSigned, 10),
            ]),
            monetary_step: 100_000_000,
            monetary_weight: 0,
            rating_weight: 4.0,
        };
        let customer = ScoringWeights {
            counters: BTreeMap::from([
                (Counter::ViewingsRequested, 1),
                (Counter::ViewingsAttended, 2),
                (Counter::Purchases, 15),
                (Counter::Rentals, 8),
                (Counter::ContractsSigned, 10),
            ]),
            monetary_step: 100_000_000,
            monetary_weight: 1,
            rating_weight: 0.0,
        };
        let owner = ScoringWeights {
            counters: BTreeMap::from([
                (Counter::PropertiesListed, 3),
                (Counter::PropertiesSold, 15),
                (Counter::PropertiesRented, 8),
            ]),
            monetary_step: 100_000_000,
            monetary_weight: 1,
            rating_weight: 0.0,
        };

        Self {
            tiers: TierConfig {
                agent:    TierThresholds::standard(),
                customer: TierThresholds::standard(),
                owner:    TierThresholds::standard(),
            },
            scoring: ScoringConfig {
                enabled: true,
                carry_over_bonus: PerTier { bronze: 0, silver: 5, gold: 15, platinum: 25 },
                agent,
                customer,
                owner,
            },
            salary: SalaryConfig {
                tier_rates_bps: PerTier { bronze: 200, silver: 400, gold: 600, platinum: 800 },
                support_bonus_per_property: 5_000_000,
            },
            rollup: RollupConfig {
                excluded_payment_types: vec![
                    PaymentType::Salary,
                    PaymentType::Bonus,
                    PaymentType::MoneySale,
                    PaymentType::MoneyRental,
                    PaymentType::Penalty,
                ],
                tax_rate_bps: 1_000,
            },
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(data_dir: &str, rel: &str) -> anyhow::Result<T> {
    let path = format!("{data_dir}/{rel}");
    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}
