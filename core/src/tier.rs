//! Tier classification and the tier-derived schedules.
//!
//! Everything here is pure: no store, no clock, no logging.

use crate::{
    config::{PerTier, TierThresholds},
    types::{Money, Tier},
};

/// Map an accumulated score to its tier. Total over all of i64;
/// anything below the SILVER bound, negatives included, is BRONZE.
pub fn classify(score: i64, thresholds: &TierThresholds) -> Tier {
    if score >= thresholds.platinum {
        Tier::Platinum
    } else if score >= thresholds.gold {
        Tier::Gold
    } else if score >= thresholds.silver {
        Tier::Silver
    } else {
        Tier::Bronze
    }
}

/// Points a monthly record inherits from last month's tier.
pub fn carry_over_points(previous: Option<Tier>, bonus: &PerTier) -> i64 {
    previous.map(|t| bonus.get(t)).unwrap_or(0)
}

/// Apply a basis-point rate to an amount. Truncates toward zero.
pub fn apply_rate_bps(amount: Money, rate_bps: i64) -> Money {
    // i128 keeps large net-profit figures from overflowing mid-multiply.
    ((amount as i128 * rate_bps as i128) / 10_000) as Money
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_of_six_percent() {
        assert_eq!(apply_rate_bps(10_000_000, 600), 600_000);
        assert_eq!(apply_rate_bps(-10_000_000, 200), -200_000);
        assert_eq!(apply_rate_bps(0, 800), 0);
    }

    #[test]
    fn no_previous_tier_means_no_bonus() {
        let bonus = PerTier { bronze: 0, silver: 5, gold: 15, platinum: 25 };
        assert_eq!(carry_over_points(None, &bonus), 0);
        assert_eq!(carry_over_points(Some(Tier::Gold), &bonus), 15);
    }
}
