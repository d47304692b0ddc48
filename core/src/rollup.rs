//! Financial rollup: keeps one report per month in step with the
//! payment ledger.
//!
//! A refresh reuses the month's report if it exists, otherwise seeds it
//! from the previous month's. It then reconciles every id list against
//! the current directories and recomputes all revenue figures from
//! ground truth, so refreshing twice without new payments changes nothing.
//!
//! Execution: first and last day of each month, and on demand from the
//! report façade.

use crate::{
    config::RollupConfig,
    directory::{Dimension, DimensionDirectory, PaymentLedger, RevenuePayment, SubjectDirectory},
    error::LedgerResult,
    event::LedgerEvent,
    job::{Schedule, ScheduledJob},
    report::{reconcile_buckets, reconcile_salary_items, FinancialReport},
    store::LedgerStore,
    tier::apply_rate_bps,
    types::{EntityId, Money, Period, SubjectKind},
};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashMap;

/// Revenue per dimension id, for all four dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionTotals {
    by_dimension: HashMap<Dimension, HashMap<EntityId, Money>>,
}

impl DimensionTotals {
    fn add(mut self, payment: &RevenuePayment) -> Self {
        if let Some(location) = &payment.location {
            for dim in Dimension::ALL {
                *self
                    .by_dimension
                    .entry(dim)
                    .or_default()
                    .entry(location.id_for(dim).to_string())
                    .or_insert(0) += payment.amount;
            }
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        for (dim, totals) in other.by_dimension {
            let target = self.by_dimension.entry(dim).or_default();
            for (id, revenue) in totals {
                *target.entry(id).or_insert(0) += revenue;
            }
        }
        self
    }

    pub fn get(&self, dimension: Dimension, id: &str) -> Money {
        self.by_dimension
            .get(&dimension)
            .and_then(|m| m.get(id))
            .copied()
            .unwrap_or(0)
    }

    fn ids(&self, dimension: Dimension) -> impl Iterator<Item = &EntityId> {
        self.by_dimension.get(&dimension).into_iter().flat_map(|m| m.keys())
    }
}

/// Sum payments into per-dimension totals. Each rayon worker folds its
/// share into a private accumulator and the partials are merged at the
/// end, so no bucket is shared between threads. Payments without a
/// resolvable location contribute to no dimension.
pub fn dimension_revenue(payments: &[RevenuePayment]) -> DimensionTotals {
    payments
        .par_iter()
        .fold(DimensionTotals::default, DimensionTotals::add)
        .reduce(DimensionTotals::default, DimensionTotals::merge)
}

/// What a refresh did, for the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStats {
    pub created:  bool,
    pub payments: usize,
}

pub struct FinancialRollup {
    config: RollupConfig,
    store:  LedgerStore,
}

impl FinancialRollup {
    pub fn new(config: RollupConfig, store: LedgerStore) -> Self {
        Self { config, store }
    }

    /// Bring the report for `period` up to date and persist it.
    pub fn refresh(&mut self, period: Period) -> LedgerResult<FinancialReport> {
        self.refresh_with_stats(period).map(|(report, _)| report)
    }

    pub fn refresh_with_stats(
        &mut self,
        period: Period,
    ) -> LedgerResult<(FinancialReport, RefreshStats)> {
        self.store.atomically(|| self.rebuild(period))
    }

    fn rebuild(&self, period: Period) -> LedgerResult<(FinancialReport, RefreshStats)> {
        let predecessor = self.store.load_report(period.previous())?;
        let (mut report, created) = match self.store.load_report(period)? {
            Some(existing) => (existing, false),
            None => match &predecessor {
                Some(prev) => (FinancialReport::seeded_from(prev, period), true),
                None => (FinancialReport::empty(period), true),
            },
        };
        report.title = format!("Financial Report {period}");
        report.description = format!(
            "Revenue, salaries and ratings for {} to {}",
            period.first_day(),
            period.last_day()
        );

        // Reconcile every id list with the current directories.
        for dim in Dimension::ALL {
            let valid = self.store.valid_ids(dim)?;
            reconcile_buckets(report.buckets_mut(dim), &valid);
        }
        let agents = self.store.active_subjects(SubjectKind::Agent)?;
        reconcile_salary_items(&mut report.salary_month, &agents);
        reconcile_salary_items(&mut report.salary_career, &agents);

        // Zero before aggregating; the totals are rebuilt from scratch.
        for dim in Dimension::ALL {
            for bucket in report.buckets_mut(dim).iter_mut() {
                bucket.revenue = 0;
            }
        }

        let payments = self
            .store
            .revenue_payments(period, &self.config.excluded_payment_types)?;
        let total_revenue: Money = payments.iter().map(|p| p.amount).sum();
        let totals = dimension_revenue(&payments);

        for dim in Dimension::ALL {
            let buckets = report.buckets_mut(dim);
            for bucket in buckets.iter_mut() {
                bucket.revenue = totals.get(dim, &bucket.dimension_id);
            }
            for id in totals.ids(dim) {
                if !buckets.iter().any(|b| &b.dimension_id == id) {
                    log::debug!("{period}: dropping revenue for unknown {dim:?} '{id}'");
                }
            }
        }

        report.total_revenue = total_revenue;
        report.contract_count = self.store.signed_contract_count(period)?;
        report.tax = apply_rate_bps(total_revenue, self.config.tax_rate_bps);
        let carried = predecessor.as_ref().map(|p| p.net_profit).unwrap_or(0);
        report.net_profit = carried + (total_revenue - report.tax);

        let agents_month = self.store.monthly_cohort(SubjectKind::Agent, period)?;
        let total_rates: i64 = agents_month.iter().map(|a| a.rating_count).sum();
        let rating_sum: f64 = agents_month
            .iter()
            .map(|a| a.avg_rating * a.rating_count as f64)
            .sum();
        report.total_rates = total_rates;
        report.avg_rating = if total_rates > 0 { rating_sum / total_rates as f64 } else { 0.0 };

        self.store.save_report(&mut report)?;
        log::info!(
            "{period}: revenue {total_revenue} from {} payments, net profit {}",
            payments.len(),
            report.net_profit
        );
        Ok((report, RefreshStats { created, payments: payments.len() }))
    }
}

impl ScheduledJob for FinancialRollup {
    fn name(&self) -> &'static str {
        "financial_rollup"
    }

    fn schedule(&self) -> Schedule {
        Schedule::MonthStartAndEnd
    }

    fn run(&mut self, today: NaiveDate) -> LedgerResult<Vec<LedgerEvent>> {
        let period = Period::of(today);
        let (report, stats) = self.refresh_with_stats(period)?;
        Ok(vec![LedgerEvent::FinancialReportRefreshed {
            period,
            total_revenue: report.total_revenue,
            payments: stats.payments,
            created: stats.created,
        }])
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
