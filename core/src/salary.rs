//! Salary finalizer: turns the month's net profit and each agent's tier
//! into a salary entitlement, then folds it into the career ledger.
//!
//! Execution: last day of each month, after the financial rollup.
//! A report is finalized at most once; a second run for the same
//! period is refused so career totals are never double-counted.

use crate::{
    aggregate::Counter,
    config::SalaryConfig,
    error::LedgerResult,
    event::LedgerEvent,
    job::{Schedule, ScheduledJob},
    store::LedgerStore,
    tier::apply_rate_bps,
    types::{EntityId, Money, Period, SubjectKind, Tier},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryFigure {
    pub base:   Money,
    pub bonus:  Money,
    pub salary: Money,
}

/// `net_profit_delta × tier rate + support bonus × properties assigned`.
pub fn compute_salary(
    tier: Tier,
    properties_assigned: i64,
    net_profit_delta: Money,
    config: &SalaryConfig,
) -> SalaryFigure {
    let base = apply_rate_bps(net_profit_delta, config.tier_rates_bps.get(tier));
    let bonus = config.support_bonus_per_property * properties_assigned;
    SalaryFigure { base, bonus, salary: base + bonus }
}

/// Outcome of one finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRun {
    pub period:           Period,
    pub net_profit_delta: Money,
    pub agents_paid:      usize,
    pub month_salary:     Money,
}

pub struct SalaryFinalizer {
    config: SalaryConfig,
    store:  LedgerStore,
}

impl SalaryFinalizer {
    pub fn new(config: SalaryConfig, store: LedgerStore) -> Self {
        Self { config, store }
    }

    /// Compute the salary entitlements of `period`. Returns `None`, with
    /// nothing changed, when the report is missing or already finalized.
    pub fn finalize(&mut self, period: Period) -> LedgerResult<Option<SalaryRun>> {
        self.store.atomically(|| self.compute(period))
    }

    fn compute(&self, period: Period) -> LedgerResult<Option<SalaryRun>> {
        let Some(mut report) = self.store.load_report(period)? else {
            log::warn!("No financial report for {period}; salaries not computed");
            return Ok(None);
        };
        if report.salary_finalized {
            log::warn!("Salaries for {period} already finalized; refusing to run again");
            return Ok(None);
        }

        let previous_net = self
            .store
            .load_report(period.previous())?
            .map(|r| r.net_profit)
            .unwrap_or(0);
        let net_profit_delta = report.net_profit - previous_net;

        let mut computed: HashMap<EntityId, Money> = HashMap::new();
        for item in report.salary_month.iter_mut() {
            let Some(agg) = self
                .store
                .monthly_aggregate(SubjectKind::Agent, &item.agent_id, period)?
            else {
                log::debug!("{period}: no monthly record for agent {}; skipped", item.agent_id);
                continue;
            };
            let figure = compute_salary(
                agg.tier,
                agg.counter(Counter::PropertiesAssigned),
                net_profit_delta,
                &self.config,
            );
            item.salary = figure.salary;
            item.bonus = figure.bonus;
            item.unpaid = figure.salary;
            computed.insert(item.agent_id.clone(), figure.salary);
        }

        let month_salary: Money = computed.values().sum();
        report.total_salary += month_salary;

        for item in report.salary_career.iter_mut() {
            if let Some(salary) = computed.get(&item.agent_id) {
                item.salary += salary;
                item.unpaid = item.salary;
            }
        }

        report.salary_finalized = true;
        self.store.save_report(&mut report)?;

        log::info!(
            "{period}: salaries finalized for {} agents, {month_salary} in total",
            computed.len()
        );
        Ok(Some(SalaryRun {
            period,
            net_profit_delta,
            agents_paid: computed.len(),
            month_salary,
        }))
    }
}

impl ScheduledJob for SalaryFinalizer {
    fn name(&self) -> &'static str {
        "salary_finalizer"
    }

    fn schedule(&self) -> Schedule {
        Schedule::MonthEnd
    }

    fn run(&mut self, today: NaiveDate) -> LedgerResult<Vec<LedgerEvent>> {
        let run = self.finalize(Period::of(today))?;
        Ok(run
            .into_iter()
            .map(|r| LedgerEvent::SalaryFinalized {
                period: r.period,
                agents_paid: r.agents_paid,
                month_salary: r.month_salary,
            })
            .collect())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    #[test]
    fn gold_agent_with_three_properties() {
        let config = LedgerConfig::default_test().salary;
        let figure = compute_salary(Tier::Gold, 3, 10_000_000, &config);
        assert_eq!(figure.base, 600_000);
        assert_eq!(figure.bonus, 15_000_000);
        assert_eq!(figure.salary, 15_600_000);
    }

    #[test]
    fn loss_month_reduces_base() {
        let config = LedgerConfig::default_test().salary;
        let figure = compute_salary(Tier::Bronze, 0, -1_000_000, &config);
        assert_eq!(figure.salary, -20_000);
    }
}
