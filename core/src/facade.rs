//! Report query façade: the read path for callers outside the engine.
//!
//! For the current year the relevant job refreshes the current month
//! first, on a worker thread the caller waits for, so current-month
//! figures are never stale. Past years are served from stored snapshots.
//! Future years have no statistics.
//!
//! Unlike the scheduled jobs, failures here propagate to the caller.

use crate::{
    cohort::CohortReporter,
    directory::{Dimension, DimensionDirectory},
    error::{LedgerError, LedgerResult},
    report::FinancialReport,
    rollup::FinancialRollup,
    store::LedgerStore,
    types::{Money, Period, SubjectKind, Tier},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TierShare {
    pub count:      i64,
    pub percentage: f64,
}

/// Month-keyed statistics for one subject kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CohortStats {
    pub kind:             SubjectKind,
    pub year:             i32,
    pub subjects:         BTreeMap<u32, i64>,
    pub new_subjects:     BTreeMap<u32, i64>,
    pub total_monetary:   BTreeMap<u32, Money>,
    pub avg_monetary:     BTreeMap<u32, Money>,
    pub total_rates:      BTreeMap<u32, i64>,
    pub avg_rating:       BTreeMap<u32, f64>,
    pub avg_satisfaction: BTreeMap<u32, f64>,
    pub tiers:            BTreeMap<Tier, TierShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialStats {
    pub year:           i32,
    // Headline figures: current month this year, December otherwise.
    pub total_revenue:  Money,
    pub contract_count: i64,
    pub tax:            Money,
    pub net_profit:     Money,
    pub total_salary:   Money,
    pub total_rates:    i64,
    pub avg_rating:     f64,
    pub revenue_by_month:   BTreeMap<u32, Money>,
    pub contracts_by_month: BTreeMap<u32, i64>,
    pub salary_by_month:    BTreeMap<u32, Money>,
    /// Headline month's revenue per dimension, keyed by display name.
    pub revenue_by_dimension: BTreeMap<Dimension, BTreeMap<String, Money>>,
}

pub struct ReportFacade {
    store:   LedgerStore,
    rollup:  Arc<Mutex<FinancialRollup>>,
    cohorts: Arc<Mutex<CohortReporter>>,
}

impl ReportFacade {
    pub fn new(
        store: LedgerStore,
        rollup: Arc<Mutex<FinancialRollup>>,
        cohorts: Arc<Mutex<CohortReporter>>,
    ) -> Self {
        Self { store, rollup, cohorts }
    }

    pub fn cohort_stats(
        &self,
        kind: SubjectKind,
        year: i32,
        today: NaiveDate,
    ) -> LedgerResult<Option<CohortStats>> {
        if year > today.year() {
            return Ok(None);
        }
        let current = Period::of(today);
        let tier_period = if year == today.year() {
            run_blocking(&self.cohorts, "cohort_reports", move |job| job.generate(kind, current))?;
            current
        } else {
            Period::december(year)
        };

        let mut stats = CohortStats {
            kind,
            year,
            subjects: BTreeMap::new(),
            new_subjects: BTreeMap::new(),
            total_monetary: BTreeMap::new(),
            avg_monetary: BTreeMap::new(),
            total_rates: BTreeMap::new(),
            avg_rating: BTreeMap::new(),
            avg_satisfaction: BTreeMap::new(),
            tiers: self.tier_distribution(kind, tier_period)?,
        };
        for row in self.store.cohort_reports_for_year(kind, year)? {
            let m = row.period.month();
            stats.subjects.insert(m, row.total_subjects);
            stats.new_subjects.insert(m, row.new_subjects);
            stats.total_monetary.insert(m, row.total_monetary);
            stats.avg_monetary.insert(m, row.avg_monetary);
            stats.total_rates.insert(m, row.total_rates);
            stats.avg_rating.insert(m, row.avg_rating);
            stats.avg_satisfaction.insert(m, row.avg_satisfaction);
        }
        Ok(Some(stats))
    }

    pub fn financial_stats(&self, year: i32, today: NaiveDate) -> LedgerResult<Option<FinancialStats>> {
        if year > today.year() {
            return Ok(None);
        }
        let headline = if year == today.year() {
            let current = Period::of(today);
            Some(run_blocking(&self.rollup, "financial_rollup", move |job| job.refresh(current))?)
        } else {
            self.store.load_report(Period::december(year))?
        };

        let mut stats = FinancialStats {
            year,
            total_revenue: 0,
            contract_count: 0,
            tax: 0,
            net_profit: 0,
            total_salary: 0,
            total_rates: 0,
            avg_rating: 0.0,
            revenue_by_month: BTreeMap::new(),
            contracts_by_month: BTreeMap::new(),
            salary_by_month: BTreeMap::new(),
            revenue_by_dimension: BTreeMap::new(),
        };
        for report in self.store.reports_for_year(year)? {
            let m = report.period.month();
            stats.revenue_by_month.insert(m, report.total_revenue);
            stats.contracts_by_month.insert(m, report.contract_count);
            stats.salary_by_month.insert(m, report.salary_month.iter().map(|i| i.salary).sum());
        }
        if let Some(report) = headline {
            stats.total_revenue = report.total_revenue;
            stats.contract_count = report.contract_count;
            stats.tax = report.tax;
            stats.net_profit = report.net_profit;
            stats.total_salary = report.total_salary;
            stats.total_rates = report.total_rates;
            stats.avg_rating = report.avg_rating;
            stats.revenue_by_dimension = self.label_buckets(&report)?;
        }
        Ok(Some(stats))
    }

    /// Count and share of each tier in the monthly cohort of `period`.
    /// Every tier is present, including those nobody holds.
    pub fn tier_distribution(
        &self,
        kind: SubjectKind,
        period: Period,
    ) -> LedgerResult<BTreeMap<Tier, TierShare>> {
        let cohort = self.store.monthly_cohort(kind, period)?;
        let total = cohort.len() as i64;
        Ok(Tier::ALL
            .iter()
            .map(|tier| {
                let count = cohort.iter().filter(|a| a.tier == *tier).count() as i64;
                let percentage = if total > 0 { count as f64 * 100.0 / total as f64 } else { 0.0 };
                (*tier, TierShare { count, percentage })
            })
            .collect())
    }

    fn label_buckets(
        &self,
        report: &FinancialReport,
    ) -> LedgerResult<BTreeMap<Dimension, BTreeMap<String, Money>>> {
        let mut out = BTreeMap::new();
        for dim in Dimension::ALL {
            let mut chart = BTreeMap::new();
            for bucket in report.buckets(dim) {
                let label = self
                    .store
                    .dimension_name(dim, &bucket.dimension_id)?
                    .unwrap_or_else(|| bucket.dimension_id.clone());
                *chart.entry(label).or_insert(0) += bucket.revenue;
            }
            out.insert(dim, chart);
        }
        Ok(out)
    }
}

/// Run `f` against a shared job on a worker thread and wait for it.
/// Holding the job's lock for the whole call keeps it from overlapping
/// a scheduled run of the same job. The guard lives outside the unwind
/// boundary, so a panic in `f` is reported without poisoning the lock.
fn run_blocking<J, R, F>(job: &Arc<Mutex<J>>, name: &str, f: F) -> LedgerResult<R>
where
    J: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut J) -> LedgerResult<R> + Send + 'static,
{
    let job = Arc::clone(job);
    let job_name = name.to_string();
    let handle = std::thread::spawn(move || {
        let mut guard = job
            .lock()
            .map_err(|_| LedgerError::LockPoisoned { job: job_name.clone() })?;
        let job: &mut J = &mut guard;
        catch_unwind(AssertUnwindSafe(|| f(job)))
            .unwrap_or_else(|_| Err(LedgerError::JobPanicked { job: job_name }))
    });
    handle
        .join()
        .map_err(|_| LedgerError::JobPanicked { job: name.to_string() })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_panicking_refresh_leaves_the_job_usable() {
        let job = Arc::new(Mutex::new(0_i64));

        let err = run_blocking(&job, "counter", |_: &mut i64| -> LedgerResult<()> {
            panic!("refresh blew up")
        })
        .unwrap_err();
        assert!(matches!(err, LedgerError::JobPanicked { ref job } if job == "counter"));
        assert!(!job.is_poisoned());

        let value = run_blocking(&job, "counter", |n: &mut i64| {
            *n += 1;
            Ok(*n)
        })
        .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn a_poisoned_job_is_reported() {
        let job = Arc::new(Mutex::new(0_i64));
        let poisoner = Arc::clone(&job);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err = run_blocking(&job, "counter", |n: &mut i64| Ok(*n)).unwrap_err();
        assert!(matches!(err, LedgerError::LockPoisoned { .. }));
    }
}
