//! Report query façade: future, current and past years, and the tier
//! distribution.

use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use tierledger_core::{
    action::{ActionScorer, CustomerAction},
    aggregate::Aggregate,
    cohort::CohortReporter,
    config::LedgerConfig,
    directory::{Dimension, PaymentStatus, PaymentType},
    facade::ReportFacade,
    rollup::FinancialRollup,
    store::{LedgerStore, NewPayment},
    types::{Money, Period, SubjectKind, Tier},
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup() -> (LedgerStore, Arc<Mutex<FinancialRollup>>, ReportFacade) {
    let store = LedgerStore::temporary().expect("scratch store");
    store.migrate().expect("migration");
    store.insert_city("hcm", "Ho Chi Minh City").unwrap();
    store.insert_district("hcm-d1", "hcm", "District 1").unwrap();
    store.insert_ward("hcm-w1", "hcm-d1", "Ben Nghe").unwrap();
    store.insert_property_type("apartment", "Apartment").unwrap();
    store.insert_property("p1", Some("hcm-w1"), Some("apartment"), None, None).unwrap();

    let rollup = Arc::new(Mutex::new(FinancialRollup::new(
        LedgerConfig::default_test().rollup,
        store.reopen().unwrap(),
    )));
    let cohorts = Arc::new(Mutex::new(CohortReporter::new(store.reopen().unwrap())));
    let facade = ReportFacade::new(store.reopen().unwrap(), Arc::clone(&rollup), cohorts);
    (store, rollup, facade)
}

fn pay(store: &LedgerStore, id: &str, amount: Money, paid_on: NaiveDate) {
    store
        .insert_payment(&NewPayment {
            payment_id: id,
            property_id: Some("p1"),
            amount,
            payment_type: PaymentType::ServiceFee,
            status: PaymentStatus::Success,
            paid_on,
        })
        .unwrap();
}

#[test]
fn future_years_have_no_statistics() {
    let (_store, _rollup, facade) = setup();
    let today = day(2025, 5, 5);
    assert!(facade.financial_stats(2026, today).unwrap().is_none());
    assert!(facade.cohort_stats(SubjectKind::Agent, 2026, today).unwrap().is_none());
}

#[test]
fn current_year_sees_payments_after_the_last_scheduled_refresh() {
    let (store, rollup, facade) = setup();
    let today = day(2025, 5, 20);
    pay(&store, "pay-1", 3_000, day(2025, 5, 1));
    rollup.lock().unwrap().refresh(Period::of(today)).unwrap();

    pay(&store, "pay-2", 2_000, day(2025, 5, 19));
    let stats = facade.financial_stats(2025, today).unwrap().unwrap();

    assert_eq!(stats.total_revenue, 5_000);
    assert_eq!(stats.revenue_by_month.get(&5), Some(&5_000));
    assert_eq!(
        stats.revenue_by_dimension[&Dimension::City].get("Ho Chi Minh City"),
        Some(&5_000),
        "charts are keyed by display name"
    );
}

#[test]
fn past_years_are_read_without_refreshing() {
    let (store, rollup, facade) = setup();
    pay(&store, "pay-1", 3_000, day(2024, 12, 3));
    rollup.lock().unwrap().refresh(Period::new(12, 2024).unwrap()).unwrap();

    pay(&store, "pay-2", 9_000, day(2024, 12, 4));
    let stats = facade.financial_stats(2024, day(2025, 2, 1)).unwrap().unwrap();
    assert_eq!(stats.total_revenue, 3_000, "stored December snapshot, not refreshed");
    assert_eq!(stats.revenue_by_month.len(), 1);
}

#[test]
fn past_year_without_december_has_zero_headlines() {
    let (store, rollup, facade) = setup();
    pay(&store, "pay-1", 3_000, day(2023, 6, 3));
    rollup.lock().unwrap().refresh(Period::new(6, 2023).unwrap()).unwrap();

    let stats = facade.financial_stats(2023, day(2025, 2, 1)).unwrap().unwrap();
    assert_eq!(stats.total_revenue, 0);
    assert_eq!(stats.net_profit, 0);
    assert_eq!(stats.revenue_by_month.get(&6), Some(&3_000));
}

#[test]
fn tier_distribution_covers_every_tier() {
    let (store, _rollup, facade) = setup();
    let period = Period::new(5, 2025).unwrap();
    for (id, tier) in [("c1", Tier::Gold), ("c2", Tier::Gold), ("c3", Tier::Bronze), ("c4", Tier::Platinum)] {
        let mut agg = Aggregate::new_monthly(SubjectKind::Customer, id, period);
        agg.tier = tier;
        store.save_aggregate(&agg).unwrap();
    }

    let tiers = facade.tier_distribution(SubjectKind::Customer, period).unwrap();
    assert_eq!(tiers.len(), 4);
    assert_eq!(tiers[&Tier::Silver].count, 0);
    assert_eq!(tiers[&Tier::Silver].percentage, 0.0);
    assert_eq!(tiers[&Tier::Gold].count, 2);
    assert_eq!(tiers[&Tier::Gold].percentage, 50.0);
    assert_eq!(tiers[&Tier::Platinum].percentage, 25.0);

    let empty = facade.tier_distribution(SubjectKind::Owner, period).unwrap();
    assert!(empty.values().all(|share| share.count == 0 && share.percentage == 0.0));
}

#[test]
fn cohort_stats_refresh_the_current_month() {
    let (store, _rollup, facade) = setup();
    let scorer = ActionScorer::new(store.reopen().unwrap());
    let today = day(2025, 5, 20);
    scorer.apply_action(today, "c1", CustomerAction::SpendingMade, Some(300)).unwrap();
    scorer.apply_action(today, "c2", CustomerAction::SpendingMade, Some(100)).unwrap();

    let stats = facade.cohort_stats(SubjectKind::Customer, 2025, today).unwrap().unwrap();
    assert_eq!(stats.subjects.get(&5), Some(&2));
    assert_eq!(stats.new_subjects.get(&5), Some(&2));
    assert_eq!(stats.total_monetary.get(&5), Some(&400));
    assert_eq!(stats.avg_monetary.get(&5), Some(&200));
    assert_eq!(stats.tiers[&Tier::Bronze].count, 2);
}

#[test]
fn a_failed_current_year_refresh_reaches_the_caller() {
    let store = LedgerStore::temporary().expect("scratch store");
    store.migrate().expect("migration");
    // The jobs point at a database that was never migrated.
    let broken = LedgerStore::temporary().expect("scratch store");
    let rollup = Arc::new(Mutex::new(FinancialRollup::new(
        LedgerConfig::default_test().rollup,
        broken.reopen().unwrap(),
    )));
    let cohorts = Arc::new(Mutex::new(CohortReporter::new(broken.reopen().unwrap())));
    let facade = ReportFacade::new(store.reopen().unwrap(), rollup, cohorts);
    let today = day(2025, 6, 12);

    assert!(facade.financial_stats(2025, today).is_err());
    assert!(facade.cohort_stats(SubjectKind::Agent, 2025, today).is_err());

    // Past years never touch the jobs.
    assert!(facade.financial_stats(2024, today).unwrap().is_some());
}
