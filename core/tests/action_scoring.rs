//! Action scorer: lazy record creation, counter deltas, ratings,
//! and the inputs it must ignore.

use chrono::NaiveDate;
use tierledger_core::{
    action::{ActionScorer, AgentAction, CustomerAction, OwnerAction},
    aggregate::Counter,
    store::LedgerStore,
    types::{Period, SubjectKind, Tier},
};

fn setup() -> (LedgerStore, ActionScorer) {
    let store = LedgerStore::temporary().expect("scratch store");
    store.migrate().expect("migration");
    let scorer = ActionScorer::new(store.reopen().expect("reopen"));
    (store, scorer)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn first_action_creates_a_zeroed_bronze_record() {
    let (store, scorer) = setup();
    let period = Period::new(3, 2025).unwrap();
    assert!(store.monthly_aggregate(SubjectKind::Customer, "c1", period).unwrap().is_none());

    scorer
        .apply_action(day(2025, 3, 4), "c1", CustomerAction::ViewingRequested, None)
        .unwrap();

    let agg = store.monthly_aggregate(SubjectKind::Customer, "c1", period).unwrap().unwrap();
    assert_eq!(agg.counter(Counter::ViewingsRequested), 1);
    assert_eq!(agg.counter(Counter::Purchases), 0);
    assert_eq!(agg.tier, Tier::Bronze);
    assert_eq!(agg.rank_position, 0);
}

#[test]
fn ratings_keep_a_running_average() {
    let (store, scorer) = setup();
    let period = Period::new(5, 2025).unwrap();
    let mut averages = Vec::new();
    for stars in [5, 3, 4] {
        scorer.apply_action(day(2025, 5, 10), "a1", AgentAction::Rated, Some(stars)).unwrap();
        let agg = store.monthly_aggregate(SubjectKind::Agent, "a1", period).unwrap().unwrap();
        averages.push(agg.avg_rating);
    }
    assert_eq!(averages, vec![5.0, 4.0, 4.0]);

    let agg = store.monthly_aggregate(SubjectKind::Agent, "a1", period).unwrap().unwrap();
    assert_eq!(agg.rating_count, 3);
    assert_eq!(agg.satisfied_count, 2, "only ratings above 3 are satisfied");
    assert!((agg.satisfaction_pct() - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn monetary_actions_accumulate_amounts() {
    let (store, scorer) = setup();
    let d = day(2025, 6, 1);
    scorer.apply_action(d, "o1", OwnerAction::MoneyReceived, Some(40_000_000)).unwrap();
    scorer.apply_action(d, "o1", OwnerAction::MoneyReceived, Some(2_500_000)).unwrap();
    scorer.apply_action(d, "o1", OwnerAction::PropertyForRentListed, None).unwrap();

    let agg = store
        .monthly_aggregate(SubjectKind::Owner, "o1", Period::of(d))
        .unwrap()
        .unwrap();
    assert_eq!(agg.monetary, 42_500_000);
    assert_eq!(agg.counter(Counter::PropertiesListed), 1);
    assert_eq!(agg.counter(Counter::ListedForRent), 1);
    assert_eq!(agg.counter(Counter::ListedForSale), 0);
}

#[test]
fn unknown_action_names_change_nothing() {
    let (store, scorer) = setup();
    let d = day(2025, 6, 2);
    let applied = scorer
        .apply_named_action(d, SubjectKind::Agent, "a1", "teleported", None)
        .unwrap();
    assert!(!applied);
    // A customer action name is unknown for an agent.
    let applied = scorer
        .apply_named_action(d, SubjectKind::Agent, "a1", "purchase_made", None)
        .unwrap();
    assert!(!applied);
    assert_eq!(store.monthly_aggregate_count(SubjectKind::Agent).unwrap(), 0);
}

#[test]
fn named_actions_resolve_and_apply() {
    let (store, scorer) = setup();
    let d = day(2025, 6, 3);
    assert!(scorer
        .apply_named_action(d, SubjectKind::Customer, "c9", "spending_made", Some(1_000))
        .unwrap());
    assert!(scorer
        .apply_named_action(d, SubjectKind::Customer, "c9", "purchase_made", None)
        .unwrap());

    let agg = store
        .monthly_aggregate(SubjectKind::Customer, "c9", Period::of(d))
        .unwrap()
        .unwrap();
    assert_eq!(agg.monetary, 1_000);
    assert_eq!(agg.counter(Counter::Purchases), 1);
}

#[test]
fn invalid_amounts_are_ignored_without_creating_records() {
    let (store, scorer) = setup();
    let d = day(2025, 7, 9);
    assert!(!scorer.apply_action(d, "c1", CustomerAction::SpendingMade, None).unwrap());
    assert!(!scorer.apply_action(d, "a1", AgentAction::Rated, Some(0)).unwrap());
    assert!(!scorer.apply_action(d, "a1", AgentAction::Rated, Some(9)).unwrap());
    assert_eq!(store.monthly_aggregate_count(SubjectKind::Customer).unwrap(), 0);
    assert_eq!(store.monthly_aggregate_count(SubjectKind::Agent).unwrap(), 0);
}

#[test]
fn actions_land_in_the_month_of_their_date() {
    let (store, scorer) = setup();
    scorer.apply_action(day(2025, 1, 31), "a1", AgentAction::ContractSigned, None).unwrap();
    scorer.apply_action(day(2025, 2, 1), "a1", AgentAction::ContractSigned, None).unwrap();
    scorer.apply_action(day(2025, 2, 1), "a1", AgentAction::ContractSigned, None).unwrap();

    let jan = store
        .monthly_aggregate(SubjectKind::Agent, "a1", Period::new(1, 2025).unwrap())
        .unwrap()
        .unwrap();
    let feb = store
        .monthly_aggregate(SubjectKind::Agent, "a1", Period::new(2, 2025).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(jan.counter(Counter::ContractsSigned), 1);
    assert_eq!(feb.counter(Counter::ContractsSigned), 2);
    assert_eq!(store.monthly_aggregate_count(SubjectKind::Agent).unwrap(), 2);
}
