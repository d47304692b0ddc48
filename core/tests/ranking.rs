//! Ranking pipeline: ensure-exists, recompute, competition ranking,
//! and per-phase fault isolation.

use chrono::NaiveDate;
use tierledger_core::{
    action::{ActionScorer, AgentAction},
    aggregate::{Aggregate, Counter},
    config::LedgerConfig,
    directory::SubjectDirectory,
    error::{LedgerError, LedgerResult},
    event::{Cohort, LedgerEvent},
    job::ScheduledJob,
    ranking::RankingJob,
    store::LedgerStore,
    types::{EntityId, Period, SubjectKind, Tier},
};

fn store() -> LedgerStore {
    let store = LedgerStore::temporary().expect("scratch store");
    store.migrate().expect("migration");
    store
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn job(store: &LedgerStore, kind: SubjectKind, config: LedgerConfig) -> RankingJob {
    RankingJob::new(kind, config, store.reopen().expect("reopen"))
}

#[test]
fn ensure_exists_creates_records_for_active_subjects_only() {
    let store = store();
    store.insert_subject("c1", SubjectKind::Customer, "One").unwrap();
    store.insert_subject("c2", SubjectKind::Customer, "Two").unwrap();
    store.insert_subject("c3", SubjectKind::Customer, "Three").unwrap();
    store.set_subject_active("c3", false).unwrap();
    store.insert_subject("a1", SubjectKind::Agent, "Agent").unwrap();

    let mut ranking = job(&store, SubjectKind::Customer, LedgerConfig::default_test());
    ranking.run(day(2025, 4, 1)).unwrap();

    let period = Period::new(4, 2025).unwrap();
    let cohort: Vec<String> = store
        .monthly_cohort(SubjectKind::Customer, period)
        .unwrap()
        .into_iter()
        .map(|a| a.subject_id)
        .collect();
    assert_eq!(cohort, vec!["c1", "c2"]);
    assert_eq!(store.career_aggregate_count(SubjectKind::Customer).unwrap(), 2);
    assert_eq!(store.monthly_aggregate_count(SubjectKind::Agent).unwrap(), 0);
}

#[test]
fn running_twice_keeps_counters_written_in_between() {
    let store = store();
    store.insert_subject("a1", SubjectKind::Agent, "Agent").unwrap();
    let scorer = ActionScorer::new(store.reopen().unwrap());
    let mut ranking = job(&store, SubjectKind::Agent, LedgerConfig::default_test());
    let today = day(2025, 4, 10);

    let first = ranking.run(today).unwrap();
    assert!(first.contains(&LedgerEvent::AggregatesEnsured {
        kind: SubjectKind::Agent,
        period: Period::of(today),
        created_monthly: 1,
        created_career: 1,
    }));

    for _ in 0..4 {
        scorer.apply_action(today, "a1", AgentAction::ContractSigned, None).unwrap();
    }
    let second = ranking.run(today).unwrap();
    assert!(second.contains(&LedgerEvent::AggregatesEnsured {
        kind: SubjectKind::Agent,
        period: Period::of(today),
        created_monthly: 0,
        created_career: 0,
    }));

    let monthly = store
        .monthly_aggregate(SubjectKind::Agent, "a1", Period::of(today))
        .unwrap()
        .unwrap();
    assert_eq!(monthly.counter(Counter::ContractsSigned), 4);
    assert_eq!(monthly.score, 40);
    assert_eq!(monthly.tier, Tier::Bronze);

    let career = store.career_aggregate(SubjectKind::Agent, "a1").unwrap().unwrap();
    assert_eq!(career.counter(Counter::ContractsSigned), 4, "career rolls up from months");
}

#[test]
fn stored_scores_rank_with_shared_positions_and_gaps() {
    let store = store();
    let period = Period::new(6, 2025).unwrap();
    let scores = [("f", 50), ("b", 90), ("d", 80), ("a", 90), ("e", 80), ("c", 80)];
    for (id, score) in scores {
        store.insert_subject(id, SubjectKind::Owner, id).unwrap();
        let mut agg = Aggregate::new_monthly(SubjectKind::Owner, id, period);
        agg.score = score;
        store.save_aggregate(&agg).unwrap();
    }

    let mut config = LedgerConfig::default_test();
    config.scoring.enabled = false;
    let mut ranking = job(&store, SubjectKind::Owner, config);
    ranking.run(day(2025, 6, 15)).unwrap();

    let mut cohort = store.monthly_cohort(SubjectKind::Owner, period).unwrap();
    cohort.sort_by(|a, b| a.rank_position.cmp(&b.rank_position).then(a.subject_id.cmp(&b.subject_id)));
    let ranked: Vec<(&str, u32, Tier)> = cohort
        .iter()
        .map(|a| (a.subject_id.as_str(), a.rank_position, a.tier))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("a", 1, Tier::Platinum),
            ("b", 1, Tier::Platinum),
            ("c", 3, Tier::Gold),
            ("d", 3, Tier::Gold),
            ("e", 3, Tier::Gold),
            ("f", 6, Tier::Silver),
        ]
    );
}

#[test]
fn previous_month_tier_carries_over_bonus_points() {
    let store = store();
    store.insert_subject("a1", SubjectKind::Agent, "Agent").unwrap();
    let scorer = ActionScorer::new(store.reopen().unwrap());

    // 8 contracts in December: 80 points, GOLD.
    for _ in 0..8 {
        scorer.apply_action(day(2024, 12, 5), "a1", AgentAction::ContractSigned, None).unwrap();
    }
    // 1 contract in January: 10 points plus 15 carried over from GOLD.
    scorer.apply_action(day(2025, 1, 5), "a1", AgentAction::ContractSigned, None).unwrap();

    let mut ranking = job(&store, SubjectKind::Agent, LedgerConfig::default_test());
    ranking.run(day(2025, 1, 6)).unwrap();

    let dec = store
        .monthly_aggregate(SubjectKind::Agent, "a1", Period::new(12, 2024).unwrap())
        .unwrap()
        .unwrap();
    let jan = store
        .monthly_aggregate(SubjectKind::Agent, "a1", Period::new(1, 2025).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!((dec.score, dec.tier), (80, Tier::Gold));
    assert_eq!((jan.score, jan.tier), (25, Tier::Bronze));

    let career = store.career_aggregate(SubjectKind::Agent, "a1").unwrap().unwrap();
    assert_eq!(career.counter(Counter::ContractsSigned), 9);
    assert_eq!((career.score, career.tier), (90, Tier::Platinum));
    assert_eq!(career.rank_position, 1);
}

#[test]
fn rating_contributes_rounded_points() {
    let store = store();
    store.insert_subject("a1", SubjectKind::Agent, "Agent").unwrap();
    let scorer = ActionScorer::new(store.reopen().unwrap());
    for stars in [5, 4] {
        scorer.apply_action(day(2025, 8, 2), "a1", AgentAction::Rated, Some(stars)).unwrap();
    }
    let mut ranking = job(&store, SubjectKind::Agent, LedgerConfig::default_test());
    ranking.run(day(2025, 8, 3)).unwrap();

    let agg = store
        .monthly_aggregate(SubjectKind::Agent, "a1", Period::new(8, 2025).unwrap())
        .unwrap()
        .unwrap();
    // 4.5 stars × 4.0 weight
    assert_eq!(agg.score, 18);
}

struct BrokenDirectory;

impl SubjectDirectory for BrokenDirectory {
    fn active_subjects(&self, _kind: SubjectKind) -> LedgerResult<Vec<EntityId>> {
        Err(LedgerError::Other(anyhow::anyhow!("directory unavailable")))
    }
}

#[test]
fn a_failing_phase_does_not_stop_the_others() {
    let store = store();
    let period = Period::new(9, 2025).unwrap();
    let mut agg = Aggregate::new_monthly(SubjectKind::Customer, "c1", period);
    agg.increment(Counter::Purchases);
    store.save_aggregate(&agg).unwrap();

    let mut ranking = job(&store, SubjectKind::Customer, LedgerConfig::default_test())
        .with_directory(Box::new(BrokenDirectory));
    let events = ranking.run(day(2025, 9, 2)).unwrap();

    assert!(matches!(
        &events[0],
        LedgerEvent::PhaseFailed { phase, .. } if phase == "ensure_exists"
    ));
    assert!(events.iter().any(|e| matches!(e, LedgerEvent::ScoresRecomputed { .. })));
    assert!(events.contains(&LedgerEvent::RanksAssigned {
        kind: SubjectKind::Customer,
        cohort: Cohort::Monthly,
        ranked: 1,
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        LedgerEvent::RanksAssigned { cohort: Cohort::Career, .. }
    )));

    let ranked = store.monthly_aggregate(SubjectKind::Customer, "c1", period).unwrap().unwrap();
    assert_eq!(ranked.score, 15);
    assert_eq!(ranked.rank_position, 1);
}

/// Overwrite a stored monthly tier with a value no reader accepts.
fn corrupt_monthly_tier(store: &LedgerStore, subject_id: &str) {
    let conn = rusqlite::Connection::open(store.path()).unwrap();
    conn.execute(
        "UPDATE monthly_aggregate SET tier = 'DIAMOND' WHERE subject_id = ?1",
        [subject_id],
    )
    .unwrap();
}

#[test]
fn an_unreadable_monthly_cohort_does_not_block_career_ranking() {
    let store = store();
    let period = Period::new(10, 2025).unwrap();
    store.save_aggregate(&Aggregate::new_monthly(SubjectKind::Owner, "o1", period)).unwrap();
    for (id, score) in [("o1", 30), ("o2", 80), ("o3", 80)] {
        let mut career = Aggregate::new_career(SubjectKind::Owner, id);
        career.score = score;
        store.save_aggregate(&career).unwrap();
    }
    corrupt_monthly_tier(&store, "o1");

    let mut ranking = job(&store, SubjectKind::Owner, LedgerConfig::default_test());
    let events = ranking.run(day(2025, 10, 4)).unwrap();

    let failed: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            LedgerEvent::PhaseFailed { phase, .. } => Some(phase.as_str()),
            _ => None,
        })
        .collect();
    assert!(failed.contains(&"rank_monthly"), "failed phases: {failed:?}");
    assert!(!failed.contains(&"rank_career"));
    assert!(events.contains(&LedgerEvent::RanksAssigned {
        kind: SubjectKind::Owner,
        cohort: Cohort::Career,
        ranked: 3,
    }));

    let ranks: Vec<(String, u32)> = store
        .career_aggregates(SubjectKind::Owner)
        .unwrap()
        .into_iter()
        .map(|a| (a.subject_id, a.rank_position))
        .collect();
    assert_eq!(
        ranks,
        vec![("o1".to_string(), 3), ("o2".to_string(), 1), ("o3".to_string(), 1)]
    );
}
