//! Ranking job: one generic pipeline, instantiated once per subject kind.
//!
//! Each daily run executes three phases in order:
//!   1. Ensure-exists   create missing current-month and career records
//!   2. Recompute       career roll-up from monthly records, scores, tiers
//!   3. Rank            standard competition ranking, monthly then career
//!
//! Every phase, and each cohort inside the rank phase, is fault-isolated:
//! a failure is logged, recorded as `PhaseFailed`, and the run continues.
//!
//! The stage functions below are pure and usable without a store.

use crate::{
    aggregate::{Aggregate, Counter},
    config::{LedgerConfig, ScoringWeights},
    directory::SubjectDirectory,
    error::LedgerResult,
    event::{Cohort, LedgerEvent},
    job::{Schedule, ScheduledJob},
    store::LedgerStore,
    tier::{carry_over_points, classify},
    types::{EntityId, Period, SubjectKind, Tier},
};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

// ── Stage functions ──────────────────────────────────────────────────────────

/// Records that must be created so every active subject has a monthly
/// record for `period` and a career record. Existing records are never
/// part of the plan.
pub fn plan_missing(
    kind: SubjectKind,
    period: Period,
    active: &[EntityId],
    existing_monthly: &[Aggregate],
    existing_career: &[Aggregate],
) -> Vec<Aggregate> {
    let monthly: HashSet<&str> = existing_monthly
        .iter()
        .filter(|a| a.period() == Some(period))
        .map(|a| a.subject_id.as_str())
        .collect();
    let career: HashSet<&str> = existing_career.iter().map(|a| a.subject_id.as_str()).collect();

    let mut plan = Vec::new();
    for id in active {
        if !career.contains(id.as_str()) {
            plan.push(Aggregate::new_career(kind, id));
        }
        if !monthly.contains(id.as_str()) {
            plan.push(Aggregate::new_monthly(kind, id, period));
        }
    }
    plan
}

/// Overwrite the lifetime figures of `career` with the sum of the
/// subject's monthly records. Score, tier and rank are left alone.
pub fn roll_up_career(career: &mut Aggregate, monthly: &[&Aggregate]) {
    let mut counters = Counter::for_kind(career.kind)
        .iter()
        .map(|c| (*c, 0))
        .collect::<std::collections::BTreeMap<_, _>>();
    let mut monetary = 0;
    let mut rating_count = 0;
    let mut rating_sum = 0.0;
    let mut satisfied = 0;

    for m in monthly {
        for (counter, value) in &m.counters {
            *counters.entry(*counter).or_insert(0) += value;
        }
        monetary += m.monetary;
        rating_count += m.rating_count;
        rating_sum += m.avg_rating * m.rating_count as f64;
        satisfied += m.satisfied_count;
    }

    career.counters = counters;
    career.monetary = monetary;
    career.rating_count = rating_count;
    career.avg_rating = if rating_count > 0 { rating_sum / rating_count as f64 } else { 0.0 };
    career.satisfied_count = satisfied;
}

/// Weighted score of one record, plus any carry-over points.
pub fn score_aggregate(agg: &Aggregate, weights: &ScoringWeights, carry_over: i64) -> i64 {
    let counters: i64 = weights
        .counters
        .iter()
        .map(|(counter, weight)| weight * agg.counter(*counter))
        .sum();
    let monetary = if weights.monetary_step > 0 {
        (agg.monetary / weights.monetary_step) * weights.monetary_weight
    } else {
        0
    };
    // An unrated subject has avg_rating 0 and so contributes nothing.
    let rating = (agg.avg_rating * weights.rating_weight).round() as i64;
    counters + monetary + rating + carry_over
}

/// Standard competition ranking over scores already sorted descending:
/// ties share a position, the next distinct score resumes at its
/// 1-based index. `[90, 90, 80]` gives `[1, 1, 3]`.
pub fn competition_ranks(sorted_scores: &[i64]) -> Vec<u32> {
    let mut ranks: Vec<u32> = Vec::with_capacity(sorted_scores.len());
    for (i, score) in sorted_scores.iter().enumerate() {
        let position = match (i, ranks.last()) {
            (0, _) | (_, None) => 1,
            (_, Some(&prev)) if sorted_scores[i - 1] == *score => prev,
            _ => i as u32 + 1,
        };
        ranks.push(position);
    }
    ranks
}

/// Sort a cohort by score (descending, subject id breaking ties for
/// storage order) and write each record's rank position.
pub fn assign_ranks(records: &mut [Aggregate]) {
    records.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.subject_id.cmp(&b.subject_id)));
    let scores: Vec<i64> = records.iter().map(|r| r.score).collect();
    for (record, rank) in records.iter_mut().zip(competition_ranks(&scores)) {
        record.rank_position = rank;
    }
}

/// Rescore monthly records. They must be in chronological order so the
/// carry-over bonus reads the already-updated previous-month tier.
/// With scoring disabled the stored scores are kept and only tiers move.
pub fn rescore_monthly(records: &mut [Aggregate], kind: SubjectKind, config: &LedgerConfig) {
    let thresholds = config.tiers.for_kind(kind);
    let weights = config.scoring.for_kind(kind);
    let mut last_tier: HashMap<EntityId, (Period, Tier)> = HashMap::new();

    for record in records.iter_mut() {
        let Some(period) = record.period() else { continue };
        if config.scoring.enabled {
            let previous = last_tier
                .get(&record.subject_id)
                .filter(|(p, _)| *p == period.previous())
                .map(|(_, t)| *t);
            let bonus = carry_over_points(previous, &config.scoring.carry_over_bonus);
            record.score = score_aggregate(record, weights, bonus);
        }
        record.tier = classify(record.score, thresholds);
        last_tier.insert(record.subject_id.clone(), (period, record.tier));
    }
}

/// Roll career records up from `monthly` and rescore them.
pub fn rescore_career(
    careers: &mut [Aggregate],
    monthly: &[Aggregate],
    kind: SubjectKind,
    config: &LedgerConfig,
) {
    let mut by_subject: HashMap<&str, Vec<&Aggregate>> = HashMap::new();
    for m in monthly {
        by_subject.entry(m.subject_id.as_str()).or_default().push(m);
    }
    let thresholds = config.tiers.for_kind(kind);
    let weights = config.scoring.for_kind(kind);

    for career in careers.iter_mut() {
        let months = by_subject.get(career.subject_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        roll_up_career(career, months);
        if config.scoring.enabled {
            career.score = score_aggregate(career, weights, 0);
        }
        career.tier = classify(career.score, thresholds);
    }
}

// ── Job ──────────────────────────────────────────────────────────────────────

pub struct RankingJob {
    kind:     SubjectKind,
    config:   LedgerConfig,
    store:    LedgerStore,
    /// Overrides the store as the source of active subjects.
    subjects: Option<Box<dyn SubjectDirectory + Send>>,
}

impl RankingJob {
    pub fn new(kind: SubjectKind, config: LedgerConfig, store: LedgerStore) -> Self {
        Self { kind, config, store, subjects: None }
    }

    pub fn with_directory(mut self, subjects: Box<dyn SubjectDirectory + Send>) -> Self {
        self.subjects = Some(subjects);
        self
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    fn active_subjects(&self) -> LedgerResult<Vec<EntityId>> {
        match &self.subjects {
            Some(directory) => directory.active_subjects(self.kind),
            None => self.store.active_subjects(self.kind),
        }
    }

    pub fn ensure_exists(&self, period: Period) -> LedgerResult<LedgerEvent> {
        let active = self.active_subjects()?;
        let monthly = self.store.monthly_cohort(self.kind, period)?;
        let career = self.store.career_aggregates(self.kind)?;

        let mut created_monthly = 0;
        let mut created_career = 0;
        for record in plan_missing(self.kind, period, &active, &monthly, &career) {
            // The insert ignores a record created since the plan was made.
            if self.store.insert_aggregate_if_missing(&record)? {
                if record.period().is_some() {
                    created_monthly += 1;
                } else {
                    created_career += 1;
                }
            }
        }
        log::debug!(
            "{} {period}: created {created_monthly} monthly, {created_career} career records",
            self.kind
        );
        Ok(LedgerEvent::AggregatesEnsured {
            kind: self.kind,
            period,
            created_monthly,
            created_career,
        })
    }

    pub fn recompute_scores(&self) -> LedgerResult<LedgerEvent> {
        let mut monthly = self.store.monthly_aggregates(self.kind)?;
        rescore_monthly(&mut monthly, self.kind, &self.config);
        self.store.save_scores(&monthly)?;

        let mut career = self.store.career_aggregates(self.kind)?;
        rescore_career(&mut career, &monthly, self.kind, &self.config);
        self.store.save_aggregates(&career)?;

        Ok(LedgerEvent::ScoresRecomputed {
            kind: self.kind,
            monthly_records: monthly.len(),
            career_records: career.len(),
        })
    }

    pub fn rank_cohort(&self, cohort: Cohort, period: Period) -> LedgerResult<LedgerEvent> {
        let mut records = match cohort {
            Cohort::Monthly => self.store.monthly_cohort(self.kind, period)?,
            Cohort::Career => self.store.career_aggregates(self.kind)?,
        };
        assign_ranks(&mut records);
        self.store.save_rank_positions(&records)?;
        Ok(LedgerEvent::RanksAssigned { kind: self.kind, cohort, ranked: records.len() })
    }

    fn contain(
        &self,
        phase: &str,
        result: LedgerResult<LedgerEvent>,
        events: &mut Vec<LedgerEvent>,
    ) {
        match result {
            Ok(event) => events.push(event),
            Err(e) => {
                log::error!("{} phase '{phase}' failed: {e}", self.name());
                events.push(LedgerEvent::PhaseFailed {
                    job: self.name().to_string(),
                    phase: phase.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

impl ScheduledJob for RankingJob {
    fn name(&self) -> &'static str {
        match self.kind {
            SubjectKind::Agent    => "agent_ranking",
            SubjectKind::Customer => "customer_ranking",
            SubjectKind::Owner    => "owner_ranking",
        }
    }

    fn schedule(&self) -> Schedule {
        Schedule::Daily
    }

    fn run(&mut self, today: NaiveDate) -> LedgerResult<Vec<LedgerEvent>> {
        let period = Period::of(today);
        let mut events = Vec::new();

        let ensured = self.ensure_exists(period);
        self.contain("ensure_exists", ensured, &mut events);
        let recomputed = self.recompute_scores();
        self.contain("recompute_scores", recomputed, &mut events);
        let monthly = self.rank_cohort(Cohort::Monthly, period);
        self.contain("rank_monthly", monthly, &mut events);
        let career = self.rank_cohort(Cohort::Career, period);
        self.contain("rank_career", career, &mut events);

        log::info!("{}: ranked {} for {period}", self.name(), self.kind);
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
