//! The scheduler engine: one tick per calendar day.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Agent ranking      (daily)
//!   2. Customer ranking   (daily)
//!   3. Owner ranking      (daily)
//!   4. Cohort reports     (daily)
//!   5. Financial rollup   (first and last day of the month)
//!   6. Salary finalizer   (last day of the month)
//!
//! RULES:
//!   - Due jobs execute in registration order, every tick.
//!   - The rollup runs before the finalizer so salaries see fresh net profit.
//!   - A failed or panicking job is recorded as JobFailed; the rest still run.
//!   - Every event is recorded in the event log.

use crate::{
    action::ActionScorer,
    clock::LedgerClock,
    cohort::CohortReporter,
    config::LedgerConfig,
    error::{LedgerError, LedgerResult},
    event::{EventLogEntry, LedgerEvent},
    facade::ReportFacade,
    job::{JobSlot, ScheduledJob},
    ranking::RankingJob,
    rollup::FinancialRollup,
    salary::SalaryFinalizer,
    store::LedgerStore,
    types::SubjectKind,
};
use chrono::NaiveDate;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

pub struct LedgerEngine {
    pub clock: LedgerClock,
    jobs:      Vec<JobSlot>,
    rollup:    Arc<Mutex<FinancialRollup>>,
    cohorts:   Arc<Mutex<CohortReporter>>,
    store:     LedgerStore,
}

impl LedgerEngine {
    /// Build a fully wired engine with every job registered.
    /// Each job gets its own connection to the store's database.
    /// The first tick runs `start`.
    pub fn build(config: LedgerConfig, store: LedgerStore, start: NaiveDate) -> LedgerResult<Self> {
        let rollup = Arc::new(Mutex::new(FinancialRollup::new(
            config.rollup.clone(),
            store.reopen()?,
        )));
        let cohorts = Arc::new(Mutex::new(CohortReporter::new(store.reopen()?)));

        let mut engine = Self {
            clock: LedgerClock::starting_at(start),
            jobs: Vec::new(),
            rollup: Arc::clone(&rollup),
            cohorts: Arc::clone(&cohorts),
            store,
        };

        // EXECUTION ORDER: fixed, documented, never reordered.
        for kind in SubjectKind::ALL {
            let job = RankingJob::new(kind, config.clone(), engine.store.reopen()?);
            engine.register(Arc::new(Mutex::new(job)));
        }
        engine.register(cohorts);
        engine.register(rollup);
        engine.register(Arc::new(Mutex::new(SalaryFinalizer::new(
            config.salary.clone(),
            engine.store.reopen()?,
        ))));
        Ok(engine)
    }

    /// Append a job. It runs after every job registered before it.
    pub fn register(&mut self, job: JobSlot) {
        self.jobs.push(job);
    }

    /// Advance one day and run every job due on it.
    ///
    /// Events the log cannot store are still returned; the failure is
    /// logged and the remaining jobs run.
    pub fn tick(&mut self) -> LedgerResult<Vec<LedgerEvent>> {
        assert!(!self.clock.paused, "tick() called on paused engine");

        let today = self.clock.advance();
        let mut day_events = Vec::new();
        self.record(today, "engine", LedgerEvent::DayStarted { date: today }, &mut day_events);

        for slot in &self.jobs {
            let (name, events) = run_slot(slot, today);
            for event in events {
                self.record(today, name, event, &mut day_events);
            }
        }

        self.record(today, "engine", LedgerEvent::DayCompleted { date: today }, &mut day_events);
        Ok(day_events)
    }

    /// Run `n` days in a loop.
    pub fn run_days(&mut self, n: u32) -> LedgerResult<()> {
        self.clock.resume();
        for _ in 0..n {
            self.tick()?;
        }
        self.clock.pause();
        Ok(())
    }

    /// The last day that was run.
    pub fn today(&self) -> NaiveDate {
        self.clock.today
    }

    /// The day the next tick will run.
    pub fn next_day(&self) -> NaiveDate {
        self.clock.today.succ_opt().unwrap_or(self.clock.today)
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// A façade sharing this engine's rollup and cohort jobs.
    pub fn facade(&self) -> LedgerResult<ReportFacade> {
        Ok(ReportFacade::new(
            self.store.reopen()?,
            Arc::clone(&self.rollup),
            Arc::clone(&self.cohorts),
        ))
    }

    /// An action scorer writing to this engine's database.
    pub fn scorer(&self) -> LedgerResult<ActionScorer> {
        Ok(ActionScorer::new(self.store.reopen()?))
    }

    fn record(&self, date: NaiveDate, job: &str, event: LedgerEvent, out: &mut Vec<LedgerEvent>) {
        if let Err(e) = self.persist(date, job, &event) {
            log::error!("{date}: could not log {} from {job}: {e}", event.type_name());
        }
        out.push(event);
    }

    fn persist(&self, date: NaiveDate, job: &str, event: &LedgerEvent) -> LedgerResult<()> {
        let entry = EventLogEntry {
            id:         None,
            date,
            job:        job.to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        };
        self.store.append_event(&entry)
    }
}

/// Run one job if it is due. Errors, panics and a poisoned lock all come
/// back as a single `JobFailed` event.
fn run_slot(slot: &JobSlot, today: NaiveDate) -> (&'static str, Vec<LedgerEvent>) {
    let mut job = match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            let name = poisoned.get_ref().name();
            let err = LedgerError::LockPoisoned { job: name.to_string() };
            log::error!("{err}");
            return (name, vec![job_failed(name, &err)]);
        }
    };
    let name = job.name();
    if !job.schedule().is_due(today) {
        return (name, Vec::new());
    }

    let job: &mut dyn ScheduledJob = &mut *job;
    let outcome = catch_unwind(AssertUnwindSafe(|| job.run(today)))
        .unwrap_or_else(|_| Err(LedgerError::JobPanicked { job: name.to_string() }));
    match outcome {
        Ok(events) => (name, events),
        Err(e) => {
            log::error!("{name} failed on {today}: {e}");
            (name, vec![job_failed(name, &e)])
        }
    }
}

fn job_failed(name: &str, err: &LedgerError) -> LedgerEvent {
    LedgerEvent::JobFailed { job: name.to_string(), error: err.to_string() }
}
