//! ledger-runner: headless runner for the tier ledger engine.
//!
//! Usage:
//!   ledger-runner --seed 12345 --days 90 --start 2025-01-01 --db run.db
//!   ledger-runner --seed 7 --days 400 --stats-year 2025

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::env;
use tierledger_core::{
    config::LedgerConfig,
    engine::LedgerEngine,
    facade::{CohortStats, FinancialStats},
    store::LedgerStore,
    types::{Period, SubjectKind},
    workload::{Workload, WorkloadSize},
};

#[derive(serde::Serialize)]
struct YearStats {
    year:      i32,
    financial: Option<FinancialStats>,
    cohorts:   Vec<CohortStats>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let days = parse_arg(&args, "--days", 90u32);
    let start = flag_value(&args, "--start")
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("--start must be YYYY-MM-DD, got '{s}'"))
        })
        .transpose()?
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MIN));
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let stats_year: Option<i32> = flag_value(&args, "--stats-year").and_then(|s| s.parse().ok());

    println!("Tier ledger: ledger-runner");
    println!("  seed:      {seed}");
    println!("  days:      {days}");
    println!("  start:     {start}");
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    let config = LedgerConfig::load(data_dir)?;

    // A scratch database lets every job's connection see the same data
    // and is removed when the run ends.
    let store = if db == ":memory:" {
        LedgerStore::temporary()?
    } else {
        LedgerStore::open(db)?
    };
    store.migrate()?;

    let mut engine = LedgerEngine::build(config, store, start)?;
    let scorer = engine.scorer()?;
    let mut workload = Workload::new(seed, WorkloadSize::default());
    workload.populate(engine.store())?;

    engine.clock.resume();
    for _ in 0..days {
        let date = engine.next_day();
        workload.simulate_day(date, engine.store(), &scorer)?;
        engine.tick()?;
    }
    engine.clock.pause();
    log::info!("Run complete: {days} days from {start}, last day {}", engine.today());

    print_summary(&engine)?;

    if let Some(year) = stats_year {
        let facade = engine.facade()?;
        let today = engine.today();
        let stats = YearStats {
            year,
            financial: facade.financial_stats(year, today)?,
            cohorts: SubjectKind::ALL
                .iter()
                .map(|kind| facade.cohort_stats(*kind, year, today))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect(),
        };
        println!();
        println!("=== STATISTICS {year} ===");
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

fn print_summary(engine: &LedgerEngine) -> Result<()> {
    let store = engine.store();
    let today = engine.today();

    println!("=== RUN SUMMARY ===");
    println!("  last day:        {today}");
    println!("  payments:        {}", store.payment_count()?);
    println!("  reports:         {}", store.report_count()?);
    println!("  failed jobs:     {}", store.event_count("job_failed")?);
    println!("  failed phases:   {}", store.event_count("phase_failed")?);

    for kind in SubjectKind::ALL {
        let mut career = store.career_aggregates(kind)?;
        career.sort_by(|a, b| {
            a.rank_position.cmp(&b.rank_position).then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        println!();
        println!("=== TOP {} (career) ===", kind.as_str().to_uppercase());
        for agg in career.iter().take(3) {
            println!(
                "  #{:<3} {:<14} score {:>5}  {}",
                agg.rank_position, agg.subject_id, agg.score, agg.tier
            );
        }
    }

    println!();
    println!("=== LATEST FINANCIAL REPORT ===");
    match store.load_report(Period::of(today))? {
        Some(r) => {
            println!("  period:        {}", r.period);
            println!("  revenue:       {}", r.total_revenue);
            println!("  contracts:     {}", r.contract_count);
            println!("  tax:           {}", r.tax);
            println!("  net profit:    {}", r.net_profit);
            println!("  total salary:  {}", r.total_salary);
            println!("  avg rating:    {:.2} over {} ratings", r.avg_rating, r.total_rates);
        }
        None => println!("  (no report for {})", Period::of(today)),
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
