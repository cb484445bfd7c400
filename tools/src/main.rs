//! audit-runner: batch runner for the card-transaction audit pipeline.
//!
//! Usage:
//!   audit-runner --db audit.db --import rows.json
//!   audit-runner --db portal.db --sql portal_dump.sql
//!   audit-runner --db audit.db --config data/pipeline_config.json --top 20
//!   audit-runner --db audit.db --seed 7 --threads 4 --json

use anyhow::Result;
use cardaudit_core::{
    clean::{clean_transactions, RawTransaction},
    config::PipelineConfig,
    ensemble::split_partitions,
    pipeline::{new_run_id, AuditPipeline},
    priority::{JurisdictionSummary, PriorityRecord},
    store::AuditStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::env;

const REVIEW_QUANTILE: f64 = 0.90;

#[derive(Serialize)]
struct RunSummary<'a> {
    run_id: &'a str,
    started_at: DateTime<Utc>,
    elapsed_ms: i64,
    seed: u64,
    threads: usize,
    input_rows: usize,
    confidential_rows: usize,
    ordinary_rows: usize,
    flagged_rows: usize,
    cutoff_p90: Option<f64>,
    above_cutoff: usize,
    top: &'a [PriorityRecord],
    jurisdictions: Vec<JurisdictionSummary>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or("audit.db");
    let top = parse_arg(&args, "--top", 10usize);
    let json = args.iter().any(|a| a == "--json");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.seed = parse_arg(&args, "--seed", config.seed);
    if let Some(threads) = flag_value(&args, "--threads").and_then(|t| t.parse().ok()) {
        config.parallelism = Some(threads);
    }
    config.validate()?;

    let store = AuditStore::open(db)?;
    store.migrate()?;

    if let Some(path) = flag_value(&args, "--sql") {
        let script = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        store.execute_script(&script)?;
        log::info!("applied SQL script {path}");
    }

    if let Some(path) = flag_value(&args, "--import") {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let rows: Vec<RawTransaction> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        let n = store.insert_raw_transactions(&rows)?;
        log::info!("imported {n} raw rows from {path}");
    }

    let started_at = Utc::now();
    let raw = store.load_raw_transactions()?;
    let records = clean_transactions(&raw)?;

    let run_id = new_run_id();
    store.insert_run(&run_id, &config, env!("CARGO_PKG_VERSION"))?;

    let pipeline = AuditPipeline::new(run_id.clone(), config.clone())?;
    let output = pipeline.run(&records)?;
    store.append_events(&output.event_log()?)?;
    store.save_priority_table(&run_id, &output.table)?;

    let partitions = split_partitions(&records);
    let table = &output.table;
    let summary = RunSummary {
        run_id: &run_id,
        started_at,
        elapsed_ms: (Utc::now() - started_at).num_milliseconds(),
        seed: config.seed,
        threads: pipeline.threads(),
        input_rows: records.len(),
        confidential_rows: partitions.confidential.len(),
        ordinary_rows: partitions.ordinary.len(),
        flagged_rows: table.outlier_count(),
        cutoff_p90: table.cutoff(REVIEW_QUANTILE),
        above_cutoff: table.above_cutoff(REVIEW_QUANTILE).len(),
        top: table.top(top),
        jurisdictions: table.by_jurisdiction(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(s: &RunSummary<'_>) {
    println!("=== AUDIT RUN ===");
    println!("  run_id:        {}", s.run_id);
    println!("  started:       {}", s.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  elapsed:       {} ms", s.elapsed_ms);
    println!("  seed:          {}", s.seed);
    println!("  threads:       {}", s.threads);
    println!("  rows:          {}", s.input_rows);
    println!("  confidential:  {}", s.confidential_rows);
    println!("  ordinary:      {}", s.ordinary_rows);
    println!("  flagged:       {}", s.flagged_rows);
    match s.cutoff_p90 {
        Some(cut) => println!("  p90 cutoff:    {cut:.4} ({} rows at or above)", s.above_cutoff),
        None => println!("  p90 cutoff:    (no rows)"),
    }

    println!();
    println!("=== TOP {} ===", s.top.len());
    for (rank, p) in s.top.iter().enumerate() {
        println!(
            "  {:>3}. row {:>6} | {:<5} | R$ {:>12.2} | priority {:.4} | {}",
            rank + 1,
            p.row_id,
            p.jurisdiction.as_str(),
            p.record.amount,
            p.priority_score,
            p.record.beneficiary_name
        );
    }

    println!();
    println!("=== BY JURISDICTION ===");
    for j in &s.jurisdictions {
        println!(
            "  {:<5} | {:>7} txns | R$ {:>14.2} | max priority {:.4}",
            j.jurisdiction.as_str(),
            j.transactions, j.total_amount, j.max_priority
        );
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
