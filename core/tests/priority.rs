mod common;

use cardaudit_core::{
    config::PipelineConfig,
    pipeline::AuditPipeline,
    priority::{ranking_order, PriorityRecord, PriorityTable},
};
use std::cmp::Ordering;
use std::collections::HashSet;

fn ranked(ordinary: usize, confidential: usize) -> PriorityTable {
    common::init_logging();
    let records = common::synthetic_batch(17, ordinary, confidential);
    let pipeline = AuditPipeline::new("priority-test".into(), PipelineConfig::default_test()).unwrap();
    pipeline.run(&records).unwrap().table
}

#[test]
fn scores_stay_in_their_ranges() {
    let table = ranked(220, 35);
    let within = |v: f64, lo: f64, hi: f64| v >= lo - 1e-9 && v <= hi + 1e-9;
    for r in table.records() {
        assert!(within(r.local_density_score, -1.0, 1.0), "local {}", r.local_density_score);
        assert!(within(r.isolation_score, -1.0, 1.0), "isolation {}", r.isolation_score);
        assert!(within(r.technical_score, -1.0, 1.0));
        assert!(within(r.financial_risk, 0.0, 1.0));
        assert!(within(r.priority_score, -0.7, 1.0), "priority {}", r.priority_score);
        let expected = 0.7 * r.technical_score + 0.3 * r.financial_risk;
        assert!((r.priority_score - expected).abs() < 1e-12);
    }

    // Min-max scaling pins the top of every normalized column.
    assert!((max_of(&table, |r| r.local_density_score) - 1.0).abs() < 1e-12);
    assert!((max_of(&table, |r| r.isolation_score) - 1.0).abs() < 1e-12);
    assert!((max_of(&table, |r| r.financial_risk) - 1.0).abs() < 1e-12);
}

fn max_of(table: &PriorityTable, f: impl Fn(&PriorityRecord) -> f64) -> f64 {
    table.records().iter().map(f).fold(f64::NEG_INFINITY, f64::max)
}

#[test]
fn every_input_row_is_ranked_once() {
    let table = ranked(150, 25);
    assert_eq!(table.len(), 175);
    let ids: HashSet<u64> = table.records().iter().map(|r| r.row_id).collect();
    assert_eq!(ids, (0..175).collect::<HashSet<u64>>());

    // Confidential rows are numbered first.
    for id in 0..25 {
        assert!(table.get(id).unwrap().record.is_confidential());
    }
    for id in 25..175 {
        assert!(!table.get(id).unwrap().record.is_confidential());
    }
}

#[test]
fn table_is_in_ranking_order_and_resorting_is_a_no_op() {
    let table = ranked(160, 20);
    for pair in table.records().windows(2) {
        assert_ne!(ranking_order(&pair[0], &pair[1]), Ordering::Greater);
    }
    let resorted = PriorityTable::new(table.clone().into_records());
    assert_eq!(resorted, table);
}

#[test]
fn cutoff_selects_the_top_decile() {
    let table = ranked(200, 0);
    let cut = table.cutoff(0.90).unwrap();
    let above = table.above_cutoff(0.90);
    assert!(!above.is_empty());
    assert!(above.iter().all(|r| r.priority_score >= cut));
    assert_eq!(above.len(), table.records().iter().filter(|r| r.priority_score >= cut).count());
    assert_eq!(table.top(5), &table.records()[..5]);
    assert_eq!(table.top(10_000).len(), table.len());
}

#[test]
fn jurisdiction_rollup_accounts_for_every_row() {
    let table = ranked(180, 20);
    let rollup = table.by_jurisdiction();
    assert_eq!(rollup.iter().map(|j| j.transactions).sum::<usize>(), table.len());
    let total: f64 = table.records().iter().map(|r| r.record.amount).sum();
    let rolled: f64 = rollup.iter().map(|j| j.total_amount).sum();
    assert!((total - rolled).abs() < 1e-6 * total.max(1.0));
    for j in &rollup {
        let best = table
            .records()
            .iter()
            .find(|r| r.jurisdiction == j.jurisdiction)
            .expect("rollup group has rows");
        // Rows are ranked, so the first match carries the group maximum.
        assert_eq!(j.max_priority, best.priority_score);
    }
}
