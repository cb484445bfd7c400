mod common;

use cardaudit_core::{
    config::PipelineConfig,
    error::AuditError,
    event::PipelineEvent,
    pipeline::AuditPipeline,
};

fn pipeline(config: PipelineConfig) -> AuditPipeline {
    common::init_logging();
    AuditPipeline::new("pipeline-test".into(), config).expect("pipeline")
}

#[test]
fn events_follow_stage_order() {
    let records = common::synthetic_batch(2, 140, 30);
    let out = pipeline(PipelineConfig::default_test()).run(&records).unwrap();

    let stages: Vec<&str> = out.events.iter().map(|e| e.stage()).collect();
    assert_eq!(
        stages,
        ["pipeline", "jurisdiction", "features", "ensemble", "ensemble", "ensemble", "ensemble", "fusion", "pipeline"]
    );
    assert!(matches!(out.events[0], PipelineEvent::RunInitialized { input_rows: 170, .. }));
    assert!(matches!(
        out.events.last(),
        Some(PipelineEvent::RunCompleted { ranked_rows: 170, .. })
    ));

    let log = out.event_log().unwrap();
    assert_eq!(log.len(), out.events.len());
    assert!(log.iter().enumerate().all(|(i, e)| e.seq == i as u64 && e.run_id == "pipeline-test"));
}

#[test]
fn batch_without_confidential_rows_still_ranks() {
    let records = common::synthetic_batch(4, 120, 0);
    let out = pipeline(PipelineConfig::default_test()).run(&records).unwrap();
    assert_eq!(out.table.len(), 120);
    let skipped = out
        .events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::PartitionSkipped { .. }))
        .count();
    assert_eq!(skipped, 2);
}

#[test]
fn empty_batch_gives_empty_table() {
    let out = pipeline(PipelineConfig::default_test()).run(&[]).unwrap();
    assert!(out.table.is_empty());
    assert_eq!(out.table.cutoff(0.9), None);
    assert!(out.table.above_cutoff(0.9).is_empty());
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = PipelineConfig::default_test();
    config.isolation.contamination = 0.0;
    let err = AuditPipeline::new("bad".into(), config).err().expect("config must fail");
    assert!(matches!(err, AuditError::InvalidConfig { .. }), "{err}");
}

#[test]
fn thread_count_follows_config() {
    let mut config = PipelineConfig::default_test();
    config.parallelism = Some(3);
    assert_eq!(pipeline(config).threads(), 3);
}
