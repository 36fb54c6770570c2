use std::path::Path;
use std::sync::mpsc;

use libtstamp_merger::config::Config;
use libtstamp_merger::error::{ProcessorError, StreamStackError};
use libtstamp_merger::event::TimestampedEvent;
use libtstamp_merger::process::{process, process_run};
use libtstamp_merger::stream_file::{StreamRecord, StreamWriter};
use libtstamp_merger::worker_status::{WorkerStage, WorkerStatus};

fn write_segment(path: &Path, timestamps: &[u64]) {
    let mut writer = StreamWriter::new(path).unwrap();
    for (serial, ts) in timestamps.iter().enumerate() {
        let record = StreamRecord {
            event_id: 1,
            trigger_mask: 1,
            serial: serial as u32,
            data: vec![0xab; 8],
        };
        writer
            .write_event(&TimestampedEvent::new(*ts, record))
            .unwrap();
    }
    writer.finish().unwrap();
}

fn make_config(root: &Path, window_ticks: u64) -> Config {
    for dir in ["head", "tail", "out"] {
        std::fs::create_dir_all(root.join(dir)).unwrap();
    }
    Config {
        head_path: root.join("head"),
        tail_path: root.join("tail"),
        output_path: root.join("out"),
        window_ticks,
        queue_capacity: 16,
        stall_timeout_ms: 1_000,
        ..Default::default()
    }
}

fn make_run(config: &Config, run: &str, head: &[&[u64]], tail: &[&[u64]]) {
    let head_dir = config.head_path.join(run);
    let tail_dir = config.tail_path.join(run);
    std::fs::create_dir_all(&head_dir).unwrap();
    std::fs::create_dir_all(&tail_dir).unwrap();
    for (idx, segment) in head.iter().enumerate() {
        write_segment(&head_dir.join(format!("head-{idx:03}.tsq")), segment);
    }
    for (idx, segment) in tail.iter().enumerate() {
        write_segment(&tail_dir.join(format!("tail-{idx:03}.tsq")), segment);
    }
}

#[test]
fn run_listing_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path(), 5);
    make_run(&config, "run_0001", &[&[100], &[110]], &[&[102, 200]]);

    let (tx, rx) = mpsc::channel();
    process_run(&config, 1, &tx, &0).unwrap();
    drop(tx);

    let listing = std::fs::read_to_string(dir.path().join("out/run_0001.coinc")).unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(
        lines,
        vec![
            "coinc 100 102 2 0.100",
            "single head 110 window-timeout",
            "single tail 200 window-timeout",
        ]
    );

    let report = std::fs::read_to_string(dir.path().join("out/run_0001.yaml")).unwrap();
    let report: serde_yaml::Value = serde_yaml::from_str(&report).unwrap();
    assert_eq!(report["n_coinc"].as_u64(), Some(1));
    assert_eq!(report["head_singles"]["window_timeout"].as_u64(), Some(1));
    assert_eq!(report["tail_singles"]["window_timeout"].as_u64(), Some(1));
    assert_eq!(report["n_overflow"].as_u64(), Some(0));

    let statuses: Vec<WorkerStatus> = rx.iter().collect();
    assert_eq!(statuses.first().map(|s| s.stage), Some(WorkerStage::Correlating));
    assert_eq!(statuses.last().map(|s| s.stage), Some(WorkerStage::Finished));
    assert!(statuses.iter().all(|s| s.run_number == 1 && s.worker_id == 0));
}

#[test]
fn runs_missing_a_subsystem_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = make_config(dir.path(), 5);
    config.first_run_number = 1;
    config.last_run_number = 2;
    make_run(&config, "run_0001", &[&[10, 20]], &[&[11, 40]]);
    std::fs::create_dir_all(config.head_path.join("run_0002")).unwrap();

    let (tx, _rx) = mpsc::channel();
    process(config, tx, 0).unwrap();

    let listing = std::fs::read_to_string(dir.path().join("out/run_0001.coinc")).unwrap();
    assert_eq!(listing.lines().count(), 3);
    assert!(!dir.path().join("out/run_0002.coinc").exists());
}

#[test]
fn run_without_segments_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path(), 5);
    make_run(&config, "run_0003", &[&[10]], &[]);

    let (tx, _rx) = mpsc::channel();
    let result = process_run(&config, 3, &tx, &0);
    assert!(matches!(
        result,
        Err(ProcessorError::StackError(StreamStackError::NoMatchingFiles(_)))
    ));
}

#[test]
fn small_queue_keeps_resolving() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = make_config(dir.path(), 5);
    config.queue_capacity = 2;
    make_run(&config, "run_0004", &[&[1, 1, 1, 1, 1, 1]], &[&[1_000_000]]);

    let (tx, rx) = mpsc::channel();
    // The head producer waits for room until the tail event proves the 1s lonely
    process_run(&config, 4, &tx, &0).unwrap();
    drop(tx);
    assert_eq!(rx.iter().last().map(|s| s.stage), Some(WorkerStage::Finished));

    let listing = std::fs::read_to_string(dir.path().join("out/run_0004.coinc")).unwrap();
    assert_eq!(listing.lines().count(), 7);
    assert_eq!(
        listing.lines().filter(|l| l.starts_with("single head 1 ")).count(),
        6
    );
}
