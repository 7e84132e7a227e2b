//! Progress Sink Integration Tests
//!
//! Aggregation, derived metrics and cancellation through both sinks.

use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use titledl::domain::JobRecord;
use titledl::progress::format::{format_bytes, format_duration, format_eta, format_speed};
use titledl::progress::{ConsoleProgress, JobProgress, ProgressSink, ProgressState};
use tokio_util::sync::CancellationToken;

#[test]
fn test_aggregate_is_sum_of_latest_per_file() {
    let mut state = ProgressState::new();
    let start = Instant::now();
    state.start_clock(start);

    state.update_file_at("a.app", 100, start + Duration::from_secs(1));
    state.update_file_at("b.app", 50, start + Duration::from_secs(1));
    state.update_file_at("a.app", 300, start + Duration::from_secs(2));

    assert_eq!(state.aggregate(), 350);
    assert_eq!(state.file_bytes("a.app"), Some(300));
    assert_eq!(state.file_count(), 2);
}

#[test]
fn test_file_restart_lowers_aggregate() {
    let mut state = ProgressState::new();
    state.update_file("a.app", 500);
    state.update_file("a.app", 10);
    assert_eq!(state.aggregate(), 10);
}

#[test]
fn test_speed_and_eta() {
    let mut state = ProgressState::new();
    let start = Instant::now();
    state.start_clock(start);
    state.set_total_expected(1000);

    state.update_file_at("a.app", 250, start + Duration::from_secs(5));
    let metrics = state.metrics();

    assert_eq!(metrics.percent, 25.0);
    assert!((metrics.speed_bps - 50.0).abs() < 1e-9);
    assert_eq!(metrics.eta, Some(Duration::from_secs(15)));
}

#[test]
fn test_eta_unknown_without_total() {
    let mut state = ProgressState::new();
    let start = Instant::now();
    state.start_clock(start);
    state.update_file_at("a.app", 250, start + Duration::from_secs(5));

    let metrics = state.metrics();
    assert_eq!(metrics.total, None);
    assert_eq!(metrics.percent, 0.0);
    assert_eq!(metrics.eta, None);
    assert_eq!(format_eta(metrics.eta), "unknown");
}

#[test]
fn test_percent_is_capped() {
    let mut state = ProgressState::new();
    state.set_total_expected(100);
    state.update_file("a.app", 150);
    assert_eq!(state.metrics().percent, 100.0);
}

#[test]
fn test_reset_clears_counters_but_not_cancellation() {
    let mut state = ProgressState::new();
    state.set_total_expected(100);
    state.update_file("a.app", 40);
    state.mark_file_complete();
    state.cancel();

    state.reset();

    assert_eq!(state.aggregate(), 0);
    assert_eq!(state.total_expected(), None);
    assert_eq!(state.files_completed(), 0);
    assert_eq!(state.file_count(), 0);
    assert!(state.is_cancelled());
}

#[test]
fn test_transform_progress_is_clamped_and_leaves_bytes() {
    let sink = ConsoleProgress::hidden();
    sink.set_total_expected(100);
    sink.update_file_progress("a.app", 100);

    sink.update_transform_progress(1.7);
    assert_eq!(sink.snapshot().transform_fraction(), Some(1.0));
    sink.update_transform_progress(-0.5);
    assert_eq!(sink.snapshot().transform_fraction(), Some(0.0));

    assert_eq!(sink.snapshot().aggregate(), 100);
}

#[test]
fn test_console_request_cancel_fires_token() {
    let sink = ConsoleProgress::hidden();
    let token = sink.cancellation_token();

    assert!(!sink.is_cancelled());
    sink.request_cancel();
    assert!(sink.is_cancelled());
    assert!(token.is_cancelled());
}

#[test]
fn test_job_sink_is_safe_across_threads() {
    let record = Arc::new(RwLock::new(JobRecord::new("Title")));
    let sink = Arc::new(JobProgress::new(record.clone(), CancellationToken::new()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let sink = sink.clone();
            thread::spawn(move || {
                let file = format!("{:08}.app", i);
                for bytes in 1..=100u64 {
                    sink.update_file_progress(&file, bytes);
                }
                sink.mark_file_complete(&file);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let record = record.read().unwrap();
    assert_eq!(record.progress.aggregate(), 800);
    assert_eq!(record.progress.files_completed(), 8);
}

#[test]
fn test_human_readable_formatting() {
    assert_eq!(format_bytes(512), "512 B");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_speed(1536.0), "1.5 KB/s");
    assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
    assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
}
