//! Tests for FilesOrchestrator
//!
//! These tests verify:
//! - Reuse of the last file while age, size and object count allow it
//! - Size validation before any file is touched
//! - Quota purge of the oldest files on new file creation
//! - Readable files: ordering, obsolescence, minimum age, exclusion, ignore-age mode
//! - Batch closed / batch deleted metrics

mod common;

use std::collections::HashSet;
use std::time::Duration;

use batchspool::clock::{self, DateProvider};
use batchspool::config::PerformancePreset;
use batchspool::storage::{Orchestrator, ReadableFile};
use batchspool::telemetry::{
    batch_closed, batch_deleted, MetricValue, RemovalReason, TRACK_KEY,
};
use batchspool::tlv::HEADER_SIZE;
use batchspool::SpoolError;

use common::{file_names, orchestrator_with, test_preset, OrchestratorFixture};

const MB: u64 = 1024 * 1024;

fn fixture() -> OrchestratorFixture {
    orchestrator_with(test_preset(), true)
}

/// Create a file in the fixture directory created `age` ago, holding `size` bytes
fn seed_file(fx: &OrchestratorFixture, age: Duration, size: usize) -> String {
    let name = clock::file_name_from(fx.clock.now() - age);
    let file = fx.directory.create_file(&name).unwrap();
    std::fs::write(file.path(), vec![0u8; size]).unwrap();
    name
}

fn readable_names(
    fx: &OrchestratorFixture,
    excluding: &HashSet<String>,
    limit: usize,
) -> Vec<String> {
    fx.orchestrator
        .get_readable_files(excluding, limit)
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

// =============================================================================
// Writable File Tests
// =============================================================================

#[test]
fn test_first_write_creates_file_named_after_now() {
    let fx = fixture();

    let file = fx.orchestrator.get_writable_file(10).unwrap();

    assert_eq!(file.name(), clock::file_name_from(fx.clock.now()));
    assert_eq!(file_names(&fx.directory), vec![file.name().to_string()]);
}

#[test]
fn test_reuses_file_while_limits_hold() {
    let fx = fixture();

    let first = fx.orchestrator.get_writable_file(10).unwrap();
    fx.clock.advance(Duration::from_secs(5));
    let second = fx.orchestrator.get_writable_file(10).unwrap();

    assert_eq!(first.name(), second.name());
    assert_eq!(file_names(&fx.directory).len(), 1);
}

#[test]
fn test_new_file_when_too_old_for_write() {
    let fx = fixture();

    let first = fx.orchestrator.get_writable_file(10).unwrap();
    fx.clock.advance(Duration::from_secs(11));
    let second = fx.orchestrator.get_writable_file(10).unwrap();

    assert_ne!(first.name(), second.name());
    assert_eq!(file_names(&fx.directory).len(), 2);
}

#[test]
fn test_file_at_exact_write_age_is_reused() {
    let fx = fixture();

    let first = fx.orchestrator.get_writable_file(10).unwrap();
    fx.clock.advance(Duration::from_secs(10));
    let second = fx.orchestrator.get_writable_file(10).unwrap();

    assert_eq!(first.name(), second.name());
}

#[test]
fn test_new_file_when_write_does_not_fit() {
    let fx = fixture();

    let first = fx.orchestrator.get_writable_file(400).unwrap();
    first.append(&[0u8; 400]).unwrap();
    let second = fx.orchestrator.get_writable_file(400).unwrap();
    second.append(&[0u8; 400]).unwrap();
    assert_eq!(first.name(), second.name());

    // 800 + 400 > max_file_size (1000)
    let third = fx.orchestrator.get_writable_file(400).unwrap();
    assert_ne!(first.name(), third.name());
}

#[test]
fn test_new_file_when_object_count_reached() {
    let fx = fixture();

    let names: Vec<String> = (0..4)
        .map(|_| fx.orchestrator.get_writable_file(1).unwrap().name().to_string())
        .collect();

    assert_eq!(names[0], names[1]);
    assert_eq!(names[1], names[2]);
    assert_ne!(names[2], names[3]);
}

#[test]
fn test_files_created_in_same_millisecond_get_distinct_names() {
    let fx = fixture();

    let first = fx.orchestrator.get_new_writable_file(1).unwrap();
    first.append(b"keep me").unwrap();
    let second = fx.orchestrator.get_new_writable_file(1).unwrap();

    assert_ne!(first.name(), second.name());
    let content = std::fs::read(fx.directory.path().join(first.name())).unwrap();
    assert_eq!(content, b"keep me");
}

#[test]
fn test_new_file_when_last_file_was_deleted() {
    let fx = fixture();

    let first = fx.orchestrator.get_writable_file(1).unwrap();
    std::fs::remove_file(fx.directory.path().join(first.name())).unwrap();
    fx.clock.advance(Duration::from_millis(1));
    let second = fx.orchestrator.get_writable_file(1).unwrap();

    assert_ne!(first.name(), second.name());
    assert!(fx.telemetry.errors().is_empty());
}

#[test]
fn test_forced_new_file_skips_reuse() {
    let fx = fixture();

    let first = fx.orchestrator.get_writable_file(1).unwrap();
    let second = fx.orchestrator.get_new_writable_file(1).unwrap();
    let third = fx.orchestrator.get_writable_file(1).unwrap();

    assert_ne!(first.name(), second.name());
    assert_eq!(second.name(), third.name());
}

#[test]
fn test_oversized_write_is_rejected_without_creating_file() {
    let fx = fixture();

    let err = fx.orchestrator.get_writable_file(501).err().unwrap();

    assert!(matches!(err, SpoolError::ObjectTooLarge { size: 501, limit: 500 }));
    assert!(file_names(&fx.directory).is_empty());
}

#[test]
fn test_large_writes_against_large_limits() {
    let preset = PerformancePreset::builder()
        .max_file_size(20 * MB)
        .max_object_size(10 * MB)
        .build();
    let fx = orchestrator_with(preset, false);

    let nine_mb = (9 * MB) as usize;
    let first = fx.orchestrator.get_writable_file(9 * MB).unwrap();
    first.append(&vec![1u8; nine_mb]).unwrap();

    let second = fx.orchestrator.get_writable_file(500 * 1024).unwrap();
    assert_eq!(first.name(), second.name());

    let err = fx.orchestrator.get_writable_file(11 * MB).err().unwrap();
    assert!(err.is_validation());

    // the rejected write left the open file usable
    let third = fx.orchestrator.get_writable_file(HEADER_SIZE as u64).unwrap();
    assert_eq!(first.name(), third.name());
    assert_eq!(file_names(&fx.directory).len(), 1);
}

// =============================================================================
// Purge Tests
// =============================================================================

#[test]
fn test_purge_deletes_oldest_files_until_under_quota() {
    let fx = fixture();
    let oldest = seed_file(&fx, Duration::from_secs(300), 4_000);
    let middle = seed_file(&fx, Duration::from_secs(200), 4_000);
    let newest = seed_file(&fx, Duration::from_secs(100), 4_000);

    // 12_000 > max_directory_size (10_000)
    let created = fx.orchestrator.get_writable_file(1).unwrap();

    let names = file_names(&fx.directory);
    assert!(!names.contains(&oldest));
    assert!(names.contains(&middle));
    assert!(names.contains(&newest));
    assert!(names.contains(&created.name().to_string()));

    let deleted = fx.telemetry.metrics_named(batch_deleted::NAME);
    assert_eq!(deleted.len(), 1);
    assert_eq!(
        deleted[0].get(batch_deleted::REMOVAL_REASON_KEY),
        Some(&MetricValue::from("purged"))
    );
}

#[test]
fn test_purge_keeps_directory_under_quota() {
    let fx = fixture();
    for age in 1..=8u64 {
        seed_file(&fx, Duration::from_secs(age * 60), 3_000);
    }

    fx.orchestrator.get_new_writable_file(1).unwrap();

    let total: u64 = fx
        .directory
        .files()
        .unwrap()
        .iter()
        .map(|f| f.size().unwrap())
        .sum();
    assert!(total <= test_preset().max_directory_size);
    // the three newest seeded files survive, plus the new empty one
    assert_eq!(file_names(&fx.directory).len(), 4);
}

#[test]
fn test_no_purge_under_quota() {
    let fx = fixture();
    seed_file(&fx, Duration::from_secs(100), 2_000);
    seed_file(&fx, Duration::from_secs(50), 2_000);

    fx.orchestrator.get_writable_file(1).unwrap();

    assert_eq!(file_names(&fx.directory).len(), 3);
}

// =============================================================================
// Readable File Tests
// =============================================================================

#[test]
fn test_readable_files_oldest_first() {
    let fx = fixture();
    let b = seed_file(&fx, Duration::from_secs(60), 10);
    let a = seed_file(&fx, Duration::from_secs(120), 10);
    let c = seed_file(&fx, Duration::from_secs(30), 10);

    let names = readable_names(&fx, &HashSet::new(), 10);

    assert_eq!(names, vec![a, b, c]);
}

#[test]
fn test_readable_files_respect_limit() {
    let fx = fixture();
    let oldest = seed_file(&fx, Duration::from_secs(90), 10);
    seed_file(&fx, Duration::from_secs(60), 10);
    seed_file(&fx, Duration::from_secs(30), 10);

    assert_eq!(readable_names(&fx, &HashSet::new(), 1), vec![oldest]);
}

#[test]
fn test_young_files_are_not_readable() {
    let fx = fixture();
    let old = seed_file(&fx, Duration::from_secs(25), 10);
    seed_file(&fx, Duration::from_secs(5), 10);

    assert_eq!(readable_names(&fx, &HashSet::new(), 10), vec![old]);
}

#[test]
fn test_file_being_written_is_not_readable() {
    let fx = fixture();

    fx.orchestrator.get_writable_file(1).unwrap();
    assert!(readable_names(&fx, &HashSet::new(), 10).is_empty());

    fx.clock.advance(Duration::from_secs(20));
    assert_eq!(readable_names(&fx, &HashSet::new(), 10).len(), 1);
}

#[test]
fn test_excluded_files_are_skipped() {
    let fx = fixture();
    let first = seed_file(&fx, Duration::from_secs(60), 10);
    let second = seed_file(&fx, Duration::from_secs(30), 10);

    let excluding: HashSet<String> = [first].into_iter().collect();

    assert_eq!(readable_names(&fx, &excluding, 10), vec![second]);
}

#[test]
fn test_obsolete_files_are_deleted_on_read() {
    let fx = fixture();
    let obsolete = seed_file(&fx, Duration::from_secs(2 * 60 * 60), 10);
    let fresh = seed_file(&fx, Duration::from_secs(60), 10);

    let names = readable_names(&fx, &HashSet::new(), 10);

    assert_eq!(names, vec![fresh.clone()]);
    assert_eq!(file_names(&fx.directory), vec![fresh]);
    assert!(!fx.directory.has_file(&obsolete));

    let deleted = fx.telemetry.metrics_named(batch_deleted::NAME);
    assert_eq!(deleted.len(), 1);
    assert_eq!(
        deleted[0].get(batch_deleted::REMOVAL_REASON_KEY),
        Some(&MetricValue::from("obsolete"))
    );
}

#[test]
fn test_unparsable_file_name_is_obsolete() {
    let fx = fixture();
    fx.directory.create_file("not-a-timestamp").unwrap();

    assert!(readable_names(&fx, &HashSet::new(), 10).is_empty());
    assert!(!fx.directory.has_file("not-a-timestamp"));
}

#[test]
fn test_ignore_age_returns_young_files() {
    let fx = fixture();
    let young = seed_file(&fx, Duration::from_secs(1), 10);

    assert!(readable_names(&fx, &HashSet::new(), 10).is_empty());

    fx.orchestrator.set_ignore_files_age_when_reading(true);
    assert!(fx.orchestrator.ignore_files_age_when_reading());
    assert_eq!(readable_names(&fx, &HashSet::new(), 10), vec![young]);
}

#[test]
fn test_ignore_age_still_deletes_obsolete_files() {
    let fx = fixture();
    seed_file(&fx, Duration::from_secs(2 * 60 * 60), 10);
    fx.orchestrator.set_ignore_files_age_when_reading(true);

    assert!(readable_names(&fx, &HashSet::new(), 10).is_empty());
    assert!(file_names(&fx.directory).is_empty());
}

#[test]
fn test_missing_directory_reads_as_empty() {
    let fx = fixture();
    std::fs::remove_dir_all(fx.directory.path()).unwrap();

    assert!(readable_names(&fx, &HashSet::new(), 10).is_empty());
    assert_eq!(fx.telemetry.errors().len(), 1);
}

// =============================================================================
// Delete and Metrics Tests
// =============================================================================

#[test]
fn test_delete_reports_removal_reason() {
    let fx = fixture();
    seed_file(&fx, Duration::from_secs(60), 10);
    let file = fx.orchestrator.get_readable_files(&HashSet::new(), 1).remove(0);

    fx.orchestrator
        .delete(file.as_ref(), RemovalReason::IntakeCode(202))
        .unwrap();

    assert!(file_names(&fx.directory).is_empty());
    let deleted = fx.telemetry.metrics_named(batch_deleted::NAME);
    assert_eq!(deleted.len(), 1);
    let attributes = &deleted[0];
    assert_eq!(
        attributes.get(batch_deleted::REMOVAL_REASON_KEY),
        Some(&MetricValue::from("intake-code-202"))
    );
    assert_eq!(attributes.get(TRACK_KEY), Some(&MetricValue::from("logs")));
    assert_eq!(
        attributes.get(batch_deleted::BATCH_AGE_KEY),
        Some(&MetricValue::Int(60_000))
    );
}

#[test]
fn test_flushed_deletion_sends_no_metric() {
    let fx = fixture();
    seed_file(&fx, Duration::from_secs(60), 10);
    let file = fx.orchestrator.get_readable_files(&HashSet::new(), 1).remove(0);

    fx.orchestrator
        .delete(file.as_ref(), RemovalReason::Flushed)
        .unwrap();

    assert!(file_names(&fx.directory).is_empty());
    assert!(fx.telemetry.metrics_named(batch_deleted::NAME).is_empty());
}

#[test]
fn test_delete_of_missing_file_returns_error() {
    let fx = fixture();
    seed_file(&fx, Duration::from_secs(60), 10);
    let file = fx.orchestrator.get_readable_files(&HashSet::new(), 1).remove(0);
    file.delete().unwrap();

    let result = fx.orchestrator.delete(file.as_ref(), RemovalReason::Invalid);

    assert!(matches!(result, Err(SpoolError::Io(_))));
    assert!(fx.telemetry.metrics_named(batch_deleted::NAME).is_empty());
}

#[test]
fn test_batch_closed_metric_on_rollover() {
    let fx = fixture();
    fx.orchestrator.get_writable_file(100).unwrap();
    fx.orchestrator.get_writable_file(50).unwrap();
    fx.clock.advance(Duration::from_secs(11));

    fx.orchestrator.get_writable_file(1).unwrap();

    let closed = fx.telemetry.metrics_named(batch_closed::NAME);
    assert_eq!(closed.len(), 1);
    let attributes = &closed[0];
    assert_eq!(
        attributes.get(batch_closed::BATCH_SIZE_KEY),
        Some(&MetricValue::Int(150))
    );
    assert_eq!(
        attributes.get(batch_closed::BATCH_EVENTS_COUNT_KEY),
        Some(&MetricValue::Int(2))
    );
    assert_eq!(
        attributes.get(batch_closed::BATCH_DURATION_KEY),
        Some(&MetricValue::Int(11_000))
    );
    assert_eq!(
        attributes.get(batch_closed::FORCED_NEW_KEY),
        Some(&MetricValue::Bool(false))
    );
}

#[test]
fn test_batch_closed_metric_marks_forced_new() {
    let fx = fixture();
    fx.orchestrator.get_writable_file(1).unwrap();
    fx.orchestrator.get_new_writable_file(1).unwrap();

    let closed = fx.telemetry.metrics_named(batch_closed::NAME);
    assert_eq!(closed.len(), 1);
    assert_eq!(
        closed[0].get(batch_closed::FORCED_NEW_KEY),
        Some(&MetricValue::Bool(true))
    );
}

#[test]
fn test_first_file_sends_no_closed_metric() {
    let fx = fixture();

    fx.orchestrator.get_writable_file(1).unwrap();

    assert!(fx.telemetry.metrics_named(batch_closed::NAME).is_empty());
}

#[test]
fn test_no_metrics_without_metrics_data() {
    let fx = orchestrator_with(test_preset(), false);
    seed_file(&fx, Duration::from_secs(2 * 60 * 60), 10);
    fx.orchestrator.get_writable_file(1).unwrap();
    fx.clock.advance(Duration::from_secs(11));
    fx.orchestrator.get_writable_file(1).unwrap();
    fx.orchestrator.get_readable_files(&HashSet::new(), 10);

    assert!(fx.telemetry.metrics.lock().is_empty());
}
