//! Shared test helpers

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use batchspool::clock::{self, DateProvider};
use batchspool::config::PerformancePreset;
use batchspool::storage::{Directory, FilesOrchestrator, MetricsData};
use batchspool::telemetry::{MetricAttributes, Telemetry};
use batchspool::SpoolError;
use tempfile::TempDir;

// =============================================================================
// Clock
// =============================================================================

/// Clock moved by hand
pub struct ManualDateProvider {
    now: Mutex<SystemTime>,
}

impl ManualDateProvider {
    /// Starts one day after the reference epoch so file names are non-zero
    pub fn new() -> Self {
        Self::at(clock::reference_epoch() + Duration::from_secs(24 * 60 * 60))
    }

    pub fn at(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl DateProvider for ManualDateProvider {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

// =============================================================================
// Telemetry
// =============================================================================

/// Records every error and metric it receives
#[derive(Default)]
pub struct RecordingTelemetry {
    pub errors: Mutex<Vec<String>>,
    pub metrics: Mutex<Vec<(String, MetricAttributes)>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn metrics_named(&self, name: &str) -> Vec<MetricAttributes> {
        self.metrics
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, attributes)| attributes.clone())
            .collect()
    }
}

impl Telemetry for RecordingTelemetry {
    fn error(&self, message: &str, error: &SpoolError) {
        self.errors.lock().push(format!("{}: {}", message, error));
    }

    fn metric(&self, name: &str, attributes: MetricAttributes) {
        self.metrics.lock().push((name.to_string(), attributes));
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn setup_temp_directory() -> (TempDir, Directory) {
    let temp_dir = TempDir::new().unwrap();
    let directory = Directory::open(temp_dir.path().join("batches")).unwrap();
    (temp_dir, directory)
}

/// Preset with round numbers: reuse for 10s, readable after 20s, obsolete after 1h
pub fn test_preset() -> PerformancePreset {
    PerformancePreset::builder()
        .max_file_size(1_000)
        .max_directory_size(10_000)
        .max_file_age_for_write(Duration::from_secs(10))
        .min_file_age_for_read(Duration::from_secs(20))
        .max_file_age_for_read(Duration::from_secs(60 * 60))
        .max_objects_in_file(3)
        .max_object_size(500)
        .build()
}

pub struct OrchestratorFixture {
    pub orchestrator: FilesOrchestrator,
    pub clock: Arc<ManualDateProvider>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub directory: Directory,
    _temp: TempDir,
}

pub fn orchestrator_with(preset: PerformancePreset, metrics: bool) -> OrchestratorFixture {
    let (temp, directory) = setup_temp_directory();
    let clock = Arc::new(ManualDateProvider::new());
    let telemetry = Arc::new(RecordingTelemetry::new());
    let metrics = metrics.then(|| MetricsData {
        track_name: "logs".to_string(),
    });

    let orchestrator = FilesOrchestrator::new(
        directory.clone(),
        preset,
        clock.clone(),
        telemetry.clone(),
        metrics,
    );

    OrchestratorFixture {
        orchestrator,
        clock,
        telemetry,
        directory,
        _temp: temp,
    }
}

/// Sorted names of the files in `directory`
pub fn file_names(directory: &Directory) -> Vec<String> {
    let mut names: Vec<String> = directory
        .files()
        .unwrap()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    names.sort_by_key(|n| n.parse::<u64>().unwrap_or(0));
    names
}
