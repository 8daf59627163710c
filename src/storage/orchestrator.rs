//! Files Orchestrator
//!
//! Owns the policy for one directory of batch files.
//!
//! ## Responsibilities
//! - Pick the file receiving the next write (reuse or create)
//! - Evict the oldest files when the directory exceeds its quota
//! - List readable files, oldest first, deleting obsolete ones on the way
//! - Report batch lifecycle metrics

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::clock::{self, DateProvider};
use crate::config::PerformancePreset;
use crate::error::{Result, SpoolError};
use crate::telemetry::{
    batch_closed, batch_deleted, MetricAttributes, MetricValue, RemovalReason, Telemetry,
    METRIC_TYPE_KEY, TRACK_KEY, UPLOADER_WINDOW_KEY,
};

use super::{BatchFile, Directory, ReadableFile, WritableFile};

/// File policy for one directory
///
/// Implemented by [`FilesOrchestrator`] on disk and by
/// [`InMemoryOrchestrator`](super::InMemoryOrchestrator) for tests.
pub trait Orchestrator: Send + Sync {
    /// Limits this orchestrator enforces
    fn performance(&self) -> &PerformancePreset;

    /// File for a write of `write_size` bytes, reusing the last one when it still qualifies
    fn get_writable_file(&self, write_size: u64) -> Result<Arc<dyn WritableFile>>;

    /// Always start a new file for a write of `write_size` bytes
    fn get_new_writable_file(&self, write_size: u64) -> Result<Arc<dyn WritableFile>>;

    /// Up to `limit` readable files, oldest first
    fn get_readable_files(
        &self,
        excluding: &HashSet<String>,
        limit: usize,
    ) -> Vec<Arc<dyn ReadableFile>>;

    /// Delete a file that was read (or is no longer wanted).
    ///
    /// The deletion metric is sent only once the file is gone.
    fn delete(&self, file: &dyn ReadableFile, reason: RemovalReason) -> Result<()>;

    fn ignore_files_age_when_reading(&self) -> bool;

    fn set_ignore_files_age_when_reading(&self, value: bool);
}

/// Extra information attached to batch metrics.
/// Orchestrators without it report no metrics.
#[derive(Debug, Clone)]
pub struct MetricsData {
    /// Track name reported with every metric
    pub track_name: String,
}

/// Approximate state of the last writable file.
///
/// Counters assume every requested write succeeded.
#[derive(Debug, Default)]
struct WritableState {
    last_file_name: Option<String>,
    object_count: u64,
    approximate_size: u64,
}

/// Orchestrates batch files in a single directory
pub struct FilesOrchestrator {
    /// Directory where files are stored
    directory: Directory,

    /// Limits for writing and reading files
    performance: PerformancePreset,

    date_provider: Arc<dyn DateProvider>,

    telemetry: Arc<dyn Telemetry>,

    metrics: Option<MetricsData>,

    /// Last writable file and its approximate counters
    state: Mutex<WritableState>,

    ignore_files_age_when_reading: AtomicBool,
}

impl FilesOrchestrator {
    pub fn new(
        directory: Directory,
        performance: PerformancePreset,
        date_provider: Arc<dyn DateProvider>,
        telemetry: Arc<dyn Telemetry>,
        metrics: Option<MetricsData>,
    ) -> Self {
        Self {
            directory,
            performance,
            date_provider,
            telemetry,
            metrics,
            state: Mutex::new(WritableState::default()),
            ignore_files_age_when_reading: AtomicBool::new(false),
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    // =========================================================================
    // Writable files
    // =========================================================================

    fn validate(&self, write_size: u64) -> Result<()> {
        if write_size > self.performance.max_object_size {
            return Err(SpoolError::ObjectTooLarge {
                size: write_size,
                limit: self.performance.max_object_size,
            });
        }
        Ok(())
    }

    /// Last writable file if age, size and object count all still allow one more write
    fn reuse_last_writable_file(
        &self,
        state: &WritableState,
        write_size: u64,
    ) -> Option<BatchFile> {
        let name = state.last_file_name.as_deref()?;
        if !self.directory.has_file(name) {
            return None; // expected once the file was read or purged
        }

        let file = match self.directory.file(name) {
            Ok(file) => file,
            Err(e) => {
                self.telemetry.error("Failed to reuse last writable file", &e);
                return None;
            }
        };
        let size = match file.size() {
            Ok(size) => size,
            Err(e) => {
                self.telemetry.error("Failed to reuse last writable file", &e);
                return None;
            }
        };

        let file_age = clock::age(
            self.date_provider.now(),
            clock::file_creation_time_from(name),
        );
        let recent_enough = file_age <= self.performance.max_file_age_for_write;
        let has_room = size.saturating_add(write_size) <= self.performance.max_file_size;
        let can_take_more = state.object_count < self.performance.max_objects_in_file;

        if recent_enough && has_room && can_take_more {
            Some(file)
        } else {
            None
        }
    }

    /// Called with the state lock held
    fn create_new_writable_file(
        &self,
        state: &mut WritableState,
        write_size: u64,
    ) -> Result<Arc<dyn WritableFile>> {
        // Purging scans the whole directory, so it only runs when a new file is created.
        self.purge_directory_if_needed();

        let name = self.unused_file_name();
        let file = self.directory.create_file(&name)?;
        tracing::debug!(
            directory = %self.directory.path().display(),
            file = %name,
            "Created batch file"
        );

        state.last_file_name = Some(name);
        state.object_count = 1;
        state.approximate_size = write_size;
        Ok(Arc::new(file))
    }

    /// Name for a new file at the current time.
    /// Two files created within the same millisecond get consecutive names.
    fn unused_file_name(&self) -> String {
        let name = clock::file_name_from(self.date_provider.now());
        self.directory.available_name(&name).unwrap_or(name)
    }

    // =========================================================================
    // Directory quota
    // =========================================================================

    /// Delete the oldest files until the directory fits `max_directory_size`
    fn purge_directory_if_needed(&self) {
        let files = match self.directory.files() {
            Ok(files) => files,
            Err(e) => {
                self.telemetry.error("Failed to purge files directory", &e);
                return;
            }
        };

        let mut sized: Vec<(BatchFile, SystemTime, u64)> = files
            .into_iter()
            .filter_map(|file| {
                let size = file.size().ok()?;
                let created = clock::file_creation_time_from(file.name());
                Some((file, created, size))
            })
            .collect();
        sized.sort_by(|a, b| a.1.cmp(&b.1));

        let total: u64 = sized.iter().map(|(_, _, size)| size).sum();
        if total <= self.performance.max_directory_size {
            return;
        }

        let size_to_free = total - self.performance.max_directory_size;
        let mut freed = 0u64;
        tracing::info!(
            directory = %self.directory.path().display(),
            total,
            size_to_free,
            "Directory over quota, purging oldest batches"
        );

        for (file, _, size) in sized {
            if freed >= size_to_free {
                break;
            }
            match file.delete() {
                Ok(()) => {
                    freed += size;
                    self.send_batch_deleted_metric(file.name(), RemovalReason::Purged);
                }
                Err(e) => self.telemetry.error("Failed to purge batch file", &e),
            }
        }
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    fn send_batch_deleted_metric(&self, file_name: &str, reason: RemovalReason) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        if !reason.include_in_metric() {
            return;
        }

        let batch_age = clock::age(
            self.date_provider.now(),
            clock::file_creation_time_from(file_name),
        );

        let mut attributes = MetricAttributes::new();
        attributes.insert(METRIC_TYPE_KEY, batch_deleted::TYPE_VALUE.into());
        attributes.insert(TRACK_KEY, metrics.track_name.as_str().into());
        attributes.insert(
            UPLOADER_WINDOW_KEY,
            MetricValue::Int(self.performance.uploader_window().as_millis() as u64),
        );
        attributes.insert(
            batch_deleted::BATCH_AGE_KEY,
            MetricValue::Int(batch_age.as_millis() as u64),
        );
        attributes.insert(batch_deleted::REMOVAL_REASON_KEY, reason.to_string().into());

        self.telemetry.metric(batch_deleted::NAME, attributes);
    }

    fn send_batch_closed_metric(&self, state: &WritableState, forced_new: bool) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let Some(file_name) = state.last_file_name.as_deref() else {
            return;
        };

        let duration = clock::age(
            self.date_provider.now(),
            clock::file_creation_time_from(file_name),
        );

        let mut attributes = MetricAttributes::new();
        attributes.insert(METRIC_TYPE_KEY, batch_closed::TYPE_VALUE.into());
        attributes.insert(TRACK_KEY, metrics.track_name.as_str().into());
        attributes.insert(
            UPLOADER_WINDOW_KEY,
            MetricValue::Int(self.performance.uploader_window().as_millis() as u64),
        );
        attributes.insert(batch_closed::BATCH_SIZE_KEY, state.approximate_size.into());
        attributes.insert(batch_closed::BATCH_EVENTS_COUNT_KEY, state.object_count.into());
        attributes.insert(
            batch_closed::BATCH_DURATION_KEY,
            MetricValue::Int(duration.as_millis() as u64),
        );
        attributes.insert(batch_closed::FORCED_NEW_KEY, forced_new.into());

        self.telemetry.metric(batch_closed::NAME, attributes);
    }
}

impl Orchestrator for FilesOrchestrator {
    fn performance(&self) -> &PerformancePreset {
        &self.performance
    }

    fn get_writable_file(&self, write_size: u64) -> Result<Arc<dyn WritableFile>> {
        self.validate(write_size)?;

        let mut state = self.state.lock();
        if let Some(file) = self.reuse_last_writable_file(&state, write_size) {
            state.object_count += 1;
            state.approximate_size += write_size;
            return Ok(Arc::new(file));
        }

        self.send_batch_closed_metric(&state, false);
        self.create_new_writable_file(&mut state, write_size)
    }

    fn get_new_writable_file(&self, write_size: u64) -> Result<Arc<dyn WritableFile>> {
        self.validate(write_size)?;

        let mut state = self.state.lock();
        self.send_batch_closed_metric(&state, true);
        self.create_new_writable_file(&mut state, write_size)
    }

    fn get_readable_files(
        &self,
        excluding: &HashSet<String>,
        limit: usize,
    ) -> Vec<Arc<dyn ReadableFile>> {
        let files = match self.directory.files() {
            Ok(files) => files,
            Err(e) => {
                self.telemetry.error("Failed to obtain readable files", &e);
                return Vec::new();
            }
        };

        let now = self.date_provider.now();
        let mut candidates: Vec<(BatchFile, SystemTime)> = Vec::with_capacity(files.len());

        for file in files {
            let created = clock::file_creation_time_from(file.name());
            if clock::age(now, created) > self.performance.max_file_age_for_read {
                match file.delete() {
                    Ok(()) => {
                        tracing::debug!(file = %file.name(), "Deleted obsolete batch");
                        self.send_batch_deleted_metric(file.name(), RemovalReason::Obsolete);
                    }
                    Err(e) => self.telemetry.error("Failed to delete obsolete file", &e),
                }
                continue;
            }
            candidates.push((file, created));
        }

        // oldest first
        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let ignore_age = self.ignore_files_age_when_reading();
        candidates
            .into_iter()
            .filter(|(file, created)| {
                ignore_age
                    || (!excluding.contains(file.name())
                        && clock::age(now, *created) >= self.performance.min_file_age_for_read)
            })
            .take(limit)
            .map(|(file, _)| Arc::new(file) as Arc<dyn ReadableFile>)
            .collect()
    }

    fn delete(&self, file: &dyn ReadableFile, reason: RemovalReason) -> Result<()> {
        file.delete()?;
        self.send_batch_deleted_metric(file.name(), reason);
        Ok(())
    }

    fn ignore_files_age_when_reading(&self) -> bool {
        self.ignore_files_age_when_reading.load(Ordering::SeqCst)
    }

    fn set_ignore_files_age_when_reading(&self, value: bool) {
        self.ignore_files_age_when_reading.store(value, Ordering::SeqCst);
    }
}
