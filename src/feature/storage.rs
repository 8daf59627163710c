//! Feature Storage
//!
//! Binds one feature's consent to the right directory and serializes every
//! disk operation of that feature on its worker.

use std::sync::Arc;

use crate::clock::DateProvider;
use crate::config::PerformancePreset;
use crate::encryption::DataEncryption;
use crate::error::Result;
use crate::storage::{FilesOrchestrator, MetricsData, Orchestrator};
use crate::telemetry::Telemetry;

use super::reader::{DataReader, FileReader, Reader};
use super::worker::Worker;
use super::writer::{AsyncWriter, FileWriter, NopWriter, Writer};
use super::{Consent, FeatureDirectories};

/// Consent-aware storage of one feature
///
/// ## Concurrency Model: one worker per feature
///
/// - **Writes, migrations, clears**: queued on the worker, caller does not wait
/// - **Reads, ignore-age toggle**: queued on the worker, caller waits
///
/// Operations run in submission order, so a read queued after a write sees it
/// and a migration never races a write.
pub struct FeatureStorage {
    feature_name: String,

    /// Serial execution context for all disk work of this feature
    worker: Arc<Worker>,

    directories: FeatureDirectories,

    /// Orchestrates `directories.authorized`
    authorized: Arc<dyn Orchestrator>,

    /// Orchestrates `directories.unauthorized`
    unauthorized: Arc<dyn Orchestrator>,

    encryption: Option<Arc<dyn DataEncryption>>,

    telemetry: Arc<dyn Telemetry>,

    max_block_size: u64,

    /// Shared so acknowledged files stay excluded across calls
    reader: Arc<DataReader>,
}

impl FeatureStorage {
    /// Storage backed by files in `directories`.
    ///
    /// Only the authorized orchestrator reports batch metrics.
    pub fn new(
        feature_name: &str,
        directories: FeatureDirectories,
        performance: PerformancePreset,
        date_provider: Arc<dyn DateProvider>,
        encryption: Option<Arc<dyn DataEncryption>>,
        telemetry: Arc<dyn Telemetry>,
        max_block_size: u64,
    ) -> Result<Self> {
        let authorized = Arc::new(FilesOrchestrator::new(
            directories.authorized.clone(),
            performance.clone(),
            Arc::clone(&date_provider),
            Arc::clone(&telemetry),
            Some(MetricsData {
                track_name: feature_name.to_string(),
            }),
        ));
        let unauthorized = Arc::new(FilesOrchestrator::new(
            directories.unauthorized.clone(),
            performance,
            date_provider,
            Arc::clone(&telemetry),
            None,
        ));

        Self::with_orchestrators(
            feature_name,
            directories,
            authorized,
            unauthorized,
            encryption,
            telemetry,
            max_block_size,
        )
    }

    /// Storage over caller-provided orchestrators
    pub fn with_orchestrators(
        feature_name: &str,
        directories: FeatureDirectories,
        authorized: Arc<dyn Orchestrator>,
        unauthorized: Arc<dyn Orchestrator>,
        encryption: Option<Arc<dyn DataEncryption>>,
        telemetry: Arc<dyn Telemetry>,
        max_block_size: u64,
    ) -> Result<Self> {
        let worker = Arc::new(Worker::spawn(feature_name, Arc::clone(&telemetry))?);

        let reader = Arc::new(DataReader::new(
            FileReader::new(
                Arc::clone(&authorized),
                encryption.clone(),
                Arc::clone(&telemetry),
                max_block_size,
            ),
            Arc::clone(&worker),
        ));

        Ok(Self {
            feature_name: feature_name.to_string(),
            worker,
            directories,
            authorized,
            unauthorized,
            encryption,
            telemetry,
            max_block_size,
            reader,
        })
    }

    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    pub fn directories(&self) -> &FeatureDirectories {
        &self.directories
    }

    /// Writer for events collected under `consent`.
    ///
    /// `NotGranted` yields a writer that drops everything.
    pub fn writer(&self, consent: Consent, force_new_batch: bool) -> Arc<dyn Writer> {
        let orchestrator = match consent {
            Consent::Granted => &self.authorized,
            Consent::Pending => &self.unauthorized,
            Consent::NotGranted => return Arc::new(NopWriter),
        };

        let file_writer = FileWriter::new(
            Arc::clone(orchestrator),
            force_new_batch,
            self.encryption.clone(),
            Arc::clone(&self.telemetry),
            self.max_block_size,
        );
        Arc::new(AsyncWriter::new(file_writer, Arc::clone(&self.worker)))
    }

    /// Reader over the authorized directory only
    pub fn reader(&self) -> Arc<dyn Reader> {
        Arc::clone(&self.reader) as Arc<dyn Reader>
    }

    /// Apply a consent change to data recorded while consent was pending
    pub fn migrate_unauthorized_data(&self, to_consent: Consent) {
        let directories = self.directories.clone();
        let telemetry = Arc::clone(&self.telemetry);
        let feature = self.feature_name.clone();

        self.worker.run_async(move || {
            let result = match to_consent {
                Consent::NotGranted => directories.unauthorized.delete_all_files(),
                Consent::Granted => directories
                    .unauthorized
                    .move_all_files_to(&directories.authorized),
                Consent::Pending => Ok(()),
            };
            match result {
                Ok(()) => {
                    tracing::debug!(%feature, consent = %to_consent, "Migrated unauthorized data")
                }
                Err(e) => telemetry.error("Failed to migrate unauthorized data", &e),
            }
        });
    }

    /// Delete data recorded while consent was pending
    pub fn clear_unauthorized_data(&self) {
        let unauthorized = self.directories.unauthorized.clone();
        let telemetry = Arc::clone(&self.telemetry);

        self.worker.run_async(move || {
            if let Err(e) = unauthorized.delete_all_files() {
                telemetry.error("Failed to clear unauthorized data", &e);
            }
        });
    }

    /// Delete every batch of this feature
    pub fn clear_all_data(&self) {
        let directories = self.directories.clone();
        let telemetry = Arc::clone(&self.telemetry);

        self.worker.run_async(move || {
            let result = directories
                .authorized
                .delete_all_files()
                .and_then(|()| directories.unauthorized.delete_all_files());
            if let Err(e) = result {
                telemetry.error("Failed to clear data", &e);
            }
        });
    }

    /// Toggle the age rules of reads; blocks until applied
    pub fn set_ignore_files_age_when_reading(&self, value: bool) {
        let authorized = Arc::clone(&self.authorized);
        let unauthorized = Arc::clone(&self.unauthorized);

        let result = self.worker.run_sync(move || {
            authorized.set_ignore_files_age_when_reading(value);
            unauthorized.set_ignore_files_age_when_reading(value);
        });
        if let Err(e) = result {
            self.telemetry.error("Failed to update read policy", &e);
        }
    }

    /// Block until every operation queued so far has run
    pub fn flush(&self) {
        if let Err(e) = self.worker.flush() {
            self.telemetry.error("Failed to flush feature storage", &e);
        }
    }
}
