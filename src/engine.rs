//! Engine Module
//!
//! Top-level coordinator for every feature of one SDK instance.
//!
//! ## Responsibilities
//! - Resolve the instance directory
//! - Register features and build their storage
//! - Track the current consent and migrate pending data when it changes
//! - Fan out bulk operations (clear, flush, read policy) to all features

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::{DateProvider, SystemDateProvider};
use crate::config::{Config, PerformancePreset};
use crate::encryption::DataEncryption;
use crate::error::Result;
use crate::feature::{Consent, CoreDirectory, FeatureStorage, Writer};
use crate::telemetry::{Telemetry, TracingTelemetry};

/// The storage engine of one SDK instance
///
/// ## Concurrency Model
///
/// - `features`: RwLock, written only on registration
/// - `consent`: RwLock, held for writing while a change is fanned out so no
///   writer can be created with a stale consent mid-migration
/// - All disk work happens on the per-feature workers
pub struct Engine {
    config: Config,

    /// `{cache_root}/{org_id}/v2/{instance_id}`
    directory: CoreDirectory,

    consent: RwLock<Consent>,

    features: RwLock<HashMap<String, Arc<FeatureStorage>>>,

    date_provider: Arc<dyn DateProvider>,

    telemetry: Arc<dyn Telemetry>,

    encryption: Option<Arc<dyn DataEncryption>>,
}

impl Engine {
    /// Open the engine for `config` with an initial consent
    ///
    /// Uses the wall clock, `tracing` telemetry and no encryption; see the
    /// `with_*` methods to replace them before registering features.
    pub fn open(config: Config, consent: Consent) -> Result<Self> {
        let directory = CoreDirectory::open(&config)?;

        tracing::info!(
            path = %directory.core_directory.path().display(),
            %consent,
            "Storage engine opened"
        );

        Ok(Self {
            config,
            directory,
            consent: RwLock::new(consent),
            features: RwLock::new(HashMap::new()),
            date_provider: Arc::new(SystemDateProvider),
            telemetry: Arc::new(TracingTelemetry),
            encryption: None,
        })
    }

    pub fn with_date_provider(mut self, date_provider: Arc<dyn DateProvider>) -> Self {
        self.date_provider = date_provider;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_encryption(mut self, encryption: Arc<dyn DataEncryption>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Register a feature with the engine-wide performance preset
    pub fn register_feature(&self, name: &str) -> Result<Arc<FeatureStorage>> {
        self.register_feature_with(name, self.config.performance.clone())
    }

    /// Register a feature with its own performance preset.
    ///
    /// Data left in the unauthorized directory by a previous process is
    /// deleted: pending consent never carries over a restart.
    /// Registering an existing name returns the existing storage.
    pub fn register_feature_with(
        &self,
        name: &str,
        performance: PerformancePreset,
    ) -> Result<Arc<FeatureStorage>> {
        let mut features = self.features.write();
        if let Some(existing) = features.get(name) {
            tracing::debug!(feature = name, "Feature already registered");
            return Ok(Arc::clone(existing));
        }

        let directories = self.directory.feature_directories(name)?;
        let storage = Arc::new(FeatureStorage::new(
            name,
            directories,
            performance,
            Arc::clone(&self.date_provider),
            self.encryption.clone(),
            Arc::clone(&self.telemetry),
            self.config.max_block_size,
        )?);
        storage.clear_unauthorized_data();

        features.insert(name.to_string(), Arc::clone(&storage));
        tracing::info!(feature = name, "Registered feature");
        Ok(storage)
    }

    pub fn feature(&self, name: &str) -> Option<Arc<FeatureStorage>> {
        self.features.read().get(name).cloned()
    }

    pub fn consent(&self) -> Consent {
        *self.consent.read()
    }

    /// Writer for `feature` under the current consent
    pub fn writer(&self, feature: &str, force_new_batch: bool) -> Option<Arc<dyn Writer>> {
        let consent = self.consent.read();
        self.feature(feature)
            .map(|storage| storage.writer(*consent, force_new_batch))
    }

    /// Change the consent and migrate pending data of every feature.
    ///
    /// Migration is queued behind writes already submitted to each feature.
    pub fn set_consent(&self, consent: Consent) {
        let mut current = self.consent.write();
        if *current == consent {
            return;
        }

        for storage in self.features.read().values() {
            storage.migrate_unauthorized_data(consent);
        }
        tracing::info!(from = %*current, to = %consent, "Tracking consent changed");
        *current = consent;
    }

    /// Delete every batch of every feature
    pub fn clear_all_data(&self) {
        for storage in self.features.read().values() {
            storage.clear_all_data();
        }
    }

    /// Toggle read age rules on every feature (blocking)
    pub fn set_ignore_files_age_when_reading(&self, value: bool) {
        for storage in self.features.read().values() {
            storage.set_ignore_files_age_when_reading(value);
        }
    }

    /// Wait until every queued operation of every feature has run
    pub fn flush(&self) {
        for storage in self.features.read().values() {
            storage.flush();
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn core_directory(&self) -> &CoreDirectory {
        &self.directory
    }

    pub fn feature_count(&self) -> usize {
        self.features.read().len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
