//! Configuration for batchspool
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpoolError};

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

/// Default ceiling for a single TLV block payload (10 MB)
pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 10 * MB;

/// Main configuration for a batchspool instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Directory Layout
    // -------------------------------------------------------------------------
    /// Platform cache root. `None` resolves to the OS cache directory.
    /// Internal structure:
    ///   {root_dir}/{org_id}/v2/{instance_id}/
    ///     └── {feature}/
    ///         ├── v2/               (authorized batches)
    ///         └── intermediate-v2/  (batches recorded under pending consent)
    pub root_dir: Option<PathBuf>,

    /// Organisation folder directly under the cache root
    pub org_id: String,

    /// Name of the SDK instance (hashed with `site` into the instance folder)
    pub instance_name: String,

    /// Intake site the instance reports to
    pub site: String,

    // -------------------------------------------------------------------------
    // Storage Policy
    // -------------------------------------------------------------------------
    /// File lifecycle limits shared by every feature (unless overridden on registration)
    pub performance: PerformancePreset,

    /// Safety ceiling for a single TLV block payload (in bytes)
    pub max_block_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: None,
            org_id: "com.batchspool".to_string(),
            instance_name: "main".to_string(),
            site: "us1".to_string(),
            performance: PerformancePreset::default(),
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Resolve the cache root, falling back to the platform cache directory
    pub fn resolved_root_dir(&self) -> Result<PathBuf> {
        match &self.root_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir().ok_or_else(|| {
                SpoolError::Config("cannot resolve platform cache directory".to_string())
            }),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the cache root directory
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = Some(path.into());
        self
    }

    /// Set the organisation folder name
    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.config.org_id = org_id.into();
        self
    }

    /// Set the SDK instance name
    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.config.instance_name = name.into();
        self
    }

    /// Set the intake site
    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.config.site = site.into();
        self
    }

    /// Set the storage performance preset
    pub fn performance(mut self, preset: PerformancePreset) -> Self {
        self.config.performance = preset;
        self
    }

    /// Set the TLV block payload ceiling (in bytes)
    pub fn max_block_size(mut self, size: u64) -> Self {
        self.config.max_block_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Performance Preset
// =============================================================================

/// Batch maturity profile picked by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchSize {
    Small,
    Medium,
    Large,
}

impl BatchSize {
    /// Mean age of a batch before it becomes uploadable
    fn mean_file_age(self) -> Duration {
        match self {
            BatchSize::Small => Duration::from_secs(3),
            BatchSize::Medium => Duration::from_secs(10),
            BatchSize::Large => Duration::from_secs(35),
        }
    }
}

/// Limits driving the file lifecycle of one feature directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePreset {
    /// Maximum size of a single batch file (in bytes).
    /// If the last written file cannot fit the next write, a new file is created.
    pub max_file_size: u64,

    /// Maximum size of a feature directory (in bytes).
    /// Exceeding it evicts the oldest files when the next file is created.
    pub max_directory_size: u64,

    /// Maximum age qualifying a file for reuse by the writer
    pub max_file_age_for_write: Duration,

    /// Minimum age qualifying a file for reading.
    /// Sits above `max_file_age_for_write` so the reader never picks the file being written.
    pub min_file_age_for_read: Duration,

    /// Files older than this are obsolete and deleted without being read
    pub max_file_age_for_read: Duration,

    /// Maximum number of objects written to a single file
    pub max_objects_in_file: u64,

    /// Maximum size of a single write (in bytes); larger writes are rejected
    pub max_object_size: u64,
}

impl Default for PerformancePreset {
    fn default() -> Self {
        Self::for_batch_size(BatchSize::Medium)
    }
}

impl PerformancePreset {
    /// Preset derived from a batch size profile
    pub fn for_batch_size(batch_size: BatchSize) -> Self {
        let mean = batch_size.mean_file_age();
        Self {
            max_file_size: 4 * MB,
            max_directory_size: 512 * MB,
            max_file_age_for_write: mean.mul_f64(0.95), // 5% below the mean age
            min_file_age_for_read: mean.mul_f64(1.05),  // 5% above the mean age
            max_file_age_for_read: Duration::from_secs(18 * 60 * 60),
            max_objects_in_file: 500,
            max_object_size: 512 * KB,
        }
    }

    /// Create a builder starting from the default preset
    pub fn builder() -> PerformancePresetBuilder {
        PerformancePresetBuilder {
            preset: PerformancePreset::default(),
        }
    }

    /// Window between "no longer writable" and "readable", reported with batch metrics
    pub fn uploader_window(&self) -> Duration {
        (self.min_file_age_for_read + self.max_file_age_for_write) / 2
    }
}

/// Builder for PerformancePreset
pub struct PerformancePresetBuilder {
    preset: PerformancePreset,
}

impl PerformancePresetBuilder {
    /// Start from a batch size profile instead of the default
    pub fn batch_size(mut self, batch_size: BatchSize) -> Self {
        self.preset = PerformancePreset::for_batch_size(batch_size);
        self
    }

    pub fn max_file_size(mut self, size: u64) -> Self {
        self.preset.max_file_size = size;
        self
    }

    pub fn max_directory_size(mut self, size: u64) -> Self {
        self.preset.max_directory_size = size;
        self
    }

    pub fn max_file_age_for_write(mut self, age: Duration) -> Self {
        self.preset.max_file_age_for_write = age;
        self
    }

    pub fn min_file_age_for_read(mut self, age: Duration) -> Self {
        self.preset.min_file_age_for_read = age;
        self
    }

    pub fn max_file_age_for_read(mut self, age: Duration) -> Self {
        self.preset.max_file_age_for_read = age;
        self
    }

    pub fn max_objects_in_file(mut self, count: u64) -> Self {
        self.preset.max_objects_in_file = count;
        self
    }

    pub fn max_object_size(mut self, size: u64) -> Self {
        self.preset.max_object_size = size;
        self
    }

    pub fn build(self) -> PerformancePreset {
        self.preset
    }
}
