//! Directory layout
//!
//! ```text
//! {cache_root}/{org_id}/v2/{instance_id}/
//!   └── {feature}/
//!       ├── v2/               (authorized: readable by the uploader)
//!       └── intermediate-v2/  (unauthorized: recorded under pending consent)
//! ```
//!
//! `instance_id` is the hex SHA-256 of the instance name followed by the site,
//! so one instance always lands in the same folder.

use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{Result, SpoolError};
use crate::storage::Directory;

const LAYOUT_VERSION: &str = "v2";
const AUTHORIZED_DIR: &str = "v2";
const UNAUTHORIZED_DIR: &str = "intermediate-v2";

/// Root directory of one SDK instance
#[derive(Debug, Clone)]
pub struct CoreDirectory {
    /// `{cache_root}/{org_id}`, shared by every instance
    pub os_directory: Directory,
    /// `{os_directory}/v2/{instance_id}`
    pub core_directory: Directory,
}

impl CoreDirectory {
    /// Resolve and create the directories for `config`
    pub fn open(config: &Config) -> Result<Self> {
        let root = config.resolved_root_dir()?;
        let os_directory = Directory::open(root.join(&config.org_id))?;
        let instance_id = instance_id(&config.instance_name, &config.site);
        let core_directory =
            os_directory.create_subdirectory(format!("{}/{}", LAYOUT_VERSION, instance_id))?;

        tracing::debug!(path = %core_directory.path().display(), "Opened core directory");
        Ok(Self {
            os_directory,
            core_directory,
        })
    }

    /// Create (or reuse) the directory pair of `feature`
    pub fn feature_directories(&self, feature: &str) -> Result<FeatureDirectories> {
        let has_separator = feature.contains(|c: char| c == '/' || c == '\\');
        if feature.is_empty() || has_separator || feature.starts_with('.') {
            return Err(SpoolError::Config(format!(
                "invalid feature name: {:?}",
                feature
            )));
        }

        Ok(FeatureDirectories {
            unauthorized: self
                .core_directory
                .create_subdirectory(format!("{}/{}", feature, UNAUTHORIZED_DIR))?,
            authorized: self
                .core_directory
                .create_subdirectory(format!("{}/{}", feature, AUTHORIZED_DIR))?,
        })
    }
}

/// The two directories of one feature
#[derive(Debug, Clone)]
pub struct FeatureDirectories {
    /// Data recorded while consent was pending
    pub unauthorized: Directory,
    /// Data recorded with consent, eligible for upload
    pub authorized: Directory,
}

/// Deterministic folder name for an SDK instance
pub fn instance_id(instance_name: &str, site: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instance_name.as_bytes());
    hasher.update(site.as_bytes());
    hex::encode(hasher.finalize())
}
