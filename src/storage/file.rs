//! Batch files
//!
//! A batch file is opened for appending by the writer and for whole-file
//! reads by the reader. Both sides only see it through these traits so the
//! orchestrator can be swapped for an in-memory one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::Result;

/// Write side of a batch file
pub trait WritableFile: Send + Sync {
    fn name(&self) -> &str;

    /// Append `data` in a single write
    fn append(&self, data: &[u8]) -> Result<()>;
}

/// Read side of a batch file
pub trait ReadableFile: Send + Sync {
    fn name(&self) -> &str;

    /// Read the whole file
    fn read(&self) -> Result<Bytes>;

    fn delete(&self) -> Result<()>;
}

/// A batch file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    path: PathBuf,
    name: String,
}

impl BatchFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size on disk (in bytes)
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}

impl WritableFile for BatchFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }
}

impl ReadableFile for BatchFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(fs::read(&self.path)?))
    }

    fn delete(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }
}
