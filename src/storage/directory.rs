//! Directory
//!
//! Thin wrapper over a filesystem directory holding batch files.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::{Result, SpoolError};

use super::BatchFile;

/// Attempts made for each file move before giving up on it
const MOVE_ATTEMPTS: u32 = 3;

/// A directory of batch files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    /// Wrap an existing path without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open `path`, creating it (and parents) if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create (or reuse) a subdirectory
    pub fn create_subdirectory(&self, relative: impl AsRef<Path>) -> Result<Directory> {
        Directory::open(self.path.join(relative))
    }

    /// Create an empty file named `name`
    pub fn create_file(&self, name: &str) -> Result<BatchFile> {
        let path = self.path.join(name);
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(BatchFile::new(path))
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.path.join(name).is_file()
    }

    /// `preferred` if nothing in this directory carries that name yet,
    /// otherwise the next free millisecond name after it.
    ///
    /// Returns `None` when `preferred` is taken and is not a timestamp name.
    pub fn available_name(&self, preferred: &str) -> Option<String> {
        if !self.path.join(preferred).exists() {
            return Some(preferred.to_string());
        }
        let mut millis: u64 = preferred.parse().ok()?;
        loop {
            millis = millis.checked_add(1)?;
            let candidate = millis.to_string();
            if !self.path.join(&candidate).exists() {
                return Some(candidate);
            }
        }
    }

    /// Existing file named `name`
    pub fn file(&self, name: &str) -> Result<BatchFile> {
        let path = self.path.join(name);
        if !path.is_file() {
            return Err(SpoolError::Storage(format!(
                "File does not exist at path: {}",
                path.display()
            )));
        }
        Ok(BatchFile::new(path))
    }

    /// All regular files, in no particular order
    pub fn files(&self) -> Result<Vec<BatchFile>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(BatchFile::new(entry.path()));
            }
        }
        Ok(files)
    }

    /// Delete every file in this directory; the directory itself stays
    pub fn delete_all_files(&self) -> Result<()> {
        for file in self.files()? {
            match fs::remove_file(file.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Move every file into `destination`, keeping file names.
    ///
    /// A file whose name is already taken in `destination` moves under the
    /// next free millisecond name instead; existing files there are never
    /// replaced. Each move is a rename, retried a few times. A file that still
    /// cannot be moved is left behind and reported in the returned error once
    /// every other file has been attempted.
    pub fn move_all_files_to(&self, destination: &Directory) -> Result<()> {
        fs::create_dir_all(destination.path())?;

        let mut failed = Vec::new();
        for file in self.files()? {
            let Some(name) = file.path().file_name() else {
                continue;
            };
            let name = name.to_string_lossy().into_owned();
            let Some(target_name) = destination.available_name(&name) else {
                tracing::warn!(file = %file.path().display(), "Batch file name already taken at destination");
                failed.push(name);
                continue;
            };
            if target_name != name {
                tracing::debug!(from = %name, to = %target_name, "Renaming batch file to avoid a collision");
            }
            let target = destination.path().join(&target_name);
            if let Err(e) = retry(MOVE_ATTEMPTS, Duration::from_micros(100), || {
                fs::rename(file.path(), &target)
            }) {
                tracing::warn!(file = %file.path().display(), error = %e, "Failed to move batch file");
                failed.push(name);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(SpoolError::Storage(format!(
                "failed to move {} file(s): {}",
                failed.len(),
                failed.join(", ")
            )))
        }
    }
}

/// Run `op` up to `times` times, sleeping `delay` between attempts
fn retry<T, E>(
    times: u32,
    delay: Duration,
    mut op: impl FnMut() -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= times => return Err(e),
            Err(_) => {
                attempt += 1;
                thread::sleep(delay);
            }
        }
    }
}
