//! In-memory orchestrator
//!
//! Keeps batches in memory instead of on disk. Used to exercise writers and
//! readers without touching the filesystem. Applies only the size validation
//! and object count policy; age and quota rules are not simulated.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::PerformancePreset;
use crate::error::{Result, SpoolError};
use crate::telemetry::RemovalReason;

use super::{Orchestrator, ReadableFile, WritableFile};

/// A batch held in memory
#[derive(Debug, Default)]
pub struct InMemoryFile {
    name: String,
    data: Mutex<Vec<u8>>,
}

impl InMemoryFile {
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

/// Shared handle to a batch held by [`InMemoryOrchestrator`]
#[derive(Clone)]
struct MemoryHandle {
    file: Arc<InMemoryFile>,
    files: Arc<Mutex<Vec<Arc<InMemoryFile>>>>,
}

impl WritableFile for MemoryHandle {
    fn name(&self) -> &str {
        &self.file.name
    }

    fn append(&self, data: &[u8]) -> Result<()> {
        self.file.data.lock().extend_from_slice(data);
        Ok(())
    }
}

impl ReadableFile for MemoryHandle {
    fn name(&self) -> &str {
        &self.file.name
    }

    fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.file.contents()))
    }

    fn delete(&self) -> Result<()> {
        let mut files = self.files.lock();
        let before = files.len();
        files.retain(|f| !Arc::ptr_eq(f, &self.file));
        if files.len() == before {
            return Err(SpoolError::Storage(format!(
                "no in-memory batch named {}",
                self.file.name
            )));
        }
        Ok(())
    }
}

/// Orchestrator storing batches in memory, oldest first
pub struct InMemoryOrchestrator {
    performance: PerformancePreset,
    files: Arc<Mutex<Vec<Arc<InMemoryFile>>>>,
    /// Writes taken by the newest file
    current_count: AtomicU64,
    next_name: AtomicU64,
    deleted: Mutex<Vec<(String, RemovalReason)>>,
    ignore_files_age_when_reading: AtomicBool,
}

impl InMemoryOrchestrator {
    pub fn new(performance: PerformancePreset) -> Self {
        Self {
            performance,
            files: Arc::new(Mutex::new(Vec::new())),
            current_count: AtomicU64::new(0),
            next_name: AtomicU64::new(1),
            deleted: Mutex::new(Vec::new()),
            ignore_files_age_when_reading: AtomicBool::new(false),
        }
    }

    /// Snapshot of the batches currently held, oldest first
    pub fn files(&self) -> Vec<Arc<InMemoryFile>> {
        self.files.lock().clone()
    }

    /// Names and reasons of batches deleted through [`Orchestrator::delete`]
    pub fn deleted(&self) -> Vec<(String, RemovalReason)> {
        self.deleted.lock().clone()
    }

    fn handle(&self, file: Arc<InMemoryFile>) -> MemoryHandle {
        MemoryHandle {
            file,
            files: Arc::clone(&self.files),
        }
    }

    fn validate(&self, write_size: u64) -> Result<()> {
        if write_size > self.performance.max_object_size {
            return Err(SpoolError::ObjectTooLarge {
                size: write_size,
                limit: self.performance.max_object_size,
            });
        }
        Ok(())
    }

    fn create_file(&self) -> Arc<InMemoryFile> {
        let name = self.next_name.fetch_add(1, Ordering::SeqCst).to_string();
        let file = Arc::new(InMemoryFile {
            name,
            data: Mutex::new(Vec::new()),
        });
        self.files.lock().push(Arc::clone(&file));
        self.current_count.store(1, Ordering::SeqCst);
        file
    }
}

impl Orchestrator for InMemoryOrchestrator {
    fn performance(&self) -> &PerformancePreset {
        &self.performance
    }

    fn get_writable_file(&self, write_size: u64) -> Result<Arc<dyn WritableFile>> {
        self.validate(write_size)?;

        let last = self.files.lock().last().cloned();
        let count = self.current_count.load(Ordering::SeqCst);
        let file = match last {
            Some(file) if count < self.performance.max_objects_in_file => {
                self.current_count.fetch_add(1, Ordering::SeqCst);
                file
            }
            _ => self.create_file(),
        };
        Ok(Arc::new(self.handle(file)))
    }

    fn get_new_writable_file(&self, write_size: u64) -> Result<Arc<dyn WritableFile>> {
        self.validate(write_size)?;
        let file = self.create_file();
        Ok(Arc::new(self.handle(file)))
    }

    fn get_readable_files(
        &self,
        excluding: &HashSet<String>,
        limit: usize,
    ) -> Vec<Arc<dyn ReadableFile>> {
        self.files()
            .into_iter()
            .filter(|f| !excluding.contains(&f.name))
            .take(limit)
            .map(|f| Arc::new(self.handle(f)) as Arc<dyn ReadableFile>)
            .collect()
    }

    fn delete(&self, file: &dyn ReadableFile, reason: RemovalReason) -> Result<()> {
        file.delete()?;
        self.deleted.lock().push((file.name().to_string(), reason));
        Ok(())
    }

    fn ignore_files_age_when_reading(&self) -> bool {
        self.ignore_files_age_when_reading.load(Ordering::SeqCst)
    }

    fn set_ignore_files_age_when_reading(&self, value: bool) {
        self.ignore_files_age_when_reading.store(value, Ordering::SeqCst);
    }
}
