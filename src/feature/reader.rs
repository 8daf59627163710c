//! Readers
//!
//! Hand batches to the uploader and delete them once acknowledged.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::encryption::DataEncryption;
use crate::error::{Result, SpoolError};
use crate::storage::{Orchestrator, ReadableFile};
use crate::telemetry::{RemovalReason, Telemetry};
use crate::tlv::{Block, BlockReader, EventGenerator};

use super::worker::Worker;

/// Decoded content of one batch file
pub struct Batch {
    blocks: Vec<Block>,
    file: Arc<dyn ReadableFile>,
}

impl Batch {
    pub fn new(blocks: Vec<Block>, file: Arc<dyn ReadableFile>) -> Self {
        Self { blocks, file }
    }

    /// Events of this batch, rebuilt lazily from its blocks
    pub fn events(&self) -> EventGenerator<'_> {
        EventGenerator::new(&self.blocks)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn file(&self) -> &Arc<dyn ReadableFile> {
        &self.file
    }

    pub fn file_name(&self) -> &str {
        self.file.name()
    }
}

/// Read side of a feature's storage
pub trait Reader: Send + Sync {
    /// Up to `limit` files ready for reading, oldest first
    fn read_files(&self, limit: usize) -> Vec<Arc<dyn ReadableFile>>;

    /// Decode `file`; `None` if it cannot be read
    fn read_batch(&self, file: &Arc<dyn ReadableFile>) -> Option<Batch>;

    /// Delete the batch's file and never return it again
    fn mark_batch_as_read(&self, batch: &Batch, reason: RemovalReason);
}

/// Reads on the calling thread
pub struct FileReader {
    orchestrator: Arc<dyn Orchestrator>,
    encryption: Option<Arc<dyn DataEncryption>>,
    telemetry: Arc<dyn Telemetry>,
    max_block_size: u64,
    /// Acknowledged files that could not be deleted, kept out of later reads
    files_read: Mutex<HashSet<String>>,
}

impl FileReader {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        encryption: Option<Arc<dyn DataEncryption>>,
        telemetry: Arc<dyn Telemetry>,
        max_block_size: u64,
    ) -> Self {
        Self {
            orchestrator,
            encryption,
            telemetry,
            max_block_size,
            files_read: Mutex::new(HashSet::new()),
        }
    }

    fn acknowledge(&self, file: &dyn ReadableFile, reason: RemovalReason) {
        if let Err(e) = self.orchestrator.delete(file, reason) {
            self.telemetry.error("Failed to delete file", &e);
            self.files_read.lock().insert(file.name().to_string());
        }
    }

    /// Number of acknowledged files still excluded from reads
    pub fn excluded_count(&self) -> usize {
        self.files_read.lock().len()
    }

    fn decode(&self, file: &dyn ReadableFile) -> Result<Vec<Block>> {
        let data = file.read()?;
        let mut reader = BlockReader::new(data, self.max_block_size);
        let mut blocks = Vec::new();
        while let Some(block) = reader.next_block() {
            blocks.push(block);
        }
        if reader.stopped_early() {
            let error = SpoolError::Corruption(format!(
                "{} unreadable byte(s) after block {} of {}",
                reader.remaining(),
                blocks.len(),
                file.name()
            ));
            self.telemetry.error("Batch file has a malformed tail", &error);
        }

        match &self.encryption {
            None => Ok(blocks),
            Some(encryption) => blocks
                .into_iter()
                .map(|block| -> Result<Block> {
                    let data = encryption.decrypt(&block.data)?;
                    Ok(Block::new(block.block_type, data))
                })
                .collect(),
        }
    }
}

impl Reader for FileReader {
    fn read_files(&self, limit: usize) -> Vec<Arc<dyn ReadableFile>> {
        let excluding = self.files_read.lock().clone();
        self.orchestrator.get_readable_files(&excluding, limit)
    }

    fn read_batch(&self, file: &Arc<dyn ReadableFile>) -> Option<Batch> {
        match self.decode(file.as_ref()) {
            Ok(blocks) => Some(Batch::new(blocks, Arc::clone(file))),
            Err(e) => {
                self.telemetry.error("Failed to read data from file", &e);
                None
            }
        }
    }

    fn mark_batch_as_read(&self, batch: &Batch, reason: RemovalReason) {
        self.acknowledge(batch.file.as_ref(), reason);
    }
}

/// Runs every read on the feature worker, so reads never interleave with writes
pub struct DataReader {
    inner: Arc<FileReader>,
    worker: Arc<Worker>,
}

impl DataReader {
    pub fn new(inner: FileReader, worker: Arc<Worker>) -> Self {
        Self {
            inner: Arc::new(inner),
            worker,
        }
    }
}

impl Reader for DataReader {
    fn read_files(&self, limit: usize) -> Vec<Arc<dyn ReadableFile>> {
        let inner = Arc::clone(&self.inner);
        self.worker
            .run_sync(move || inner.read_files(limit))
            .unwrap_or_default()
    }

    fn read_batch(&self, file: &Arc<dyn ReadableFile>) -> Option<Batch> {
        let inner = Arc::clone(&self.inner);
        let file = Arc::clone(file);
        self.worker
            .run_sync(move || inner.read_batch(&file))
            .ok()
            .flatten()
    }

    fn mark_batch_as_read(&self, batch: &Batch, reason: RemovalReason) {
        let inner = Arc::clone(&self.inner);
        let file = Arc::clone(batch.file());
        let result = self
            .worker
            .run_sync(move || inner.acknowledge(file.as_ref(), reason));
        if let Err(e) = result {
            self.inner.telemetry.error("Failed to mark batch as read", &e);
        }
    }
}
