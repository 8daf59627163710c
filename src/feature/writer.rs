//! Writers
//!
//! Encode an event (and optional metadata) into TLV blocks and append them
//! to the file picked by an orchestrator.

use std::sync::Arc;

use bytes::Bytes;

use crate::encryption::DataEncryption;
use crate::error::{Result, SpoolError};
use crate::storage::Orchestrator;
use crate::telemetry::Telemetry;
use crate::tlv::{encode_blocks, Block, HEADER_SIZE};

use super::worker::Worker;

/// Entry point for persisting events.
///
/// `Err` is returned only when a write is rejected up front (too large).
/// Failures after that point are reported to telemetry.
pub trait Writer: Send + Sync {
    fn write(&self, event: Bytes, metadata: Option<Bytes>) -> Result<()>;
}

/// Writer used without consent: every write is discarded
#[derive(Debug, Default, Clone, Copy)]
pub struct NopWriter;

impl Writer for NopWriter {
    fn write(&self, _event: Bytes, _metadata: Option<Bytes>) -> Result<()> {
        Ok(())
    }
}

/// Size charged to the orchestrator for one write, before encryption
pub fn write_size(event: &[u8], metadata: Option<&[u8]>) -> u64 {
    let metadata_size = metadata.map_or(0, |m| HEADER_SIZE + m.len());
    (HEADER_SIZE + event.len() + metadata_size) as u64
}

/// Writes synchronously on the calling thread
pub struct FileWriter {
    orchestrator: Arc<dyn Orchestrator>,
    /// Start a new batch for every write
    force_new_file: bool,
    encryption: Option<Arc<dyn DataEncryption>>,
    telemetry: Arc<dyn Telemetry>,
    max_block_size: u64,
}

impl FileWriter {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        force_new_file: bool,
        encryption: Option<Arc<dyn DataEncryption>>,
        telemetry: Arc<dyn Telemetry>,
        max_block_size: u64,
    ) -> Self {
        Self {
            orchestrator,
            force_new_file,
            encryption,
            telemetry,
            max_block_size,
        }
    }

    /// Reject writes that can never succeed, before anything is queued
    pub fn validate(&self, event: &[u8], metadata: Option<&[u8]>) -> Result<()> {
        let size = write_size(event, metadata);
        let limit = self.orchestrator.performance().max_object_size;
        if size > limit {
            return Err(SpoolError::ObjectTooLarge { size, limit });
        }

        let largest = event.len().max(metadata.map_or(0, <[u8]>::len)) as u64;
        if largest > self.max_block_size {
            return Err(SpoolError::BlockTooLarge {
                length: largest,
                limit: self.max_block_size,
            });
        }
        Ok(())
    }

    /// Encode and append one event, propagating every failure
    pub fn try_write(&self, event: &[u8], metadata: Option<&[u8]>) -> Result<()> {
        let size = write_size(event, metadata);

        let mut blocks = Vec::with_capacity(2);
        if let Some(metadata) = metadata {
            blocks.push(Block::metadata(self.encrypt(metadata)?));
        }
        blocks.push(Block::event(self.encrypt(event)?));
        let encoded = encode_blocks(&blocks, self.max_block_size)?;

        let file = if self.force_new_file {
            self.orchestrator.get_new_writable_file(size)?
        } else {
            self.orchestrator.get_writable_file(size)?
        };
        // one append per event: a failed write never leaves metadata without its event
        file.append(&encoded)?;

        tracing::trace!(file = %file.name(), bytes = encoded.len(), "Appended event");
        Ok(())
    }

    fn encrypt(&self, data: &[u8]) -> Result<Bytes> {
        match &self.encryption {
            Some(encryption) => Ok(Bytes::from(encryption.encrypt(data)?)),
            None => Ok(Bytes::copy_from_slice(data)),
        }
    }
}

impl Writer for FileWriter {
    fn write(&self, event: Bytes, metadata: Option<Bytes>) -> Result<()> {
        self.validate(&event, metadata.as_deref())?;
        if let Err(e) = self.try_write(&event, metadata.as_deref()) {
            self.telemetry.error("Failed to write data", &e);
        }
        Ok(())
    }
}

/// Validates on the calling thread, then writes on the feature worker
pub struct AsyncWriter {
    inner: Arc<FileWriter>,
    worker: Arc<Worker>,
}

impl AsyncWriter {
    pub fn new(inner: FileWriter, worker: Arc<Worker>) -> Self {
        Self {
            inner: Arc::new(inner),
            worker,
        }
    }
}

impl Writer for AsyncWriter {
    fn write(&self, event: Bytes, metadata: Option<Bytes>) -> Result<()> {
        self.inner.validate(&event, metadata.as_deref())?;

        let inner = Arc::clone(&self.inner);
        self.worker.run_async(move || {
            if let Err(e) = inner.try_write(&event, metadata.as_deref()) {
                inner.telemetry.error("Failed to write data", &e);
            }
        });
        Ok(())
    }
}
