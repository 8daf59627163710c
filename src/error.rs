//! Error types for batchspool
//!
//! Provides a unified error type for all operations.
//!
//! Most of these never reach the host application: fire-and-forget paths
//! (writes, migrations, clears) hand them to the [`Telemetry`](crate::telemetry::Telemetry)
//! collaborator instead. Only synchronous validation is returned to callers.

use thiserror::Error;

/// Result type alias using SpoolError
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Unified error type for batchspool operations
#[derive(Debug, Error)]
pub enum SpoolError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("data exceeds the maximum size of {limit} bytes (got {size})")]
    ObjectTooLarge { size: u64, limit: u64 },

    #[error("DataBlock length exceeds limit of {limit} bytes (got {length})")]
    BlockTooLarge { length: u64, limit: u64 },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Batch file corruption detected: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("Encryption error: {0}")]
    Encryption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Feature worker has stopped")]
    WorkerStopped,
}

impl SpoolError {
    /// True for errors that reject a write before anything touches the disk.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SpoolError::ObjectTooLarge { .. } | SpoolError::BlockTooLarge { .. }
        )
    }
}
