//! Feature Module
//!
//! Per-feature storage surface: consent routing, writers, readers and the
//! worker serializing them.
//!
//! ## Data Flow
//! ```text
//!   producer ──write──▶ Writer ──(worker)──▶ FilesOrchestrator ──▶ batch file
//!                        │ consent                (authorized | unauthorized)
//!                        ▼
//!                  NotGranted: dropped
//!
//!   uploader ──read──▶ Reader ──(worker)──▶ authorized files ──▶ Batch ──▶ events
//! ```

mod consent;
mod directories;
mod reader;
mod storage;
mod worker;
mod writer;

pub use consent::Consent;
pub use directories::{instance_id, CoreDirectory, FeatureDirectories};
pub use reader::{Batch, DataReader, FileReader, Reader};
pub use storage::FeatureStorage;
pub use worker::Worker;
pub use writer::{write_size, AsyncWriter, FileWriter, NopWriter, Writer};
