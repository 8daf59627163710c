//! Storage Module
//!
//! Batch files, the directories holding them, and the orchestration policy
//! deciding which file is written, read or evicted.
//!
//! ## Responsibilities
//! - Create, append, read and delete batch files
//! - Reuse the last file while it is young, small and not full
//! - Evict the oldest files once a directory exceeds its quota
//! - Delete files too old to be worth reading
//!
//! ## Layout of one directory
//! ```text
//! {directory}/
//!   ├── 782301412345   (oldest batch, ms since 2001-01-01)
//!   ├── 782301422871
//!   └── 782301433002   (batch currently written)
//! ```

mod directory;
mod file;
mod memory;
mod orchestrator;

pub use directory::Directory;
pub use file::{BatchFile, ReadableFile, WritableFile};
pub use memory::{InMemoryFile, InMemoryOrchestrator};
pub use orchestrator::{FilesOrchestrator, MetricsData, Orchestrator};
