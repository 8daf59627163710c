//! # batchspool
//!
//! On-device persistence and batching for telemetry events:
//! - Append-only batch files of TLV blocks
//! - File reuse, quota eviction and obsolescence by age
//! - Consent-aware partitioning (authorized / unauthorized)
//! - One serial worker per feature, never blocking producers on disk I/O
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Engine                               │
//! │            (consent, feature registry, bulk ops)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  FeatureStorage                             │
//! │          (one worker thread per feature)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Writer     │          │   Reader    │
//!   │ (TLV encode)│          │ (TLV decode)│
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌──────────────────────────────────────┐
//!   │         FilesOrchestrator            │
//!   │  (reuse / purge / obsolete / order)  │
//!   └──────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod encryption;
pub mod error;
pub mod telemetry;

pub mod engine;
pub mod feature;
pub mod storage;
pub mod tlv;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, PerformancePreset};
pub use engine::Engine;
pub use error::{Result, SpoolError};
pub use feature::{Consent, FeatureStorage, Reader, Writer};
pub use tlv::Event;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of batchspool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
