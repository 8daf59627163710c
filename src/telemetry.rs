//! Telemetry collaborator
//!
//! Sink for errors and operational metrics raised by storage. Both calls are
//! fire-and-forget and must never panic; they are invoked from feature workers.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::SpoolError;

/// A single metric attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(u64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Str(v) => write!(f, "{}", v),
            MetricValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Bool(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Str(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Str(v)
    }
}

/// Metric attributes keyed by attribute name
pub type MetricAttributes = BTreeMap<&'static str, MetricValue>;

/// Receives errors and metrics from storage
pub trait Telemetry: Send + Sync {
    fn error(&self, message: &str, error: &SpoolError);
    fn metric(&self, name: &str, attributes: MetricAttributes);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NopTelemetry;

impl Telemetry for NopTelemetry {
    fn error(&self, _message: &str, _error: &SpoolError) {}
    fn metric(&self, _name: &str, _attributes: MetricAttributes) {}
}

/// Forwards errors and metrics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn error(&self, message: &str, error: &SpoolError) {
        tracing::error!(error = %error, "{}", message);
    }

    fn metric(&self, name: &str, attributes: MetricAttributes) {
        let rendered = attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(target: "batchspool::metrics", metric = name, "{}", rendered);
    }
}

// =============================================================================
// Batch Metrics Vocabulary
// =============================================================================

pub const METRIC_TYPE_KEY: &str = "metric_type";
pub const TRACK_KEY: &str = "track";
pub const UPLOADER_WINDOW_KEY: &str = "uploader_window";

/// "Batch Deleted" metric
pub mod batch_deleted {
    pub const NAME: &str = "Batch Deleted";
    pub const TYPE_VALUE: &str = "batch deleted";
    pub const BATCH_AGE_KEY: &str = "batch_age";
    pub const REMOVAL_REASON_KEY: &str = "batch_removal_reason";
}

/// "Batch Closed" metric
pub mod batch_closed {
    pub const NAME: &str = "Batch Closed";
    pub const TYPE_VALUE: &str = "batch closed";
    pub const BATCH_SIZE_KEY: &str = "batch_size";
    pub const BATCH_EVENTS_COUNT_KEY: &str = "batch_events_count";
    pub const BATCH_DURATION_KEY: &str = "batch_duration";
    pub const FORCED_NEW_KEY: &str = "forced_new";
}

/// Why a batch file was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Intake answered with this status code
    IntakeCode(u16),
    /// Older than `max_file_age_for_read`
    Obsolete,
    /// Evicted to honour `max_directory_size`
    Purged,
    /// Could not be decoded
    Invalid,
    /// Uploaded during a flush
    Flushed,
}

impl RemovalReason {
    pub fn include_in_metric(&self) -> bool {
        !matches!(self, RemovalReason::Flushed)
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::IntakeCode(code) => write!(f, "intake-code-{}", code),
            RemovalReason::Obsolete => f.write_str("obsolete"),
            RemovalReason::Purged => f.write_str("purged"),
            RemovalReason::Invalid => f.write_str("invalid"),
            RemovalReason::Flushed => f.write_str("flushed"),
        }
    }
}
