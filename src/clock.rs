//! Clock and batch file naming
//!
//! A batch file is named after its creation time: decimal milliseconds since
//! the reference epoch (2001-01-01T00:00:00Z). The name is the only source of
//! a file's age and ordering.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the UNIX epoch and 2001-01-01T00:00:00Z
const REFERENCE_EPOCH_OFFSET_SECS: u64 = 978_307_200;

/// The reference epoch used for file names
pub fn reference_epoch() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(REFERENCE_EPOCH_OFFSET_SECS)
}

/// Source of the current time
pub trait DateProvider: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDateProvider;

impl DateProvider for SystemDateProvider {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Converts a file creation time into its file name.
/// Times before the reference epoch collapse to "0".
pub fn file_name_from(creation_time: SystemTime) -> String {
    let millis = creation_time
        .duration_since(reference_epoch())
        .map(|d| d.as_secs_f64() * 1_000.0)
        .unwrap_or(0.0);
    (millis.round() as u64).to_string()
}

/// Converts a file name back into its creation time.
/// Unparsable names map to the reference epoch, which makes them obsolete.
pub fn file_creation_time_from(file_name: &str) -> SystemTime {
    let millis = file_name.parse::<u64>().unwrap_or(0);
    reference_epoch() + Duration::from_millis(millis)
}

/// Age of `time` relative to `now`; zero for times in the future
pub fn age(now: SystemTime, time: SystemTime) -> Duration {
    now.duration_since(time).unwrap_or(Duration::ZERO)
}
