//! Tracking consent

use std::fmt;

use serde::{Deserialize, Serialize};

/// User's tracking permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consent {
    /// Data is recorded and uploaded
    Granted,
    /// Data is dropped
    NotGranted,
    /// Data is recorded but held back until consent is decided
    Pending,
}

impl fmt::Display for Consent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consent::Granted => f.write_str("granted"),
            Consent::NotGranted => f.write_str("not_granted"),
            Consent::Pending => f.write_str("pending"),
        }
    }
}
