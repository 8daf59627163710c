//! Encryption collaborator
//!
//! Applied to each block payload right before it is encoded and right after
//! it is decoded. Size and age accounting never see encrypted sizes.

use crate::error::Result;

/// Symmetric payload encryption supplied by the host
pub trait DataEncryption: Send + Sync {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}
