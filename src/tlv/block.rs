//! TLV block definitions and encoding

use bytes::{BufMut, Bytes};

use crate::error::{Result, SpoolError};

/// Header size: type (2) + length (4)
pub const HEADER_SIZE: usize = 6;

/// Kind of payload carried by a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BlockType {
    /// Serialized event
    Event = 0x00,
    /// Metadata for the event block that follows
    EventMetadata = 0x01,
}

impl BlockType {
    pub fn from_u16(tag: u16) -> Option<Self> {
        match tag {
            0x00 => Some(BlockType::Event),
            0x01 => Some(BlockType::EventMetadata),
            _ => None,
        }
    }
}

/// A single typed record of a batch file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub block_type: BlockType,
    pub data: Bytes,
}

impl Block {
    pub fn new(block_type: BlockType, data: impl Into<Bytes>) -> Self {
        Self {
            block_type,
            data: data.into(),
        }
    }

    pub fn event(data: impl Into<Bytes>) -> Self {
        Self::new(BlockType::Event, data)
    }

    pub fn metadata(data: impl Into<Bytes>) -> Self {
        Self::new(BlockType::EventMetadata, data)
    }

    /// Size of this block once encoded
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.data.len()
    }

    /// Append the encoded block to `out`.
    ///
    /// Fails without touching `out` if the payload exceeds `max_length`.
    pub fn encode_into(&self, out: &mut Vec<u8>, max_length: u64) -> Result<()> {
        let length = self.data.len() as u64;
        if length > max_length || length > u32::MAX as u64 {
            return Err(SpoolError::BlockTooLarge {
                length,
                limit: max_length,
            });
        }

        out.reserve(self.encoded_len());
        out.put_u16_le(self.block_type as u16);
        out.put_u32_le(length as u32);
        out.put_slice(&self.data);
        Ok(())
    }

    /// Encode this block on its own
    pub fn serialize(&self, max_length: u64) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out, max_length)?;
        Ok(out)
    }
}

/// Encode blocks back to back.
///
/// All-or-nothing: if any block is oversized nothing is returned, so a
/// metadata block is never written without its event.
pub fn encode_blocks(blocks: &[Block], max_length: u64) -> Result<Vec<u8>> {
    let total: usize = blocks.iter().map(Block::encoded_len).sum();
    let mut out = Vec::with_capacity(total);
    for block in blocks {
        block.encode_into(&mut out, max_length)?;
    }
    Ok(out)
}
