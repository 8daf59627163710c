//! TLV block decoding
//!
//! Parses a byte stream into blocks and stops at the first block that cannot
//! be fully parsed. Everything before that point is returned.

use bytes::{Buf, Bytes};

use super::{Block, BlockType, HEADER_SIZE};

/// Reads blocks from an in-memory copy of a batch file
pub struct BlockReader {
    /// Unread remainder of the stream
    data: Bytes,
    /// Maximum accepted payload length
    max_length: u64,
    /// Set once a malformed or partial block was hit
    stopped_early: bool,
}

impl BlockReader {
    pub fn new(data: impl Into<Bytes>, max_length: u64) -> Self {
        Self {
            data: data.into(),
            max_length,
            stopped_early: false,
        }
    }

    /// Read the next block, or `None` at end of stream or at the first bad block
    pub fn next_block(&mut self) -> Option<Block> {
        if self.stopped_early || self.data.is_empty() {
            return None;
        }

        if self.data.len() < HEADER_SIZE {
            return self.stop("partial block header");
        }

        let mut header = &self.data[..HEADER_SIZE];
        let tag = header.get_u16_le();
        let length = header.get_u32_le() as u64;

        let block_type = match BlockType::from_u16(tag) {
            Some(t) => t,
            None => return self.stop("unknown block type"),
        };

        if length > self.max_length {
            return self.stop("block length exceeds limit");
        }

        let total = HEADER_SIZE + length as usize;
        if self.data.len() < total {
            return self.stop("partial block payload");
        }

        self.data.advance(HEADER_SIZE);
        let payload = self.data.split_to(length as usize);

        Some(Block {
            block_type,
            data: payload,
        })
    }

    /// Read every parsable block
    pub fn all(mut self) -> Vec<Block> {
        let mut blocks = Vec::new();
        while let Some(block) = self.next_block() {
            blocks.push(block);
        }
        blocks
    }

    /// Whether reading ended on unparsable bytes rather than a clean end of stream
    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }

    /// Bytes left unread after stopping
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn stop(&mut self, reason: &str) -> Option<Block> {
        tracing::warn!(
            remaining = self.data.len(),
            "Stopped decoding batch: {}",
            reason
        );
        self.stopped_early = true;
        None
    }
}

/// Decode all well-formed blocks from `data`
pub fn decode_blocks(data: impl Into<Bytes>, max_length: u64) -> Vec<Block> {
    BlockReader::new(data, max_length).all()
}
