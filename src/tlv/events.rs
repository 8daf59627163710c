//! Event reconstruction
//!
//! Pairs each `Event` block with the `EventMetadata` block directly before it.

use bytes::Bytes;

use super::{Block, BlockType};

/// A logical event rebuilt from blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub data: Bytes,
    pub metadata: Option<Bytes>,
}

impl Event {
    pub fn new(data: impl Into<Bytes>, metadata: Option<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata,
        }
    }
}

/// Lazily turns a block list into events.
///
/// Dangling metadata (at the end of the stream, or followed by another
/// metadata block) is dropped.
pub struct EventGenerator<'a> {
    blocks: &'a [Block],
    index: usize,
}

impl<'a> EventGenerator<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        Self { blocks, index: 0 }
    }
}

impl Iterator for EventGenerator<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let mut metadata: Option<&Block> = None;

        loop {
            let block = self.blocks.get(self.index)?;

            if metadata.is_none() && block.block_type == BlockType::EventMetadata {
                metadata = Some(block);
                self.index += 1;
                continue;
            }

            if block.block_type != BlockType::Event {
                // second metadata in a row: it may belong to the next event
                metadata = None;
                continue;
            }

            self.index += 1;
            return Some(Event {
                data: block.data.clone(),
                metadata: metadata.map(|m| m.data.clone()),
            });
        }
    }
}
