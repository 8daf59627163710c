//! TLV Block Module
//!
//! Batch files are a flat, append-only stream of typed length-value blocks.
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ Block 1                                    │
//! │ ┌──────────┬────────────┬───────────────┐  │
//! │ │ Type (2) │ Length (4) │ Payload       │  │
//! │ └──────────┴────────────┴───────────────┘  │
//! ├────────────────────────────────────────────┤
//! │ Block 2                                    │
//! │ ┌──────────┬────────────┬───────────────┐  │
//! │ │ Type (2) │ Length (4) │ Payload       │  │
//! │ └──────────┴────────────┴───────────────┘  │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Type and length are little-endian. There is no file header, footer or
//! checksum: a truncated trailing block (writer killed mid-append) is simply
//! not returned by the reader.

mod block;
mod events;
mod reader;

pub use block::{encode_blocks, Block, BlockType, HEADER_SIZE};
pub use events::{Event, EventGenerator};
pub use reader::{decode_blocks, BlockReader};
