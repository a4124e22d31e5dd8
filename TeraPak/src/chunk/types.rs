//! Types for compressed chunks

use tracing::debug;

use super::{BLOCK_ENTRY_SIZE, HEADER_SIZE};

/// Header at the start of every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Signature (should be [`CHUNK_SIGNATURE`](super::CHUNK_SIGNATURE))
    pub signature: u32,
    /// Maximum uncompressed bytes per block
    pub block_size: u32,
    /// Sum of the compressed block sizes
    pub compressed_size: u32,
    /// Uncompressed size declared by the writer
    pub uncompressed_size: u32,
}

/// One independently compressed piece of a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Compressed body; `None` once dropped after decoding
    pub compressed: Option<Vec<u8>>,
}

/// A parsed or freshly encoded chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedChunk {
    pub header: ChunkHeader,
    pub blocks: Vec<Block>,
}

impl CompressedChunk {
    /// Serialized size: header, block table and bodies
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        let bodies: usize = self.blocks.iter().map(|b| b.compressed_size as usize).sum();
        HEADER_SIZE + self.blocks.len() * BLOCK_ENTRY_SIZE + bodies
    }

    /// Check a stored chunk size against the real one.
    ///
    /// Returns the correct value and whether the stored one differed.
    #[must_use]
    pub fn repair_chunk_size(&self, stored: i32) -> (i32, bool) {
        let actual = self.chunk_size() as i32;
        if stored == actual {
            (stored, false)
        } else {
            debug!("Chunk size {stored} corrected to {actual}");
            (actual, true)
        }
    }

    /// Whether every block still carries its compressed body
    #[must_use]
    pub fn has_bodies(&self) -> bool {
        self.blocks.iter().all(|b| b.compressed.is_some())
    }

    /// Drop all compressed bodies, keeping the size table
    pub fn drop_bodies(&mut self) {
        for block in &mut self.blocks {
            block.compressed = None;
        }
    }

    /// Sum of block uncompressed sizes
    #[must_use]
    pub fn total_uncompressed(&self) -> usize {
        self.blocks.iter().map(|b| b.uncompressed_size as usize).sum()
    }
}
