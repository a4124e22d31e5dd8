//! Chunked block compression for mip level payloads
//!
//! A chunk is a 16-byte header followed by one `(compressed, uncompressed)`
//! size pair per block and then all block bodies:
//!
//! ```text
//! [signature u32][block_size u32][compressed_size u32][uncompressed_size u32]
//! [block 0 sizes][block 1 sizes]...[block 0 body][block 1 body]...
//! ```
//!
//! Every block is compressed on its own, so blocks decode in any order into
//! their slot of the output buffer.

mod reader;
mod types;
mod writer;

pub use reader::{decode, read_chunk};
pub use types::{Block, ChunkHeader, CompressedChunk};
pub use writer::{encode, write_chunk};

/// Signature opening every chunk (shared with the package tag)
pub const CHUNK_SIGNATURE: u32 = 0x9E2A83C1;

/// Size of the chunk header in bytes
pub const HEADER_SIZE: usize = 16;

/// Size of one block size pair in bytes
pub const BLOCK_ENTRY_SIZE: usize = 8;

/// Block size used when nothing else is configured
pub const DEFAULT_BLOCK_SIZE: u32 = 131_072;

/// Upper bound on a block size read from a file
pub const MAX_BLOCK_SIZE: u32 = 16 * 1024 * 1024;

/// Upper bound on a level's uncompressed size read from a file
pub const MAX_UNCOMPRESSED_SIZE: usize = 512 * 1024 * 1024;

/// Number of blocks needed to cover `uncompressed_size` bytes
#[must_use]
pub fn block_count(uncompressed_size: usize, block_size: u32) -> usize {
    if block_size == 0 {
        return 0;
    }
    uncompressed_size.div_ceil(block_size as usize)
}
