//! Chunk parsing and block decompression

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::compression::BlockCodec;
use crate::error::{Error, Result};

use super::{
    block_count, Block, ChunkHeader, CompressedChunk, CHUNK_SIGNATURE, MAX_BLOCK_SIZE,
    MAX_UNCOMPRESSED_SIZE,
};

/// Read a chunk whose decoded length is `expected_uncompressed`.
///
/// The signature is checked before anything else. The number of blocks is
/// derived from `expected_uncompressed`, not from the header.
///
/// # Errors
/// Returns [`Error::InvalidChunkSignature`] on a signature mismatch, a size
/// error when the block table is implausible, or [`Error::UnexpectedEof`]
/// when the data ends early.
pub fn read_chunk<R: Read>(reader: &mut R, expected_uncompressed: usize) -> Result<CompressedChunk> {
    let signature = reader.read_u32::<LittleEndian>()?;
    if signature != CHUNK_SIGNATURE {
        return Err(Error::InvalidChunkSignature {
            expected: CHUNK_SIGNATURE,
            found: signature,
        });
    }

    let block_size = reader.read_u32::<LittleEndian>()?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    let uncompressed_size = reader.read_u32::<LittleEndian>()?;

    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(Error::InvalidBlockSize(i64::from(block_size)));
    }
    if expected_uncompressed > MAX_UNCOMPRESSED_SIZE {
        return Err(Error::InvalidSize {
            field: "uncompressed",
            value: expected_uncompressed as i64,
        });
    }

    let count = block_count(expected_uncompressed, block_size);
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        let block_compressed = reader.read_u32::<LittleEndian>()?;
        let block_uncompressed = reader.read_u32::<LittleEndian>()?;

        if block_uncompressed > block_size {
            return Err(Error::InvalidSize {
                field: "block uncompressed",
                value: i64::from(block_uncompressed),
            });
        }
        // Incompressible data may grow slightly, never by more than the block itself
        if block_compressed > block_size.saturating_mul(2).saturating_add(1024) {
            return Err(Error::InvalidSize {
                field: "block compressed",
                value: i64::from(block_compressed),
            });
        }

        blocks.push(Block {
            compressed_size: block_compressed,
            uncompressed_size: block_uncompressed,
            compressed: None,
        });
    }

    for block in &mut blocks {
        let needed = block.compressed_size as usize;
        let mut body = Vec::with_capacity(needed);
        reader.by_ref().take(needed as u64).read_to_end(&mut body)?;
        if body.len() != needed {
            return Err(Error::UnexpectedEof {
                needed,
                available: body.len(),
            });
        }
        block.compressed = Some(body);
    }

    Ok(CompressedChunk {
        header: ChunkHeader {
            signature,
            block_size,
            compressed_size,
            uncompressed_size,
        },
        blocks,
    })
}

/// Decompress every block of `chunk` into one buffer of `expected` bytes.
///
/// Bodies are dropped afterwards unless `keep_compressed` is set.
///
/// # Errors
/// Returns an error if a block body is missing, fails to decompress, or the
/// blocks do not add up to `expected`.
pub fn decode(
    chunk: &mut CompressedChunk,
    expected: usize,
    codec: BlockCodec,
    keep_compressed: bool,
) -> Result<Vec<u8>> {
    let declared = chunk.total_uncompressed();
    if declared != expected {
        return Err(Error::InvalidSize {
            field: "chunk uncompressed",
            value: declared as i64,
        });
    }

    let mut output = vec![0u8; expected];
    let mut offset = 0usize;

    for (index, block) in chunk.blocks.iter().enumerate() {
        let body = block.compressed.as_deref().ok_or(Error::InvalidSize {
            field: "missing block body",
            value: index as i64,
        })?;
        let size = block.uncompressed_size as usize;
        let data = codec.decompress(body, size)?;
        if data.len() != size {
            return Err(Error::BlockSizeMismatch {
                index,
                expected: size,
                actual: data.len(),
            });
        }
        output[offset..offset + size].copy_from_slice(&data);
        offset += size;
    }

    if !keep_compressed {
        chunk.drop_bodies();
    }
    Ok(output)
}
