//! Chunk encoding and serialization

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::compression::BlockCodec;
use crate::error::{Error, Result};

use super::{Block, ChunkHeader, CompressedChunk, CHUNK_SIGNATURE, MAX_BLOCK_SIZE};

/// Split `buffer` into `block_size` pieces and compress each one.
///
/// # Errors
/// Returns [`Error::InvalidBlockSize`] for a zero or oversized block size, or
/// a compression error.
pub fn encode(buffer: &[u8], block_size: u32, codec: BlockCodec) -> Result<CompressedChunk> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(Error::InvalidBlockSize(i64::from(block_size)));
    }

    let blocks = buffer
        .chunks(block_size as usize)
        .map(|piece| {
            let compressed = codec.compress(piece)?;
            Ok(Block {
                compressed_size: compressed.len() as u32,
                uncompressed_size: piece.len() as u32,
                compressed: Some(compressed),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let compressed_size = blocks.iter().map(|b| b.compressed_size).sum();

    Ok(CompressedChunk {
        header: ChunkHeader {
            signature: CHUNK_SIGNATURE,
            block_size,
            compressed_size,
            uncompressed_size: buffer.len() as u32,
        },
        blocks,
    })
}

/// Serialize `chunk`: header, size table, then bodies.
///
/// The header's compressed size is recomputed from the blocks.
///
/// # Errors
/// Returns an error if a block has no body or writing fails.
pub fn write_chunk<W: Write>(writer: &mut W, chunk: &CompressedChunk) -> Result<()> {
    let compressed_size: u32 = chunk.blocks.iter().map(|b| b.compressed_size).sum();

    writer.write_u32::<LittleEndian>(CHUNK_SIGNATURE)?;
    writer.write_u32::<LittleEndian>(chunk.header.block_size)?;
    writer.write_u32::<LittleEndian>(compressed_size)?;
    writer.write_u32::<LittleEndian>(chunk.header.uncompressed_size)?;

    for block in &chunk.blocks {
        writer.write_u32::<LittleEndian>(block.compressed_size)?;
        writer.write_u32::<LittleEndian>(block.uncompressed_size)?;
    }

    for (index, block) in chunk.blocks.iter().enumerate() {
        let body = block.compressed.as_deref().ok_or(Error::InvalidSize {
            field: "missing block body",
            value: index as i64,
        })?;
        writer.write_all(body)?;
    }

    Ok(())
}
