//! Mip chain serialization

use std::borrow::Cow;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, info};

use crate::chunk::{self, CompressedChunk};
use crate::compression::BlockCodec;
use crate::error::{Error, Result};
use crate::package::{fstring_size, write_fstring};

use super::{MipFlags, MipLevel, MipStorage, TexturePayload};

/// Bytes of per-level fields around the data: flags, sizes, offset, dimensions
const LEVEL_FIELDS_SIZE: usize = 24;

/// Serialize a texture payload whose first byte lands at `base_offset`.
///
/// Chunk offsets and the mip count offset are written as absolute positions.
/// Chunk sizes are recomputed; a changed value is logged. Levels without a
/// representable payload get `-1` size and offset.
///
/// # Errors
/// Returns an error if re-encoding a chunk fails or an offset overflows.
pub fn write_mip_chain(payload: &TexturePayload, base_offset: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(serialized_size(payload)?);

    out.write_all(&payload.prefix)?;
    let count_offset = base_offset + 16 + fstring_size(&payload.source_art) as u64;
    out.write_i32::<LittleEndian>(to_i32(count_offset, "mip count offset")?)?;
    write_fstring(&mut out, &payload.source_art)?;
    out.write_i32::<LittleEndian>(payload.mips.len() as i32)?;

    for (index, level) in payload.mips.iter().enumerate() {
        write_level(&mut out, level, index, base_offset)?;
    }

    out.write_all(&payload.guid)?;
    out.write_all(&payload.trailing)?;
    Ok(out)
}

/// Length of [`write_mip_chain`]'s output.
///
/// # Errors
/// Returns an error if a level must be re-encoded and that fails.
pub fn serialized_size(payload: &TexturePayload) -> Result<usize> {
    let mut size = 12 + 4 + fstring_size(&payload.source_art) + 4;
    for level in &payload.mips {
        size += LEVEL_FIELDS_SIZE + level_data_size(level)?;
    }
    Ok(size + payload.guid.len() + payload.trailing.len())
}

fn level_data_size(level: &MipLevel) -> Result<usize> {
    Ok(match &level.storage {
        MipStorage::Inline(data) => data.len(),
        MipStorage::Chunked { chunk, pixels } => {
            if chunk.has_bodies() {
                chunk.chunk_size()
            } else {
                let codec = BlockCodec::from_flags(level.flags)?;
                chunk::encode(pixels, chunk.header.block_size, codec)?.chunk_size()
            }
        }
        MipStorage::Corrupt { raw, .. } => raw.len(),
        MipStorage::External { .. } | MipStorage::Unsupported | MipStorage::Empty => 0,
    })
}

fn write_level(out: &mut Vec<u8>, level: &MipLevel, index: usize, base_offset: u64) -> Result<()> {
    out.write_u32::<LittleEndian>(written_flags(level).bits())?;
    out.write_i32::<LittleEndian>(level.uncompressed_size as i32)?;

    // Data follows the chunk size and offset fields
    let data_offset = base_offset + out.len() as u64 + 8;

    match &level.storage {
        MipStorage::Inline(data) => {
            out.write_i32::<LittleEndian>(data.len() as i32)?;
            out.write_i32::<LittleEndian>(to_i32(data_offset, "chunk offset")?)?;
            out.write_all(data)?;
        }
        MipStorage::Chunked { chunk, pixels } => {
            let chunk = chunk_for_write(chunk, pixels, level, index)?;
            let (size, fixed) = chunk.repair_chunk_size(level.chunk_size);
            if fixed {
                info!("Fixed chunk size of mip {index}: {} -> {size}", level.chunk_size);
            }
            out.write_i32::<LittleEndian>(size)?;
            out.write_i32::<LittleEndian>(to_i32(data_offset, "chunk offset")?)?;
            chunk::write_chunk(out, &chunk)?;
        }
        MipStorage::External {
            reference,
            pixels: Some(_),
        } => {
            out.write_i32::<LittleEndian>(reference.length)?;
            out.write_i32::<LittleEndian>(reference.offset)?;
        }
        MipStorage::Corrupt { raw, .. } => {
            out.write_i32::<LittleEndian>(raw.len() as i32)?;
            out.write_i32::<LittleEndian>(to_i32(data_offset, "chunk offset")?)?;
            out.write_all(raw)?;
        }
        MipStorage::External { pixels: None, .. } | MipStorage::Unsupported | MipStorage::Empty => {
            debug!("Mip {index}: nothing to write, storing sentinels");
            out.write_i32::<LittleEndian>(-1)?;
            out.write_i32::<LittleEndian>(-1)?;
        }
    }

    out.write_i32::<LittleEndian>(level.width)?;
    out.write_i32::<LittleEndian>(level.height)?;
    Ok(())
}

/// Flags as written; levels stored without data carry the bit that routes them
/// past the chunk reader
fn written_flags(level: &MipLevel) -> MipFlags {
    match level.storage {
        MipStorage::Empty => level.flags | MipFlags::UNUSED,
        MipStorage::Unsupported => level.flags | MipFlags::SEPARATE_DATA,
        MipStorage::External { .. } => level.flags | MipFlags::STORE_IN_SEPARATE_FILE,
        MipStorage::Inline(_) | MipStorage::Chunked { .. } | MipStorage::Corrupt { .. } => level.flags,
    }
}

/// The chunk as parsed, or a fresh encoding when its bodies were dropped
fn chunk_for_write<'a>(
    chunk: &'a CompressedChunk,
    pixels: &[u8],
    level: &MipLevel,
    index: usize,
) -> Result<Cow<'a, CompressedChunk>> {
    if chunk.has_bodies() {
        return Ok(Cow::Borrowed(chunk));
    }
    let codec = BlockCodec::from_flags(level.flags)?;
    debug!("Mip {index}: re-encoding {} bytes ({})", pixels.len(), codec.as_str());
    Ok(Cow::Owned(chunk::encode(pixels, chunk.header.block_size, codec)?))
}

fn to_i32(value: u64, field: &'static str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidSize {
        field,
        value: value as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheResolver;
    use crate::texture::{read_mip_chain, CacheReference, MipFlags, MipReadContext};
    use pretty_assertions::assert_eq;

    fn payload(mips: Vec<MipLevel>) -> TexturePayload {
        TexturePayload {
            prefix: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            mip_count_offset: 0,
            source_art: "D:\\Art\\Rock_D.tga".to_string(),
            mips,
            guid: [0x5A; 16],
            trailing: Vec::new(),
        }
    }

    fn level(flags: MipFlags, size: u32, storage: MipStorage) -> MipLevel {
        MipLevel {
            flags,
            uncompressed_size: size,
            chunk_size: 0,
            chunk_offset: 0,
            width: 8,
            height: 8,
            storage,
        }
    }

    #[test]
    fn test_raw_level_roundtrip() {
        let pixels: Vec<u8> = (0..64u8).collect();
        let original = payload(vec![level(MipFlags::empty(), 64, MipStorage::Inline(pixels.clone()))]);

        let bytes = write_mip_chain(&original, 1000).unwrap();
        assert_eq!(bytes.len(), serialized_size(&original).unwrap());

        let resolver = CacheResolver::new();
        let ctx = MipReadContext::new(&resolver).with_base_offset(1000);
        let read = read_mip_chain(&bytes, &ctx).unwrap();

        assert_eq!(read.mips[0].pixels(), Some(pixels.as_slice()));
        assert_eq!(read.mips[0].chunk_size, 64);
        // Offset is absolute: base + prefix, count offset, string, count, level header
        let expected_offset = 1000 + 12 + 4 + fstring_size(&original.source_art) + 4 + 16;
        assert_eq!(read.mips[0].chunk_offset as usize, expected_offset);
        assert_eq!(read.mip_count_offset as usize, 1000 + 16 + fstring_size(&original.source_art));
    }

    #[test]
    fn test_sentinels_for_unrepresentable_levels() {
        let unresolved = MipStorage::External {
            reference: CacheReference {
                cache_name: "WorldTex".to_string(),
                offset: 4096,
                length: 200,
            },
            pixels: None,
        };
        let original = payload(vec![
            level(MipFlags::UNUSED, 0, MipStorage::Empty),
            level(MipFlags::SEPARATE_DATA, 128, MipStorage::Unsupported),
            level(MipFlags::STORE_IN_SEPARATE_FILE | MipFlags::COMPRESSED_LZO, 256, unresolved),
        ]);

        let bytes = write_mip_chain(&original, 0).unwrap();
        let resolver = CacheResolver::new();
        let read = read_mip_chain(&bytes, &MipReadContext::new(&resolver)).unwrap();

        for mip in &read.mips {
            assert_eq!((mip.chunk_size, mip.chunk_offset), (-1, -1));
            assert!(mip.pixels().is_none());
        }
    }

    #[test]
    fn test_resolved_external_keeps_reference() {
        let resolved = MipStorage::External {
            reference: CacheReference {
                cache_name: "WorldTex".to_string(),
                offset: 4096,
                length: 200,
            },
            pixels: Some(vec![0; 256]),
        };
        let original = payload(vec![level(
            MipFlags::STORE_IN_SEPARATE_FILE | MipFlags::COMPRESSED_LZO,
            256,
            resolved,
        )]);

        let bytes = write_mip_chain(&original, 0).unwrap();
        let resolver = CacheResolver::new();
        let read = read_mip_chain(&bytes, &MipReadContext::new(&resolver)).unwrap();
        assert_eq!((read.mips[0].chunk_size, read.mips[0].chunk_offset), (200, 4096));
    }

    #[test]
    fn test_stale_chunk_size_is_fixed_and_stable() {
        let pixels = vec![0x33u8; 10_000];
        let chunk = chunk::encode(&pixels, 4096, BlockCodec::Lzo).unwrap();
        let mut mip = level(
            MipFlags::COMPRESSED_LZO,
            10_000,
            MipStorage::Chunked {
                chunk: chunk.clone(),
                pixels: pixels.clone(),
            },
        );
        mip.chunk_size = 12;
        let original = payload(vec![mip]);

        let first = write_mip_chain(&original, 0).unwrap();
        let resolver = CacheResolver::new();
        let reread = read_mip_chain(&first, &MipReadContext::new(&resolver)).unwrap();
        assert_eq!(reread.mips[0].chunk_size as usize, chunk.chunk_size());

        let second = write_mip_chain(&reread, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_low_memory_reencodes_on_write() {
        let pixels: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let chunk = chunk::encode(&pixels, 8192, BlockCodec::Zlib).unwrap();
        let original = payload(vec![level(
            MipFlags::COMPRESSED_ZLIB,
            20_000,
            MipStorage::Chunked { chunk, pixels: pixels.clone() },
        )]);
        let bytes = write_mip_chain(&original, 0).unwrap();

        let resolver = CacheResolver::new();
        let ctx = MipReadContext::new(&resolver).with_low_memory(true);
        let read = read_mip_chain(&bytes, &ctx).unwrap();
        match &read.mips[0].storage {
            MipStorage::Chunked { chunk, .. } => assert!(!chunk.has_bodies()),
            other => panic!("expected chunked level, got {other:?}"),
        }

        let rewritten = write_mip_chain(&read, 0).unwrap();
        assert_eq!(rewritten.len(), serialized_size(&read).unwrap());
        let again = read_mip_chain(&rewritten, &MipReadContext::new(&resolver)).unwrap();
        assert_eq!(again.mips[0].pixels(), Some(pixels.as_slice()));
    }
}
