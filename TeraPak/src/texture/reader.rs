//! Mip chain parsing

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use crate::cache::CacheLookup;
use crate::chunk::{self, MAX_UNCOMPRESSED_SIZE};
use crate::compression::BlockCodec;
use crate::error::{Error, Result};
use crate::package::read_fstring;

use super::{CacheReference, MipFlags, MipLevel, MipReadContext, MipStorage, TexturePayload};

/// Most levels a texture may declare
const MAX_MIP_COUNT: i32 = 32;

/// Parse a texture payload.
///
/// Levels are routed by their flags. A level whose in-package chunk fails to
/// decode becomes [`MipStorage::Corrupt`] and the reader skips its stored
/// chunk size, so the remaining levels still decode. A cache miss leaves the
/// level without pixels.
///
/// # Errors
/// Returns an error if the surrounding structure (counts, sizes, dimensions,
/// GUID) is truncated or implausible, or a level that failed to decode has
/// no usable stored size to skip it by.
pub fn read_mip_chain(bytes: &[u8], ctx: &MipReadContext<'_>) -> Result<TexturePayload> {
    let mut cursor = Cursor::new(bytes);

    let mut prefix = [0u8; 12];
    cursor.read_exact(&mut prefix)?;
    let mip_count_offset = cursor.read_i32::<LittleEndian>()?;
    let source_art = read_fstring(&mut cursor)?;

    let mip_count = cursor.read_i32::<LittleEndian>()?;
    if !(0..=MAX_MIP_COUNT).contains(&mip_count) {
        return Err(Error::InvalidTexture(format!("mip count {mip_count}")));
    }

    let mut mips = Vec::with_capacity(mip_count as usize);
    for index in 0..mip_count as usize {
        mips.push(read_level(&mut cursor, bytes, index, ctx)?);
    }

    let mut guid = [0u8; 16];
    cursor.read_exact(&mut guid)?;

    let mut trailing = Vec::new();
    cursor.read_to_end(&mut trailing)?;

    Ok(TexturePayload {
        prefix,
        mip_count_offset,
        source_art,
        mips,
        guid,
        trailing,
    })
}

fn read_level(
    cursor: &mut Cursor<&[u8]>,
    bytes: &[u8],
    index: usize,
    ctx: &MipReadContext<'_>,
) -> Result<MipLevel> {
    let flags = MipFlags::from_bits(cursor.read_u32::<LittleEndian>()?);
    let uncompressed = cursor.read_i32::<LittleEndian>()?;
    let chunk_size = cursor.read_i32::<LittleEndian>()?;
    let chunk_offset = cursor.read_i32::<LittleEndian>()?;

    let uncompressed_size = u32::try_from(uncompressed)
        .ok()
        .filter(|&size| size as usize <= MAX_UNCOMPRESSED_SIZE)
        .ok_or(Error::InvalidSize {
            field: "mip uncompressed",
            value: i64::from(uncompressed),
        })?;
    let expected = uncompressed_size as usize;

    let storage = if flags.is_empty() {
        debug!("Mip {index}: {expected} raw bytes");
        MipStorage::Inline(read_exact_vec(cursor, expected)?)
    } else if flags.contains(MipFlags::STORE_IN_SEPARATE_FILE) {
        read_external(flags, expected, chunk_size, chunk_offset, index, ctx)?
    } else if flags.contains(MipFlags::SEPARATE_DATA) {
        warn!("Mip {index}: separate data storage is not supported, level skipped");
        MipStorage::Unsupported
    } else if flags.contains(MipFlags::UNUSED) {
        debug!("Mip {index}: empty ({flags:?})");
        MipStorage::Empty
    } else {
        read_chunked(cursor, bytes, flags, expected, chunk_size, index, ctx)?
    };

    let width = cursor.read_i32::<LittleEndian>()?;
    let height = cursor.read_i32::<LittleEndian>()?;

    Ok(MipLevel {
        flags,
        uncompressed_size,
        chunk_size,
        chunk_offset,
        width,
        height,
        storage,
    })
}

fn read_external(
    flags: MipFlags,
    expected: usize,
    chunk_size: i32,
    chunk_offset: i32,
    index: usize,
    ctx: &MipReadContext<'_>,
) -> Result<MipStorage> {
    let reference = CacheReference {
        cache_name: ctx.cache_name.unwrap_or_default().to_string(),
        offset: chunk_offset,
        length: chunk_size,
    };

    let unresolved = |reference| MipStorage::External {
        reference,
        pixels: None,
    };

    if chunk_offset < 0 || expected == 0 {
        debug!("Mip {index}: cached level without location");
        return Ok(unresolved(reference));
    }
    let (Some(dir), Some(cache_name)) = (ctx.package_dir, ctx.cache_name) else {
        warn!("Mip {index}: stored in a cache file but no cache name or directory is known");
        return Ok(unresolved(reference));
    };
    let codec = match BlockCodec::from_flags(flags) {
        Ok(codec) => codec,
        Err(e) => {
            warn!("Mip {index}: {e}");
            return Ok(unresolved(reference));
        }
    };

    debug!("Mip {index}: resolving {cache_name} at {chunk_offset}");
    let lookup = ctx.resolver.resolve(
        dir,
        cache_name,
        chunk_offset as u64,
        chunk_size.max(0) as u32,
        expected,
        codec,
    )?;

    Ok(match lookup {
        CacheLookup::Found(pixels) => MipStorage::External {
            reference,
            pixels: Some(pixels),
        },
        CacheLookup::NotFound(_) => unresolved(reference),
    })
}

fn read_chunked(
    cursor: &mut Cursor<&[u8]>,
    bytes: &[u8],
    flags: MipFlags,
    expected: usize,
    chunk_size: i32,
    index: usize,
    ctx: &MipReadContext<'_>,
) -> Result<MipStorage> {
    let data_start = cursor.position() as usize;

    let decoded = BlockCodec::from_flags(flags).and_then(|codec| {
        let mut parsed = chunk::read_chunk(cursor, expected)?;
        let pixels = chunk::decode(&mut parsed, expected, codec, !ctx.low_memory)?;
        debug!(
            "Mip {index}: {} blocks, {} -> {expected} bytes ({})",
            parsed.blocks.len(),
            parsed.header.compressed_size,
            codec.as_str()
        );
        Ok((parsed, pixels))
    });

    match decoded {
        Ok((chunk, pixels)) => Ok(MipStorage::Chunked { chunk, pixels }),
        Err(e) => {
            // The stored size is the only way past a chunk that did not parse
            let end = usize::try_from(chunk_size)
                .ok()
                .filter(|&size| size > 0)
                .and_then(|size| data_start.checked_add(size))
                .filter(|&end| end <= bytes.len())
                .ok_or_else(|| {
                    Error::InvalidTexture(format!(
                        "mip {index} chunk at {data_start} cannot be skipped with stored size {chunk_size} ({e})"
                    ))
                })?;
            warn!("Mip {index}: chunk failed to decode, keeping raw bytes: {e}");
            cursor.set_position(end as u64);
            Ok(MipStorage::Corrupt {
                raw: bytes[data_start..end].to_vec(),
                reason: e.to_string(),
            })
        }
    }
}

fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(Error::UnexpectedEof {
            needed: len,
            available: data.len(),
        });
    }
    Ok(data)
}
