mod common;

use std::io::Cursor;

use pretty_assertions::assert_eq;
use terapak::chunk::{self, CHUNK_SIGNATURE};
use terapak::prelude::*;

use common::{cached_level, empty_texture, init_logging, pixels};

#[test]
fn test_chunk_roundtrip_sizes() {
    for (len, block_size) in [(0, 128), (1, 128), (128, 128), (129, 128), (300_000, 131_072), (5_000, 333)] {
        for codec in [BlockCodec::Lzo, BlockCodec::Zlib] {
            let data = pixels(len, 7);
            let chunk = chunk::encode(&data, block_size, codec).unwrap();

            let mut bytes = Vec::new();
            chunk::write_chunk(&mut bytes, &chunk).unwrap();
            let mut parsed = chunk::read_chunk(&mut Cursor::new(bytes.as_slice()), len).unwrap();
            let decoded = chunk::decode(&mut parsed, len, codec, false).unwrap();

            assert_eq!(decoded, data, "len {len}, block {block_size}, {}", codec.as_str());
        }
    }
}

#[test]
fn test_block_sizes_sum_to_level_size() {
    for (len, block_size) in [(300, 128), (256, 128), (1, 64), (1_000_000, 131_072)] {
        let chunk = chunk::encode(&pixels(len, 3), block_size, BlockCodec::Lzo).unwrap();
        assert_eq!(chunk.blocks.len(), len.div_ceil(block_size as usize));
        assert_eq!(chunk.total_uncompressed(), len);
        assert!(chunk.blocks.iter().all(|b| b.uncompressed_size <= block_size));
    }
}

#[test]
fn test_raw_chain_roundtrip() {
    let mut texture = empty_texture();
    texture.mips = vec![
        MipLevel::inline(16, 16, pixels(128, 5)),
        MipLevel::inline(8, 8, pixels(32, 9)),
        MipLevel::inline(4, 4, pixels(8, 11)),
    ];

    let resolver = CacheResolver::new();
    let bytes = write_mip_chain(&texture, 4_096).unwrap();
    let ctx = terapak::texture::MipReadContext::new(&resolver).with_base_offset(4_096);
    let read = read_mip_chain(&bytes, &ctx).unwrap();

    assert_eq!(write_mip_chain(&read, 4_096).unwrap(), bytes);
    assert_eq!(read.source_art, texture.source_art);
    assert_eq!(read.guid, texture.guid);
}

#[test]
fn test_repair_twice_is_stable() {
    let config = EngineConfig::new().with_block_size(1_024);
    let mut level = MipLevel::compressed(32, 32, pixels(5_000, 13), &config).unwrap();
    let correct = level.chunk_size;
    level.chunk_size = 3;

    let MipStorage::Chunked { chunk, .. } = &level.storage else {
        panic!("expected a chunked level");
    };
    let (first, changed) = chunk.repair_chunk_size(level.chunk_size);
    let (second, changed_again) = chunk.repair_chunk_size(first);
    assert_eq!((first, changed), (correct, true));
    assert_eq!((second, changed_again), (correct, false));
}

/// Four levels: raw, chunked, cached in a missing file, and a chunk whose
/// signature was wiped
#[test]
fn test_mixed_chain_with_missing_cache_and_bad_signature() {
    init_logging();
    let temp = tempfile::tempdir().unwrap();
    let config = EngineConfig::new().with_block_size(128);

    let level0 = pixels(256, 3);
    let level1 = pixels(300, 5);
    let level3 = pixels(64, 7);

    let mut texture = empty_texture();
    texture.mips = vec![
        MipLevel::inline(16, 16, level0.clone()),
        MipLevel::compressed(8, 8, level1.clone(), &config).unwrap(),
        cached_level("MissingCache", 512, 100, 4, 4, 64),
        MipLevel::compressed(2, 2, level3, &config).unwrap(),
    ];
    if let MipStorage::Chunked { chunk, .. } = &texture.mips[1].storage {
        assert_eq!(chunk.blocks.len(), 3);
    }

    let mut bytes = write_mip_chain(&texture, 0).unwrap();

    let resolver = CacheResolver::new();
    let ctx = terapak::texture::MipReadContext::new(&resolver)
        .with_package_dir(temp.path())
        .with_cache_name(Some("MissingCache"));

    // Corrupt the last level's chunk signature
    let clean = read_mip_chain(&bytes, &ctx).unwrap();
    let sig_at = clean.mips[3].chunk_offset as usize;
    assert_eq!(&bytes[sig_at..sig_at + 4], &CHUNK_SIGNATURE.to_le_bytes());
    bytes[sig_at..sig_at + 4].copy_from_slice(&[0, 0, 0, 0]);

    let read = read_mip_chain(&bytes, &ctx).unwrap();
    assert_eq!(read.mips.len(), 4);
    assert_eq!(read.mips[0].pixels(), Some(level0.as_slice()));
    assert_eq!(read.mips[1].pixels(), Some(level1.as_slice()));
    assert!(matches!(
        &read.mips[2].storage,
        MipStorage::External { pixels: None, reference } if reference.cache_name == "MissingCache"
    ));
    match &read.mips[3].storage {
        MipStorage::Corrupt { reason, raw } => {
            assert!(reason.contains("signature"), "{reason}");
            assert_eq!(raw.len(), read.mips[3].chunk_size as usize);
        }
        other => panic!("expected a corrupt level, got {other:?}"),
    }
    assert_eq!((read.mips[3].width, read.mips[3].height), (2, 2));
    assert_eq!(read.guid, texture.guid);
    assert_eq!(read.corrupt_count(), 1);

    // Corrupt bytes go back unchanged; the unresolved cache level becomes sentinels
    let rewritten = write_mip_chain(&read, 0).unwrap();
    let reread = read_mip_chain(&rewritten, &ctx).unwrap();
    assert_eq!((reread.mips[2].chunk_size, reread.mips[2].chunk_offset), (-1, -1));
    assert_eq!(reread.mips[3].storage, read.mips[3].storage);
}

#[test]
fn test_corrupted_chunk_leaves_sibling_decodable() {
    let first = pixels(2_000, 17);
    let second = pixels(2_000, 19);
    let a = chunk::encode(&first, 512, BlockCodec::Lzo).unwrap();
    let b = chunk::encode(&second, 512, BlockCodec::Lzo).unwrap();

    let mut bytes = Vec::new();
    chunk::write_chunk(&mut bytes, &a).unwrap();
    let second_at = bytes.len();
    chunk::write_chunk(&mut bytes, &b).unwrap();
    bytes[..4].copy_from_slice(&0u32.to_le_bytes());

    let err = chunk::read_chunk(&mut Cursor::new(&bytes[..second_at]), first.len()).unwrap_err();
    assert!(matches!(err, Error::InvalidChunkSignature { found: 0, .. }));

    let mut parsed = chunk::read_chunk(&mut Cursor::new(&bytes[second_at..]), second.len()).unwrap();
    assert_eq!(chunk::decode(&mut parsed, second.len(), BlockCodec::Lzo, false).unwrap(), second);
}

#[test]
fn test_cached_level_resolves_from_tfc() {
    init_logging();
    let temp = tempfile::tempdir().unwrap();
    let data = pixels(4_096, 23);

    let cache_chunk = chunk::encode(&data, 1_024, BlockCodec::Lzo).unwrap();
    let mut cache = vec![0u8; 256];
    chunk::write_chunk(&mut cache, &cache_chunk).unwrap();
    std::fs::write(temp.path().join("WorldTextures.tfc"), &cache).unwrap();

    let mut texture = empty_texture();
    texture.mips = vec![cached_level("WorldTextures", 256, cache_chunk.chunk_size() as i32, 64, 64, 4_096)];
    let bytes = write_mip_chain(&texture, 0).unwrap();

    let resolver = CacheResolver::new();
    let ctx = terapak::texture::MipReadContext::new(&resolver)
        .with_package_dir(temp.path())
        .with_cache_name(Some("WorldTextures"));
    let read = read_mip_chain(&bytes, &ctx).unwrap();
    assert_eq!(read.mips[0].pixels(), Some(data.as_slice()));

    // Resolved levels keep pointing at the cache
    let again = write_mip_chain(&read, 0).unwrap();
    assert_eq!(again, bytes);
}
