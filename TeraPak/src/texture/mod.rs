//! Texture mip chain codec
//!
//! A `Texture2D` export carries its pixel data after the property list:
//!
//! ```text
//! [12 unparsed bytes][mip count offset i32][source art path string][mip count i32]
//! per level: [flags u32][uncompressed i32][chunk size i32][chunk offset i32]
//!            [data ...][width i32][height i32]
//! [guid 16 bytes]
//! ```
//!
//! Each level is routed by its flags. Levels that fail to decode are kept as
//! raw bytes so the rest of the chain, and the package, survive.

mod dds;
mod flags;
mod reader;
mod writer;

use std::path::{Path, PathBuf};

use crate::cache::CacheResolver;
use crate::chunk::{self, CompressedChunk};
use crate::config::EngineConfig;
use crate::error::Result;

pub use dds::{build_dds, TextureFormat};
pub use flags::MipFlags;
pub use reader::read_mip_chain;
pub use writer::{serialized_size, write_mip_chain};

/// Name of the property holding the cache file name
pub const CACHE_NAME_PROPERTY: &str = "TextureFileCacheName";

/// Name of the property holding the pixel format
pub const FORMAT_PROPERTY: &str = "Format";

/// Location of a level inside an external cache file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheReference {
    pub cache_name: String,
    pub offset: i32,
    pub length: i32,
}

/// Where a level's pixels live and in what form
#[derive(Debug, Clone, PartialEq)]
pub enum MipStorage {
    /// Uncompressed bytes stored in the package
    Inline(Vec<u8>),
    /// Compressed chunk stored in the package, with its decoded pixels
    Chunked {
        chunk: CompressedChunk,
        pixels: Vec<u8>,
    },
    /// Chunk stored in a cache file; `pixels` is `None` if it did not resolve.
    ///
    /// On write, a level with pixels keeps its cache reference and one without
    /// gets `-1` size and offset. Whether a read level keeps its reference
    /// therefore depends on the cache file being found when it was read.
    External {
        reference: CacheReference,
        pixels: Option<Vec<u8>>,
    },
    /// Storage scheme this crate does not handle
    Unsupported,
    /// No payload
    Empty,
    /// In-package chunk that failed to decode; bytes are written back as-is
    Corrupt { raw: Vec<u8>, reason: String },
}

/// One level of the mip chain
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub flags: MipFlags,
    pub uncompressed_size: u32,
    /// Chunk size as stored in the file
    pub chunk_size: i32,
    /// Chunk offset as stored in the file
    pub chunk_offset: i32,
    pub width: i32,
    pub height: i32,
    pub storage: MipStorage,
}

impl MipLevel {
    /// Build an in-package compressed level from pixels, using the
    /// configured codec and block size.
    ///
    /// # Errors
    /// Returns an error if compression fails or the block size is invalid.
    pub fn compressed(width: i32, height: i32, pixels: Vec<u8>, config: &EngineConfig) -> Result<Self> {
        let chunk = chunk::encode(&pixels, config.block_size, config.chunk_codec)?;
        Ok(Self {
            flags: config.chunk_codec.to_flags(),
            uncompressed_size: pixels.len() as u32,
            chunk_size: chunk.chunk_size() as i32,
            chunk_offset: 0,
            width,
            height,
            storage: MipStorage::Chunked { chunk, pixels },
        })
    }

    /// Build an uncompressed in-package level
    #[must_use]
    pub fn inline(width: i32, height: i32, pixels: Vec<u8>) -> Self {
        Self {
            flags: MipFlags::empty(),
            uncompressed_size: pixels.len() as u32,
            chunk_size: pixels.len() as i32,
            chunk_offset: 0,
            width,
            height,
            storage: MipStorage::Inline(pixels),
        }
    }

    /// Decoded pixels, if this level has any
    #[must_use]
    pub fn pixels(&self) -> Option<&[u8]> {
        match &self.storage {
            MipStorage::Inline(data) => Some(data),
            MipStorage::Chunked { pixels, .. } => Some(pixels),
            MipStorage::External { pixels, .. } => pixels.as_deref(),
            MipStorage::Unsupported | MipStorage::Empty | MipStorage::Corrupt { .. } => None,
        }
    }

    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self.storage, MipStorage::Corrupt { .. })
    }
}

/// Decoded pixel payload of a `Texture2D` export
#[derive(Debug, Clone, PartialEq)]
pub struct TexturePayload {
    /// Leading bytes kept verbatim
    pub prefix: [u8; 12],
    /// Offset of the mip count field as stored in the file
    pub mip_count_offset: i32,
    /// Path of the source art the texture was imported from
    pub source_art: String,
    pub mips: Vec<MipLevel>,
    pub guid: [u8; 16],
    /// Bytes after the GUID, kept verbatim
    pub trailing: Vec<u8>,
}

impl TexturePayload {
    /// Largest level (by pixel area) that has decoded pixels
    #[must_use]
    pub fn largest_populated_mip(&self) -> Option<&MipLevel> {
        self.mips
            .iter()
            .filter(|m| m.pixels().is_some_and(|p| !p.is_empty()))
            .max_by_key(|m| i64::from(m.width) * i64::from(m.height))
    }

    /// Number of levels that failed to decode
    #[must_use]
    pub fn corrupt_count(&self) -> usize {
        self.mips.iter().filter(|m| m.is_corrupt()).count()
    }
}

/// Everything the mip reader needs beyond the bytes themselves
#[derive(Debug, Clone, Copy)]
pub struct MipReadContext<'a> {
    /// Absolute position of the payload's first byte in the package
    pub base_offset: u64,
    /// Directory holding the package and its cache files
    pub package_dir: Option<&'a Path>,
    /// Cache file name from the export's properties
    pub cache_name: Option<&'a str>,
    pub resolver: &'a CacheResolver,
    /// Drop compressed bodies once decoded
    pub low_memory: bool,
}

impl<'a> MipReadContext<'a> {
    #[must_use]
    pub fn new(resolver: &'a CacheResolver) -> Self {
        Self {
            base_offset: 0,
            package_dir: None,
            cache_name: None,
            resolver,
            low_memory: false,
        }
    }

    #[must_use]
    pub fn with_base_offset(mut self, base_offset: u64) -> Self {
        self.base_offset = base_offset;
        self
    }

    #[must_use]
    pub fn with_package_dir(mut self, dir: &'a Path) -> Self {
        self.package_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_cache_name(mut self, cache_name: Option<&'a str>) -> Self {
        self.cache_name = cache_name;
        self
    }

    #[must_use]
    pub fn with_low_memory(mut self, low_memory: bool) -> Self {
        self.low_memory = low_memory;
        self
    }

    /// Path of the cache file this context would read, if known
    #[must_use]
    pub fn cache_path(&self) -> Option<PathBuf> {
        Some(self.resolver.cache_path(self.package_dir?, self.cache_name?))
    }
}
