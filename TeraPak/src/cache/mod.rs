//! External texture cache lookup
//!
//! Mip levels flagged as stored in a separate file point at a chunk inside a
//! cache file (`<name>.tfc`) next to the package. Lookups open the file
//! read-only per call, so any number of jobs may share one cache.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use crate::chunk::{self, CHUNK_SIGNATURE, MAX_UNCOMPRESSED_SIZE};
use crate::compression::BlockCodec;
use crate::error::{Error, Result};

/// Default cache file extension
pub const DEFAULT_CACHE_EXTENSION: &str = "tfc";

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Decoded pixel data
    Found(Vec<u8>),
    /// The level could not be resolved; the reason is for logging
    NotFound(String),
}

/// Resolves cache references to decoded pixels
#[derive(Debug, Clone)]
pub struct CacheResolver {
    extension: String,
}

impl Default for CacheResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extension: DEFAULT_CACHE_EXTENSION.to_string(),
        }
    }

    /// Use a different cache file extension (without the dot)
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the cache file `cache_name` beside a package in `package_dir`
    #[must_use]
    pub fn cache_path(&self, package_dir: &Path, cache_name: &str) -> PathBuf {
        package_dir.join(format!("{cache_name}.{}", self.extension))
    }

    /// Decode the chunk at `offset` in the cache file.
    ///
    /// A missing file, a signature mismatch or a failed decode is reported
    /// as [`CacheLookup::NotFound`] and logged; the caller keeps going.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSize`] when `expected` exceeds the sanity limit.
    pub fn resolve(
        &self,
        package_dir: &Path,
        cache_name: &str,
        offset: u64,
        length: u32,
        expected: usize,
        codec: BlockCodec,
    ) -> Result<CacheLookup> {
        if expected > MAX_UNCOMPRESSED_SIZE {
            return Err(Error::InvalidSize {
                field: "cached uncompressed",
                value: expected as i64,
            });
        }

        let path = self.cache_path(package_dir, cache_name);
        let lookup = match self.read_at(&path, offset, expected, codec) {
            Ok(pixels) => {
                debug!(
                    "Resolved {} bytes from {} at {offset} (chunk {length} bytes)",
                    pixels.len(),
                    path.display()
                );
                CacheLookup::Found(pixels)
            }
            Err(e) => {
                let reason = format!("{} at {offset}: {e}", path.display());
                warn!("Cache lookup failed, level left empty: {reason}");
                CacheLookup::NotFound(reason)
            }
        };
        Ok(lookup)
    }

    fn read_at(&self, path: &Path, offset: u64, expected: usize, codec: BlockCodec) -> Result<Vec<u8>> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if offset >= file_len {
            return Err(Error::UnexpectedEof {
                needed: offset as usize + chunk::HEADER_SIZE,
                available: file_len as usize,
            });
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;

        // Peek before committing to a full chunk parse
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != CHUNK_SIGNATURE {
            return Err(Error::InvalidChunkSignature {
                expected: CHUNK_SIGNATURE,
                found: signature,
            });
        }
        reader.seek(SeekFrom::Start(offset))?;

        let mut parsed = chunk::read_chunk(&mut reader, expected)?;
        chunk::decode(&mut parsed, expected, codec, false)
    }
}
