//! Block compression used inside mip chunks
//!
//! Each chunk block is compressed independently. The scheme is chosen from the
//! mip level flags: LZO unless the zlib bit is set, LZX is recognised but not
//! implemented.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::texture::MipFlags;

pub mod lzo;
pub mod zlib;

/// Compression scheme for the blocks of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockCodec {
    /// LZO1X, the default for cooked textures
    #[default]
    Lzo,
    /// Zlib stream per block
    Zlib,
}

impl BlockCodec {
    /// Pick the codec from mip flags
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedCompression`] for LZX-compressed levels.
    pub fn from_flags(flags: MipFlags) -> Result<Self> {
        if flags.contains(MipFlags::COMPRESSED_ZLIB) {
            Ok(Self::Zlib)
        } else if flags.contains(MipFlags::COMPRESSED_LZX) {
            Err(Error::UnsupportedCompression { flags: flags.bits() })
        } else {
            Ok(Self::Lzo)
        }
    }

    /// Flag bit that marks a level as compressed with this codec
    #[must_use]
    pub fn to_flags(self) -> MipFlags {
        match self {
            Self::Lzo => MipFlags::COMPRESSED_LZO,
            Self::Zlib => MipFlags::COMPRESSED_ZLIB,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lzo => "lzo",
            Self::Zlib => "zlib",
        }
    }

    /// Compress one block
    ///
    /// # Errors
    /// Returns an error if the underlying compressor fails.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Lzo => lzo::compress(data),
            Self::Zlib => zlib::compress(data),
        }
    }

    /// Decompress one block into exactly `expected_size` bytes
    ///
    /// # Errors
    /// Returns an error if decompression fails.
    pub fn decompress(self, compressed: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        match self {
            Self::Lzo => lzo::decompress(compressed, expected_size),
            Self::Zlib => zlib::decompress(compressed, expected_size),
        }
    }
}
