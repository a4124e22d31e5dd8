//! Zlib block compression

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{Error, Result};

/// Compress a block as a zlib stream.
///
/// # Errors
/// Returns an error if the encoder fails.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib block.
///
/// # Errors
/// Returns an error if the stream is malformed or the output length is wrong.
pub fn decompress(compressed: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    // One byte past the expected size is enough to detect an oversized block
    let mut decoder = ZlibDecoder::new(compressed).take(expected_size as u64 + 1);
    let mut decompressed = Vec::with_capacity(expected_size);

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::ZlibDecompressionFailed {
            message: e.to_string(),
        })?;

    if decompressed.len() != expected_size {
        return Err(Error::ZlibDecompressionFailed {
            message: format!(
                "produced {} bytes, expected {expected_size}",
                decompressed.len()
            ),
        });
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_block_is_cut_off() {
        let packed = compress(&vec![0u8; 1 << 20]).unwrap();
        let err = decompress(&packed, 4096).unwrap_err();
        assert!(matches!(
            err,
            Error::ZlibDecompressionFailed { ref message } if message == "produced 4097 bytes, expected 4096"
        ));
    }

    #[test]
    fn test_short_block_is_rejected() {
        let packed = compress(&[1, 2, 3]).unwrap();
        assert!(matches!(decompress(&packed, 8), Err(Error::ZlibDecompressionFailed { .. })));
    }
}
