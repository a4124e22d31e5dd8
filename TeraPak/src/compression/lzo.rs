//! LZO1X block compression

use crate::error::{Error, Result};

/// Compress a block with LZO1X.
///
/// # Errors
/// Returns an error if compression fails.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    lzokay_native::compress(data).map_err(|e| Error::LzoCompressionFailed {
        message: format!("{e:?}"),
    })
}

/// Decompress an LZO1X block.
///
/// # Errors
/// Returns an error if the stream is malformed or does not inflate to
/// `expected_size` bytes.
pub fn decompress(compressed: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if expected_size == 0 {
        return Ok(Vec::new());
    }

    let data = lzokay_native::decompress_all(compressed, Some(expected_size)).map_err(|e| {
        Error::LzoDecompressionFailed {
            message: format!("{e:?}"),
        }
    })?;

    if data.len() != expected_size {
        return Err(Error::LzoDecompressionFailed {
            message: format!(
                "produced {} bytes, expected {expected_size}",
                data.len()
            ),
        });
    }
    Ok(data)
}
