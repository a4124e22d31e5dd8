//! DDS export of decoded mip levels

use ddsfile::{D3DFormat, Dds};

use crate::error::{Error, Result};

use super::TexturePayload;

/// Pixel formats that can be wrapped in a DDS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Dxt1,
    Dxt3,
    Dxt5,
    A8R8G8B8,
    G8,
}

impl TextureFormat {
    /// Parse the engine's pixel format name (`PF_DXT1`, ...)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PF_DXT1" => Some(Self::Dxt1),
            "PF_DXT3" => Some(Self::Dxt3),
            "PF_DXT5" => Some(Self::Dxt5),
            "PF_A8R8G8B8" => Some(Self::A8R8G8B8),
            "PF_G8" => Some(Self::G8),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dxt1 => "PF_DXT1",
            Self::Dxt3 => "PF_DXT3",
            Self::Dxt5 => "PF_DXT5",
            Self::A8R8G8B8 => "PF_A8R8G8B8",
            Self::G8 => "PF_G8",
        }
    }

    fn d3d_format(self) -> D3DFormat {
        match self {
            Self::Dxt1 => D3DFormat::DXT1,
            Self::Dxt3 => D3DFormat::DXT3,
            Self::Dxt5 => D3DFormat::DXT5,
            Self::A8R8G8B8 => D3DFormat::A8R8G8B8,
            Self::G8 => D3DFormat::L8,
        }
    }
}

/// Build a DDS file around the largest mip level that has pixels.
///
/// Only the header is constructed; the pixel data is copied as-is.
///
/// # Errors
/// Returns [`Error::NoPixelData`] if no level decoded, or [`Error::DdsError`]
/// if the dimensions and data length disagree.
pub fn build_dds(payload: &TexturePayload, format: TextureFormat) -> Result<Vec<u8>> {
    let mip = payload.largest_populated_mip().ok_or(Error::NoPixelData)?;
    let pixels = mip.pixels().ok_or(Error::NoPixelData)?;

    let (width, height) = match (u32::try_from(mip.width), u32::try_from(mip.height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(Error::DdsError(format!(
                "Invalid dimensions {}x{}",
                mip.width, mip.height
            )));
        }
    };

    let mut dds = Dds::new_d3d(ddsfile::NewD3dParams {
        height,
        width,
        depth: None,
        format: format.d3d_format(),
        mipmap_levels: None,
        caps2: None,
    })
    .map_err(|e| Error::DdsError(format!("Failed to create DDS: {e}")))?;

    let dds_data = dds
        .get_mut_data(0)
        .map_err(|e| Error::DdsError(format!("No DDS data layer: {e}")))?;
    if dds_data.len() != pixels.len() {
        return Err(Error::DdsError(format!(
            "{width}x{height} {} needs {} bytes, mip has {}",
            format.as_str(),
            dds_data.len(),
            pixels.len()
        )));
    }
    dds_data.copy_from_slice(pixels);

    let mut output = Vec::new();
    dds.write(&mut output)
        .map_err(|e| Error::DdsError(format!("Failed to write DDS: {e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{MipFlags, MipLevel, MipStorage};

    fn texture(levels: &[(i32, i32, Option<usize>)]) -> TexturePayload {
        TexturePayload {
            prefix: [0; 12],
            mip_count_offset: 0,
            source_art: String::new(),
            mips: levels
                .iter()
                .map(|&(width, height, len)| MipLevel {
                    flags: MipFlags::empty(),
                    uncompressed_size: len.unwrap_or(0) as u32,
                    chunk_size: 0,
                    chunk_offset: 0,
                    width,
                    height,
                    storage: len.map_or(MipStorage::Empty, |n| MipStorage::Inline(vec![0x7F; n])),
                })
                .collect(),
            guid: [0; 16],
            trailing: Vec::new(),
        }
    }

    #[test]
    fn test_format_names() {
        assert_eq!(TextureFormat::from_name("PF_DXT5"), Some(TextureFormat::Dxt5));
        assert_eq!(TextureFormat::from_name("PF_BC7"), None);
    }

    #[test]
    fn test_dds_uses_largest_populated_level() {
        // 8x8 DXT1 is 4 blocks of 8 bytes; the 16x16 level has no pixels
        let payload = texture(&[(16, 16, None), (8, 8, Some(32)), (4, 4, Some(8))]);
        let bytes = build_dds(&payload, TextureFormat::Dxt1).unwrap();

        assert_eq!(&bytes[..4], b"DDS ");
        let dds = Dds::read(&mut bytes.as_slice()).unwrap();
        assert_eq!(dds.get_width(), 8);
        assert_eq!(dds.get_height(), 8);
        assert_eq!(dds.get_data(0).unwrap(), vec![0x7F; 32].as_slice());
    }

    #[test]
    fn test_dds_without_pixels() {
        let payload = texture(&[(16, 16, None)]);
        assert!(matches!(build_dds(&payload, TextureFormat::Dxt1), Err(Error::NoPixelData)));
    }

    #[test]
    fn test_dds_length_mismatch() {
        let payload = texture(&[(8, 8, Some(10))]);
        assert!(matches!(build_dds(&payload, TextureFormat::Dxt5), Err(Error::DdsError(_))));
    }
}
