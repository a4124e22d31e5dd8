//! Package serialization
//!
//! Layout is computed up front so every export knows its absolute offset
//! before its data is serialized; texture chunk offsets depend on it.

use std::fs;
use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::property::write_property_list;
use crate::texture::write_mip_chain;

use super::{
    fstring_size, write_fstring, ExportPayload, Package, EXPORT_ENTRY_SIZE, IMPORT_ENTRY_SIZE,
    PACKAGE_TAG,
};

/// Fixed part of the header after the folder name: flags, three count/offset pairs, guid
const HEADER_TAIL_SIZE: usize = 4 + 6 * 4 + 16;

/// Serialize a package.
///
/// Property sizes are recomputed as they are written. Call
/// [`Package::prepare_for_save`] first so every referenced name is present.
///
/// # Errors
/// Returns [`Error::NameNotInTable`] for a name missing from the table, or an
/// error from texture serialization.
pub fn write_package(package: &Package) -> Result<Vec<u8>> {
    let header_len = 4 + 2 + 2 + 4 + fstring_size(&package.header.folder_name) + HEADER_TAIL_SIZE;
    let names_len: usize = package
        .names
        .entries()
        .iter()
        .map(|e| fstring_size(&e.name) + 8)
        .sum();
    let imports_len = package.imports.len() * IMPORT_ENTRY_SIZE;
    let exports_len = package.exports.len() * EXPORT_ENTRY_SIZE;

    let name_offset = header_len;
    let import_offset = name_offset + names_len;
    let export_offset = import_offset + imports_len;
    let data_start = export_offset + exports_len;

    // Export data, each at its final absolute offset
    let mut data = Vec::new();
    let mut placements = Vec::with_capacity(package.exports.len());
    for export in &package.exports {
        let offset = data_start + data.len();
        let start = data.len();

        match &export.payload {
            ExportPayload::Opaque(raw) => data.extend_from_slice(raw),
            payload => {
                data.write_i32::<LittleEndian>(export.net_index)?;
                write_property_list(&mut data, &export.properties, &package.names)?;
                match payload {
                    ExportPayload::Texture(texture) => {
                        let base = (data_start + data.len()) as u64;
                        data.extend_from_slice(&write_mip_chain(texture, base)?);
                    }
                    ExportPayload::Raw(raw) | ExportPayload::Opaque(raw) => data.extend_from_slice(raw),
                }
            }
        }

        let size = data.len() - start;
        debug!("Export '{}': {size} bytes at {offset}", export.object_name);
        placements.push((to_i32(offset, "serial offset")?, to_i32(size, "serial size")?));
    }

    let mut out = Vec::with_capacity(data_start + data.len());
    out.write_u32::<LittleEndian>(PACKAGE_TAG)?;
    out.write_u16::<LittleEndian>(package.header.file_version)?;
    out.write_u16::<LittleEndian>(package.header.licensee_version)?;
    out.write_i32::<LittleEndian>(to_i32(data_start, "header size")?)?;
    write_fstring(&mut out, &package.header.folder_name)?;
    out.write_u32::<LittleEndian>(package.header.package_flags)?;
    out.write_i32::<LittleEndian>(package.names.len() as i32)?;
    out.write_i32::<LittleEndian>(to_i32(name_offset, "name offset")?)?;
    out.write_i32::<LittleEndian>(package.exports.len() as i32)?;
    out.write_i32::<LittleEndian>(to_i32(export_offset, "export offset")?)?;
    out.write_i32::<LittleEndian>(package.imports.len() as i32)?;
    out.write_i32::<LittleEndian>(to_i32(import_offset, "import offset")?)?;
    out.write_all(&package.header.guid)?;

    for entry in package.names.entries() {
        write_fstring(&mut out, &entry.name)?;
        out.write_u64::<LittleEndian>(entry.flags)?;
    }

    for import in &package.imports {
        package.names.write_name(&mut out, &import.class_package)?;
        package.names.write_name(&mut out, &import.class_name)?;
        out.write_i32::<LittleEndian>(import.outer_index)?;
        package.names.write_name(&mut out, &import.object_name)?;
    }

    for (export, (offset, size)) in package.exports.iter().zip(&placements) {
        out.write_i32::<LittleEndian>(export.class_index)?;
        out.write_i32::<LittleEndian>(export.super_index)?;
        out.write_i32::<LittleEndian>(export.outer_index)?;
        package.names.write_name(&mut out, &export.object_name)?;
        out.write_u64::<LittleEndian>(export.object_flags)?;
        out.write_i32::<LittleEndian>(*size)?;
        out.write_i32::<LittleEndian>(*offset)?;
    }

    debug_assert_eq!(out.len(), data_start);
    out.extend_from_slice(&data);
    Ok(out)
}

/// Serialize a package and write it to `path`, creating parent folders.
///
/// # Errors
/// Returns an error if serialization or the file write fails.
pub fn save_package<P: AsRef<Path>>(package: &Package, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = write_package(package)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Serialize a package and zero-pad it to `target_size` bytes.
///
/// A padded package can replace the original in place, for example inside a
/// composite container. A package that already exceeds `target_size` is
/// returned unpadded with a warning.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn write_package_padded(package: &Package, target_size: usize) -> Result<Vec<u8>> {
    let mut bytes = write_package(package)?;
    if bytes.len() > target_size {
        warn!(
            "Package '{}' is {} bytes, {} over its padded size; written unpadded",
            package.name(),
            bytes.len(),
            bytes.len() - target_size
        );
    } else {
        debug!("Padding '{}' with {} bytes", package.name(), target_size - bytes.len());
        bytes.resize(target_size, 0);
    }
    Ok(bytes)
}

/// [`save_package`] with the output padded to `target_size` bytes.
///
/// # Errors
/// Returns an error if serialization or the file write fails.
pub fn save_package_padded<P: AsRef<Path>>(package: &Package, path: P, target_size: usize) -> Result<()> {
    let path = path.as_ref();
    let bytes = write_package_padded(package, target_size)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn to_i32(value: usize, field: &'static str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidSize {
        field,
        value: value as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::sample_package;
    use crate::package::{parse_package_bytes, PackageReadOptions};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_package_roundtrip() {
        let package = sample_package();
        let bytes = write_package(&package).unwrap();
        let read = parse_package_bytes(&bytes, None, &PackageReadOptions::new()).unwrap();

        assert_eq!(read.header.folder_name, "None");
        assert_eq!(read.header.header_size as usize, bytes.len() - read.exports.iter().map(|e| e.serial_size as usize).sum::<usize>());
        assert_eq!(read.imports, package.imports);
        assert_eq!(read.exports.len(), 2);
        assert_eq!(read.exports[0].payload, ExportPayload::Raw(vec![1, 2, 3]));
        assert_eq!(read.exports[1].properties, package.exports[1].properties);

        let texture = read.exports[1].texture().unwrap();
        assert_eq!(texture.mips[0].pixels(), Some(vec![0x11; 32].as_slice()));
        // Inline data offset points into the file at the pixel bytes
        let offset = texture.mips[0].chunk_offset as usize;
        assert_eq!(&bytes[offset..offset + 32], vec![0x11; 32].as_slice());

        // Writing what was read reproduces the same bytes
        assert_eq!(write_package(&read).unwrap(), bytes);
    }

    #[test]
    fn test_padded_package_still_parses() {
        let package = sample_package();
        let plain = write_package(&package).unwrap();
        let padded = write_package_padded(&package, plain.len() + 100).unwrap();

        assert_eq!(padded.len(), plain.len() + 100);
        assert_eq!(&padded[..plain.len()], plain.as_slice());
        assert!(padded[plain.len()..].iter().all(|&b| b == 0));

        let read = parse_package_bytes(&padded, None, &PackageReadOptions::new()).unwrap();
        assert_eq!(read.exports.len(), 2);
        assert_eq!(read.exports[0].payload, ExportPayload::Raw(vec![1, 2, 3]));
    }

    #[test]
    fn test_padding_never_truncates() {
        let package = sample_package();
        let plain = write_package(&package).unwrap();
        assert_eq!(write_package_padded(&package, 10).unwrap(), plain);
        assert_eq!(write_package_padded(&package, plain.len()).unwrap(), plain);
    }

    #[test]
    fn test_bad_tag() {
        let mut bytes = write_package(&sample_package()).unwrap();
        bytes[0] = 0;
        assert!(matches!(
            parse_package_bytes(&bytes, None, &PackageReadOptions::new()),
            Err(Error::InvalidPackageTag(_))
        ));
    }

    #[test]
    fn test_export_out_of_bounds() {
        let package = sample_package();
        let mut bytes = write_package(&package).unwrap();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            parse_package_bytes(&bytes, None, &PackageReadOptions::new()),
            Err(Error::ExportOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_broken_properties_keep_export_opaque() {
        let mut package = sample_package();
        package.exports[0].payload = ExportPayload::Opaque(vec![0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0x7F, 0, 0, 0, 0]);
        let bytes = write_package(&package).unwrap();

        let read = parse_package_bytes(&bytes, None, &PackageReadOptions::new()).unwrap();
        assert!(matches!(read.exports[0].payload, ExportPayload::Opaque(_)));
        assert_eq!(write_package(&read).unwrap(), bytes);
    }
}
