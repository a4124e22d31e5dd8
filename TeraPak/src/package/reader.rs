//! Package parsing

use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::property::{read_property_list, PropertyRecord};
use crate::texture::{read_mip_chain, MipReadContext};

use super::{
    read_fstring, ExportEntry, ExportPayload, ImportEntry, NameEntry, NameTable, Package,
    PackageHeader, PackageReadOptions, EXPORT_ENTRY_SIZE, IMPORT_ENTRY_SIZE, PACKAGE_TAG,
    TEXTURE2D_CLASS,
};

/// Most entries accepted in any one table
const MAX_TABLE_ENTRIES: i32 = 1 << 20;

/// Export table fields before the data is parsed
struct ExportRecord {
    class_index: i32,
    super_index: i32,
    outer_index: i32,
    object_name: String,
    object_flags: u64,
    serial_size: i32,
    serial_offset: i32,
}

/// Read a package file from disk.
///
/// Cache files are looked up in the package's directory unless the options
/// name another one.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read, or a parse error.
pub fn read_package<P: AsRef<Path>>(path: P, options: &PackageReadOptions) -> Result<Package> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let mut package = parse_package_bytes(&bytes, path.parent(), options)?;
    package.path = Some(path.to_path_buf());
    Ok(package)
}

/// Parse a package from memory.
///
/// `package_dir` is where cache files live when the options do not say.
///
/// # Errors
/// Returns [`Error::InvalidPackageTag`] for foreign data, or a table or
/// bounds error. Texture and property problems inside a single export are
/// logged and the export kept verbatim.
pub fn parse_package_bytes(
    bytes: &[u8],
    package_dir: Option<&Path>,
    options: &PackageReadOptions,
) -> Result<Package> {
    let mut cursor = Cursor::new(bytes);

    let tag = cursor.read_u32::<LittleEndian>()?;
    if tag != PACKAGE_TAG {
        return Err(Error::InvalidPackageTag(tag));
    }

    let file_version = cursor.read_u16::<LittleEndian>()?;
    let licensee_version = cursor.read_u16::<LittleEndian>()?;
    let header_size = cursor.read_i32::<LittleEndian>()?;
    let folder_name = read_fstring(&mut cursor)?;
    let package_flags = cursor.read_u32::<LittleEndian>()?;

    let name_count = read_count(&mut cursor, "name count")?;
    let name_offset = cursor.read_i32::<LittleEndian>()?;
    let export_count = read_count(&mut cursor, "export count")?;
    let export_offset = cursor.read_i32::<LittleEndian>()?;
    let import_count = read_count(&mut cursor, "import count")?;
    let import_offset = cursor.read_i32::<LittleEndian>()?;

    let mut guid = [0u8; 16];
    cursor.read_exact(&mut guid)?;

    debug!(
        "Package v{file_version}/{licensee_version}: {name_count} names, {import_count} imports, {export_count} exports"
    );

    // Name table
    seek_table(&mut cursor, name_offset, "name table")?;
    let mut entries = Vec::with_capacity(name_count);
    for _ in 0..name_count {
        let name = read_fstring(&mut cursor)?;
        let flags = cursor.read_u64::<LittleEndian>()?;
        entries.push(NameEntry { name, flags });
    }
    let names = NameTable::from_entries(entries);

    // Import table
    seek_table(&mut cursor, import_offset, "import table")?;
    check_table(bytes, import_offset, import_count * IMPORT_ENTRY_SIZE, "import table")?;
    let mut imports = Vec::with_capacity(import_count);
    for _ in 0..import_count {
        imports.push(ImportEntry {
            class_package: names.read_name(&mut cursor)?,
            class_name: names.read_name(&mut cursor)?,
            outer_index: cursor.read_i32::<LittleEndian>()?,
            object_name: names.read_name(&mut cursor)?,
        });
    }

    // Export table
    seek_table(&mut cursor, export_offset, "export table")?;
    check_table(bytes, export_offset, export_count * EXPORT_ENTRY_SIZE, "export table")?;
    let mut records = Vec::with_capacity(export_count);
    for _ in 0..export_count {
        records.push(ExportRecord {
            class_index: cursor.read_i32::<LittleEndian>()?,
            super_index: cursor.read_i32::<LittleEndian>()?,
            outer_index: cursor.read_i32::<LittleEndian>()?,
            object_name: names.read_name(&mut cursor)?,
            object_flags: cursor.read_u64::<LittleEndian>()?,
            serial_size: cursor.read_i32::<LittleEndian>()?,
            serial_offset: cursor.read_i32::<LittleEndian>()?,
        });
    }

    let cache_dir = options.cache_dir.as_deref().or(package_dir);
    let mut exports = Vec::with_capacity(records.len());
    for record in &records {
        let is_texture = class_name(record.class_index, &imports, &records) == Some(TEXTURE2D_CLASS);
        exports.push(read_export(bytes, record, is_texture, &names, cache_dir, options)?);
    }

    Ok(Package {
        header: PackageHeader {
            file_version,
            licensee_version,
            header_size,
            folder_name,
            package_flags,
            guid,
        },
        names,
        imports,
        exports,
        path: None,
    })
}

fn read_export(
    bytes: &[u8],
    record: &ExportRecord,
    is_texture: bool,
    names: &NameTable,
    cache_dir: Option<&Path>,
    options: &PackageReadOptions,
) -> Result<ExportEntry> {
    let out_of_bounds = || Error::ExportOutOfBounds {
        name: record.object_name.clone(),
        offset: i64::from(record.serial_offset),
        size: i64::from(record.serial_size),
    };
    let start = usize::try_from(record.serial_offset).map_err(|_| out_of_bounds())?;
    let size = usize::try_from(record.serial_size).map_err(|_| out_of_bounds())?;
    let data = start
        .checked_add(size)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(out_of_bounds)?;

    let mut entry = ExportEntry {
        class_index: record.class_index,
        super_index: record.super_index,
        outer_index: record.outer_index,
        object_name: record.object_name.clone(),
        object_flags: record.object_flags,
        serial_size: record.serial_size,
        serial_offset: record.serial_offset,
        net_index: 0,
        properties: Vec::new(),
        payload: ExportPayload::Opaque(data.to_vec()),
    };

    let mut cursor = Cursor::new(data);
    let (net_index, properties) = match read_export_header(&mut cursor, names) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Export '{}': properties did not parse, keeping raw data: {e}", record.object_name);
            return Ok(entry);
        }
    };
    entry.net_index = net_index;
    entry.properties = properties;

    let body_start = cursor.position() as usize;
    let body = &data[body_start..];

    entry.payload = if is_texture {
        let ctx = MipReadContext {
            base_offset: (start + body_start) as u64,
            package_dir: cache_dir,
            cache_name: entry.cache_name(),
            resolver: &options.resolver,
            low_memory: options.low_memory,
        };
        match read_mip_chain(body, &ctx) {
            Ok(texture) => {
                let corrupt = texture.corrupt_count();
                if corrupt > 0 {
                    warn!("Texture '{}': {corrupt} mip level(s) failed to decode", record.object_name);
                }
                ExportPayload::Texture(texture)
            }
            Err(e) => {
                warn!("Texture '{}': mip chain did not parse, keeping raw data: {e}", record.object_name);
                ExportPayload::Raw(body.to_vec())
            }
        }
    } else {
        ExportPayload::Raw(body.to_vec())
    };

    Ok(entry)
}

fn read_export_header(cursor: &mut Cursor<&[u8]>, names: &NameTable) -> Result<(i32, Vec<PropertyRecord>)> {
    let net_index = cursor.read_i32::<LittleEndian>()?;
    let properties = read_property_list(cursor, names)?;
    Ok((net_index, properties))
}

/// Class name of a record's class reference
fn class_name<'a>(index: i32, imports: &'a [ImportEntry], records: &'a [ExportRecord]) -> Option<&'a str> {
    match index {
        0 => None,
        i if i < 0 => imports
            .get((-(i64::from(i)) - 1) as usize)
            .map(|imp| imp.object_name.as_str()),
        i => records.get(i as usize - 1).map(|r| r.object_name.as_str()),
    }
}

fn read_count(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<usize> {
    let count = cursor.read_i32::<LittleEndian>()?;
    if !(0..=MAX_TABLE_ENTRIES).contains(&count) {
        return Err(Error::InvalidSize {
            field,
            value: i64::from(count),
        });
    }
    Ok(count as usize)
}

fn seek_table(cursor: &mut Cursor<&[u8]>, offset: i32, field: &'static str) -> Result<()> {
    let len = cursor.get_ref().len();
    let offset = usize::try_from(offset)
        .ok()
        .filter(|&o| o <= len)
        .ok_or(Error::InvalidSize {
            field,
            value: i64::from(offset),
        })?;
    cursor.seek(SeekFrom::Start(offset as u64))?;
    Ok(())
}

fn check_table(bytes: &[u8], offset: i32, len: usize, field: &'static str) -> Result<()> {
    let available = bytes.len().saturating_sub(offset.max(0) as usize);
    if len > available {
        return Err(Error::InvalidSize {
            field,
            value: len as i64,
        });
    }
    Ok(())
}
