#![allow(dead_code)]

use terapak::package::{ExportEntry, ExportPayload, ImportEntry, Package, PackageHeader};
use terapak::prelude::*;
use terapak::property::{ByteValue, BYTE_PROPERTY, INT_PROPERTY, NAME_PROPERTY};
use terapak::texture::CacheReference;
use terapak::package::NameTable;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn pixels(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(seed).wrapping_add(seed)).collect()
}

pub fn empty_texture() -> TexturePayload {
    TexturePayload {
        prefix: [0; 12],
        mip_count_offset: 0,
        source_art: "C:\\Art\\Rock_D.tga".to_string(),
        mips: Vec::new(),
        guid: [0x42; 16],
        trailing: Vec::new(),
    }
}

/// A cache-file level as it looks after a successful lookup
pub fn cached_level(cache_name: &str, offset: i32, length: i32, width: i32, height: i32, size: u32) -> MipLevel {
    MipLevel {
        flags: MipFlags::STORE_IN_SEPARATE_FILE | MipFlags::COMPRESSED_LZO,
        uncompressed_size: size,
        chunk_size: length,
        chunk_offset: offset,
        width,
        height,
        // Stands in for a level whose cache lookup succeeded; the writer only
        // keeps references of resolved levels
        storage: MipStorage::External {
            reference: CacheReference {
                cache_name: cache_name.to_string(),
                offset,
                length,
            },
            pixels: Some(Vec::new()),
        },
    }
}

/// Package holding one DXT1 texture and one plain export
pub fn texture_package(texture: TexturePayload, cache_name: &str) -> Package {
    let mut package = Package {
        header: PackageHeader {
            file_version: 610,
            licensee_version: 14,
            header_size: 0,
            folder_name: "None".to_string(),
            package_flags: 0,
            guid: [1; 16],
        },
        names: NameTable::new(),
        imports: vec![
            ImportEntry {
                class_package: "Core".to_string(),
                class_name: "Package".to_string(),
                outer_index: 0,
                object_name: "Engine".to_string(),
            },
            ImportEntry {
                class_package: "Core".to_string(),
                class_name: "Class".to_string(),
                outer_index: -1,
                object_name: "Texture2D".to_string(),
            },
        ],
        exports: vec![
            ExportEntry {
                class_index: -2,
                super_index: 0,
                outer_index: 0,
                object_name: "Rock_D".to_string(),
                object_flags: 0,
                serial_size: 0,
                serial_offset: 0,
                net_index: 0,
                properties: vec![
                    PropertyRecord::new("SizeX", INT_PROPERTY, PropertyValue::Int(8)),
                    PropertyRecord::new(
                        "Format",
                        BYTE_PROPERTY,
                        PropertyValue::Byte {
                            enum_name: "EPixelFormat".to_string(),
                            value: ByteValue::Name("PF_DXT1".to_string()),
                        },
                    ),
                    PropertyRecord::new(
                        "TextureFileCacheName",
                        NAME_PROPERTY,
                        PropertyValue::Name(cache_name.to_string()),
                    ),
                ],
                payload: ExportPayload::Texture(texture),
            },
            ExportEntry {
                class_index: 0,
                super_index: 0,
                outer_index: 0,
                object_name: "RockMaterial".to_string(),
                object_flags: 0,
                serial_size: 0,
                serial_offset: 0,
                net_index: 0,
                properties: Vec::new(),
                payload: ExportPayload::Raw(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            },
        ],
        path: None,
    };
    package.prepare_for_save();
    package
}
