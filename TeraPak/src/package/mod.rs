//! Package files (`.gpk`, `.gmp`, `.upk`)
//!
//! A package holds a name table, an import table and an export table
//! followed by the serialized export data. All integers are little-endian.
//!
//! ```text
//! [tag u32][file version u16][licensee u16][header size i32][folder string]
//! [package flags u32][names count/offset][exports count/offset]
//! [imports count/offset][guid 16]
//! [name table][import table][export table][export data ...]
//! ```

mod composite;
mod names;
mod reader;
mod writer;

use std::path::{Path, PathBuf};

use crate::cache::CacheResolver;
use crate::config::EngineConfig;
use crate::property::{find_property, PropertyRecord};
use crate::texture::{TextureFormat, TexturePayload, CACHE_NAME_PROPERTY, FORMAT_PROPERTY};

pub use composite::{group_by_container, read_composite_entry, CompositeEntry};
pub use names::{fstring_size, read_fstring, write_fstring, NameEntry, NameTable, NONE_NAME};
pub use reader::{parse_package_bytes, read_package};
pub use writer::{save_package, save_package_padded, write_package, write_package_padded};

/// Tag at the start of every package
pub const PACKAGE_TAG: u32 = 0x9E2A83C1;

/// File extensions recognised as packages
pub const PACKAGE_EXTENSIONS: [&str; 3] = ["gpk", "gmp", "upk"];

/// Class name of texture exports
pub const TEXTURE2D_CLASS: &str = "Texture2D";

/// Size of one import table entry
pub(crate) const IMPORT_ENTRY_SIZE: usize = 28;

/// Size of one export table entry
pub(crate) const EXPORT_ENTRY_SIZE: usize = 36;

/// Fixed header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    pub file_version: u16,
    pub licensee_version: u16,
    /// Size of header and tables as stored
    pub header_size: i32,
    pub folder_name: String,
    pub package_flags: u32,
    pub guid: [u8; 16],
}

/// A class or object pulled in from another package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub class_package: String,
    pub class_name: String,
    pub outer_index: i32,
    pub object_name: String,
}

impl ImportEntry {
    /// One-line summary: `import;{class package}.{class name};{object name}`
    #[must_use]
    pub fn to_compact_string(&self) -> String {
        format!("import;{}.{};{}", self.class_package, self.class_name, self.object_name)
    }
}

/// Serialized body of an export after its properties
#[derive(Debug, Clone, PartialEq)]
pub enum ExportPayload {
    Texture(TexturePayload),
    Raw(Vec<u8>),
    /// Whole serial data kept verbatim because its properties did not parse
    Opaque(Vec<u8>),
}

/// An object defined in this package
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    /// Negative: import, positive: export, zero: `Class`
    pub class_index: i32,
    pub super_index: i32,
    pub outer_index: i32,
    pub object_name: String,
    pub object_flags: u64,
    /// Serial size as stored in the file
    pub serial_size: i32,
    /// Serial offset as stored in the file
    pub serial_offset: i32,
    pub net_index: i32,
    pub properties: Vec<PropertyRecord>,
    pub payload: ExportPayload,
}

impl ExportEntry {
    #[must_use]
    pub fn texture(&self) -> Option<&TexturePayload> {
        match &self.payload {
            ExportPayload::Texture(texture) => Some(texture),
            ExportPayload::Raw(_) | ExportPayload::Opaque(_) => None,
        }
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyRecord> {
        find_property(&self.properties, name)
    }

    /// Cache file name from `TextureFileCacheName`
    #[must_use]
    pub fn cache_name(&self) -> Option<&str> {
        self.property(CACHE_NAME_PROPERTY).and_then(PropertyRecord::as_str)
    }

    /// Pixel format from the `Format` property
    #[must_use]
    pub fn texture_format(&self) -> Option<TextureFormat> {
        self.property(FORMAT_PROPERTY)
            .and_then(PropertyRecord::as_str)
            .and_then(TextureFormat::from_name)
    }
}

/// Options for reading packages
#[derive(Debug, Clone, Default)]
pub struct PackageReadOptions {
    pub resolver: CacheResolver,
    /// Drop compressed chunk bodies after decoding
    pub low_memory: bool,
    /// Directory searched for cache files; defaults to the package's own
    pub cache_dir: Option<PathBuf>,
}

impl PackageReadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            resolver: CacheResolver::new().with_extension(config.cache_extension.clone()),
            low_memory: config.low_memory,
            cache_dir: None,
        }
    }

    #[must_use]
    pub fn with_low_memory(mut self, low_memory: bool) -> Self {
        self.low_memory = low_memory;
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

/// A parsed package
#[derive(Debug, Clone)]
pub struct Package {
    pub header: PackageHeader,
    pub names: NameTable,
    pub imports: Vec<ImportEntry>,
    pub exports: Vec<ExportEntry>,
    /// Where the package was read from, if anywhere
    pub path: Option<PathBuf>,
}

impl Package {
    /// Display name: file stem or folder name
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map_or_else(|| self.header.folder_name.clone(), |s| s.to_string_lossy().into_owned())
    }

    /// Class name of an export, following the import/export reference
    #[must_use]
    pub fn class_name(&self, export: &ExportEntry) -> &str {
        self.object_name(export.class_index).unwrap_or("Class")
    }

    /// Name of the object an index refers to; `None` for zero or out of range
    #[must_use]
    pub fn object_name(&self, index: i32) -> Option<&str> {
        match index {
            0 => None,
            i if i < 0 => self
                .imports
                .get((-(i64::from(i)) - 1) as usize)
                .map(|imp| imp.object_name.as_str()),
            i => self.exports.get(i as usize - 1).map(|exp| exp.object_name.as_str()),
        }
    }

    /// `Outer.Object` path of an export
    #[must_use]
    pub fn object_path(&self, export: &ExportEntry) -> String {
        let mut parts = vec![export.object_name.as_str()];
        let mut outer = export.outer_index;
        // Bounded to the table size so a reference cycle cannot loop forever
        for _ in 0..self.exports.len() + self.imports.len() {
            let Some(name) = self.object_name(outer) else { break };
            parts.push(name);
            outer = if outer > 0 {
                self.exports[outer as usize - 1].outer_index
            } else {
                self.imports[(-(i64::from(outer)) - 1) as usize].outer_index
            };
        }
        parts.reverse();
        parts.join(".")
    }

    /// One-line summary of an export: `export;{class};{object path};{serial size};{serial offset}`
    #[must_use]
    pub fn export_compact_string(&self, export: &ExportEntry) -> String {
        format!(
            "export;{};{};{};{}",
            self.class_name(export),
            self.object_path(export),
            export.serial_size,
            export.serial_offset
        )
    }

    /// Exports whose class is `Texture2D`
    pub fn textures(&self) -> impl Iterator<Item = &ExportEntry> {
        self.exports
            .iter()
            .filter(|e| self.class_name(e) == TEXTURE2D_CLASS)
    }

    /// Make every property size and name reference valid for writing.
    ///
    /// Returns how many property sizes changed.
    pub fn prepare_for_save(&mut self) -> usize {
        let mut changed = 0;
        let mut needed: Vec<String> = vec![NONE_NAME.to_string()];

        for import in &self.imports {
            needed.push(import.class_package.clone());
            needed.push(import.class_name.clone());
            needed.push(import.object_name.clone());
        }
        for export in &mut self.exports {
            needed.push(export.object_name.clone());
            for property in &mut export.properties {
                let size = crate::property::recalculate_size(property);
                if size != property.declared_size {
                    property.declared_size = size;
                    changed += 1;
                }
                needed.extend(property.referenced_names().into_iter().map(str::to_string));
            }
        }

        for name in &needed {
            self.names.intern(name);
        }
        changed
    }
}
