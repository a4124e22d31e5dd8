//! Concrete batch jobs

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::package::{
    read_composite_entry, read_package, save_package, save_package_padded, CompositeEntry,
    ExportPayload, Package, PackageReadOptions,
};
use crate::progress::JobStatus;
use crate::texture::build_dds;

use super::orchestrator::Job;

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// A package read by a [`LoadJob`]
#[derive(Debug)]
pub struct LoadedPackage {
    pub path: PathBuf,
    pub package: Package,
}

/// Parse a package and send it over a channel
pub struct LoadJob {
    path: PathBuf,
    options: PackageReadOptions,
    sender: Sender<LoadedPackage>,
}

impl LoadJob {
    pub fn new(path: impl Into<PathBuf>, options: PackageReadOptions, sender: Sender<LoadedPackage>) -> Self {
        Self {
            path: path.into(),
            options,
            sender,
        }
    }
}

impl Job for LoadJob {
    fn name(&self) -> String {
        display_name(&self.path)
    }

    fn run(&mut self, status: &JobStatus) -> Result<()> {
        status.set_total(1);
        let package = read_package(&self.path, &self.options)?;
        debug!("Loaded {} ({} exports)", self.path.display(), package.exports.len());
        status.advance(1);

        let loaded = LoadedPackage {
            path: self.path.clone(),
            package,
        };
        if self.sender.send(loaded).is_err() {
            warn!("Receiver for {} is gone, package dropped", self.path.display());
        }
        Ok(())
    }
}

/// Dump every export of a package: DDS for textures, raw data otherwise
pub struct ExtractJob {
    path: PathBuf,
    output_dir: PathBuf,
    options: PackageReadOptions,
}

impl ExtractJob {
    pub fn new(path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, options: PackageReadOptions) -> Self {
        Self {
            path: path.into(),
            output_dir: output_dir.into(),
            options,
        }
    }
}

impl Job for ExtractJob {
    fn name(&self) -> String {
        display_name(&self.path)
    }

    fn run(&mut self, status: &JobStatus) -> Result<()> {
        let package = read_package(&self.path, &self.options)?;
        status.set_total(package.exports.len());
        let written = extract_package(&package, &self.output_dir, Some(status))?;
        info!("Extracted {written} files from {}", self.path.display());
        Ok(())
    }
}

/// Parse a package, fix its sizes and write it back out
pub struct RebuildJob {
    path: PathBuf,
    output_path: PathBuf,
    options: PackageReadOptions,
    padding: bool,
}

impl RebuildJob {
    pub fn new(path: impl Into<PathBuf>, output_path: impl Into<PathBuf>, options: PackageReadOptions) -> Self {
        Self {
            path: path.into(),
            output_path: output_path.into(),
            options,
            padding: false,
        }
    }

    /// Zero-pad the output to the size of the source file
    #[must_use]
    pub fn with_padding(mut self, padding: bool) -> Self {
        self.padding = padding;
        self
    }
}

impl Job for RebuildJob {
    fn name(&self) -> String {
        display_name(&self.path)
    }

    fn run(&mut self, status: &JobStatus) -> Result<()> {
        status.set_total(2);
        let mut package = read_package(&self.path, &self.options)?;
        status.advance(1);

        let fixed = package.prepare_for_save();
        if fixed > 0 {
            info!("{}: corrected {fixed} property sizes", self.path.display());
        }
        if self.padding {
            let original_size = fs::metadata(&self.path)?.len() as usize;
            save_package_padded(&package, &self.output_path, original_size)?;
        } else {
            save_package(&package, &self.output_path)?;
        }
        status.advance(1);
        Ok(())
    }
}

/// Extract every entry of one composite container
pub struct CompositeExtractJob {
    container_dir: PathBuf,
    container: String,
    entries: Vec<CompositeEntry>,
    output_dir: PathBuf,
    options: PackageReadOptions,
}

impl CompositeExtractJob {
    /// `entries` should all name `container`; see
    /// [`group_by_container`](crate::package::group_by_container).
    pub fn new(
        container_dir: impl Into<PathBuf>,
        container: impl Into<String>,
        entries: Vec<CompositeEntry>,
        output_dir: impl Into<PathBuf>,
        options: PackageReadOptions,
    ) -> Self {
        Self {
            container_dir: container_dir.into(),
            container: container.into(),
            entries,
            output_dir: output_dir.into(),
            options,
        }
    }
}

impl Job for CompositeExtractJob {
    fn name(&self) -> String {
        self.container.clone()
    }

    fn sub_item_count(&self) -> usize {
        self.entries.len()
    }

    fn run(&mut self, status: &JobStatus) -> Result<()> {
        status.set_total(self.entries.len());
        let mut failed = 0;

        for entry in &self.entries {
            let outcome = read_composite_entry(&self.container_dir, entry, &self.options).and_then(|package| {
                extract_package(&package, &self.output_dir.join(sanitize_file_name(&entry.uid)), None)
            });
            if let Err(e) = outcome {
                warn!("{}: entry '{}' failed: {e}", self.container, entry.uid);
                failed += 1;
            }
            status.advance(1);
            status.sub_item_done();
        }

        if failed > 0 {
            return Err(Error::CompositeEntriesFailed {
                container: self.container.clone(),
                failed,
                total: self.entries.len(),
            });
        }
        Ok(())
    }
}

/// Write each export of `package` into `output_dir`.
///
/// Textures become `.dds` files built around their largest decoded level;
/// other exports are dumped as `.bin`. Returns the number of files written.
fn extract_package(package: &Package, output_dir: &Path, status: Option<&JobStatus>) -> Result<usize> {
    fs::create_dir_all(output_dir)?;
    let mut used = HashSet::new();
    let mut written = 0;

    for export in &package.exports {
        let (extension, bytes) = match &export.payload {
            ExportPayload::Texture(texture) => match export.texture_format() {
                Some(format) => match build_dds(texture, format) {
                    Ok(dds) => ("dds", Some(dds)),
                    Err(e) => {
                        warn!("Texture '{}' not exported: {e}", export.object_name);
                        ("dds", None)
                    }
                },
                None => {
                    warn!("Texture '{}' has no supported pixel format", export.object_name);
                    ("dds", None)
                }
            },
            ExportPayload::Raw(raw) | ExportPayload::Opaque(raw) => ("bin", Some(raw.clone())),
        };

        if let Some(bytes) = bytes {
            let file_name = unique_file_name(&mut used, &export.object_name, extension);
            fs::write(output_dir.join(file_name), bytes)?;
            written += 1;
        }
        if let Some(status) = status {
            status.advance(1);
        }
    }

    Ok(written)
}

fn unique_file_name(used: &mut HashSet<String>, object_name: &str, extension: &str) -> String {
    let base = sanitize_file_name(object_name);
    let mut candidate = format!("{base}.{extension}");
    let mut n = 1;
    while !used.insert(candidate.to_ascii_lowercase()) {
        candidate = format!("{base}_{n}.{extension}");
        n += 1;
    }
    candidate
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let mut used = HashSet::new();
        assert_eq!(unique_file_name(&mut used, "Rock_D", "dds"), "Rock_D.dds");
        assert_eq!(unique_file_name(&mut used, "Rock_D", "dds"), "Rock_D_1.dds");
        assert_eq!(unique_file_name(&mut used, "a/b:c", "bin"), "a_b_c.bin");
        assert_eq!(sanitize_file_name(".."), "_");
    }
}
