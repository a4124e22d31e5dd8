//! Batch package operations
//!
//! This module runs load, extract and rebuild jobs over many packages in
//! parallel, dumps their tables, and discovers package files on disk.

mod dump;
mod jobs;
mod orchestrator;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;
use crate::package::PACKAGE_EXTENSIONS;

pub use dump::{dump_headers, write_header_dump, DUMP_TITLE};
pub use jobs::{CompositeExtractJob, ExtractJob, LoadJob, LoadedPackage, RebuildJob};
pub use orchestrator::{
    AggregateHandle, BatchOptions, BatchOrchestrator, BatchReport, FnJob, Job, JobReport,
};

/// Find all package files (`.gpk`, `.gmp`, `.upk`) in a directory recursively
///
/// # Returns
/// A sorted list of paths to package files found in the directory tree.
///
/// # Errors
/// Returns [`Error::WalkDirError`](crate::Error::WalkDirError) if the
/// directory or one of its entries cannot be read.
pub fn find_package_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        let is_package = entry.path().is_file()
            && entry.path().extension().is_some_and(|ext| {
                PACKAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_package {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_package_files() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("S1Game").join("CookedPC");
        std::fs::create_dir_all(&nested).unwrap();
        for name in ["b.gpk", "a.GMP", "c.upk", "cache.tfc", "notes.txt"] {
            std::fs::write(nested.join(name), b"x").unwrap();
        }
        std::fs::write(temp.path().join("top.gpk"), b"x").unwrap();

        let found: Vec<String> = find_package_files(temp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(found, vec!["a.GMP", "b.gpk", "c.upk", "top.gpk"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_package_files(temp.path().join("NoSuchDir")),
            Err(crate::Error::WalkDirError(_))
        ));
    }
}
