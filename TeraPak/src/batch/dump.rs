//! Header dump: import and export tables of many packages in one text file
//!
//! ```text
//! TeraPak package dump
//! ### S1Game/CookedPC/Rock.gpk ###
//! Rock.gpk;import;Core.Package;Engine
//! Rock.gpk;export;Texture2D;Rock_D;120;400
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use tracing::info;

use crate::error::Result;
use crate::package::PackageReadOptions;

use super::jobs::{LoadJob, LoadedPackage};
use super::orchestrator::{BatchOrchestrator, BatchReport, Job};

/// First line of every dump
pub const DUMP_TITLE: &str = "TeraPak package dump";

/// Write the table dump of already loaded packages, in the order given.
///
/// # Errors
/// Returns an error if writing fails.
pub fn write_header_dump<W: Write>(writer: &mut W, packages: &[LoadedPackage]) -> Result<()> {
    writeln!(writer, "{DUMP_TITLE}")?;
    for loaded in packages {
        let file_name = loaded
            .path
            .file_name()
            .map_or_else(|| loaded.path.display().to_string(), |n| n.to_string_lossy().into_owned());

        writeln!(writer, "### {} ###", loaded.path.display())?;
        for import in &loaded.package.imports {
            writeln!(writer, "{file_name};{}", import.to_compact_string())?;
        }
        for export in &loaded.package.exports {
            writeln!(writer, "{file_name};{}", loaded.package.export_compact_string(export))?;
        }
    }
    Ok(())
}

/// Load `files` on the orchestrator's pool and dump their tables to `out_file`.
///
/// Packages appear sorted by path. A package that fails to load is left out
/// of the dump and reported as failed in the returned report.
///
/// # Errors
/// Returns an error if the jobs cannot be submitted or the dump cannot be written.
pub fn dump_headers(
    orchestrator: &BatchOrchestrator,
    files: &[PathBuf],
    options: &PackageReadOptions,
    out_file: &Path,
) -> Result<BatchReport> {
    let (sender, receiver) = mpsc::channel();
    let jobs: Vec<Box<dyn Job>> = files
        .iter()
        .map(|path| Box::new(LoadJob::new(path.clone(), options.clone(), sender.clone())) as Box<dyn Job>)
        .collect();
    drop(sender);

    let report = orchestrator.submit(jobs)?.wait();
    let mut loaded: Vec<LoadedPackage> = receiver.iter().collect();
    loaded.sort_by(|a, b| a.path.cmp(&b.path));

    if let Some(parent) = out_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(out_file)?);
    write_header_dump(&mut writer, &loaded)?;
    writer.flush()?;

    info!(
        "Dumped {} of {} packages to {}",
        loaded.len(),
        files.len(),
        out_file.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::sample_package;

    #[test]
    fn test_dump_layout() {
        let loaded = vec![LoadedPackage {
            path: PathBuf::from("CookedPC").join("Env.gpk"),
            package: sample_package(),
        }];
        let mut out = Vec::new();
        write_header_dump(&mut out, &loaded).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], DUMP_TITLE);
        assert!(lines[1].starts_with("### ") && lines[1].ends_with("Env.gpk ###"));
        assert_eq!(lines[2], "Env.gpk;import;Core.Package;Engine");
        assert_eq!(lines[3], "Env.gpk;import;Core.Class;Texture2D");
        assert_eq!(lines[4], "Env.gpk;export;Class;Env;0;0");
        assert!(lines[5].starts_with("Env.gpk;export;Texture2D;Env.Rock_D;"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_empty_dump_has_title() {
        let mut out = Vec::new();
        write_header_dump(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{DUMP_TITLE}\n"));
    }
}
