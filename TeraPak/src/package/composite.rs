//! Sub-packages inside composite containers
//!
//! Map packages bundle many small packages into one container file. Each
//! entry is an `(offset, length)` range of that container and parses as a
//! package of its own. The index that lists entries is supplied by the
//! caller.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

use super::{parse_package_bytes, Package, PackageReadOptions};

/// One package inside a composite container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeEntry {
    /// Identifier of the sub-package
    pub uid: String,
    /// File name of the container, relative to the container directory
    pub container: String,
    pub offset: u64,
    pub length: u64,
}

impl CompositeEntry {
    #[must_use]
    pub fn new(uid: impl Into<String>, container: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            uid: uid.into(),
            container: container.into(),
            offset,
            length,
        }
    }
}

/// Read and parse one composite entry from a container in `dir`.
///
/// Cache files are looked up beside the container.
///
/// # Errors
/// Returns [`Error::CompositeContainerNotFound`] if the container is missing,
/// [`Error::CompositeRangeOutOfBounds`] if the range exceeds it, or a parse
/// error.
pub fn read_composite_entry(dir: &Path, entry: &CompositeEntry, options: &PackageReadOptions) -> Result<Package> {
    let path = dir.join(&entry.container);
    if !path.is_file() {
        return Err(Error::CompositeContainerNotFound { path });
    }

    let mut file = File::open(&path)?;
    let container_len = file.metadata()?.len();
    let out_of_bounds = entry
        .offset
        .checked_add(entry.length)
        .is_none_or(|end| end > container_len);
    if out_of_bounds {
        return Err(Error::CompositeRangeOutOfBounds {
            uid: entry.uid.clone(),
            offset: entry.offset,
            length: entry.length,
            container_len,
        });
    }

    debug!(
        "Reading '{}' from {} ({} bytes at {})",
        entry.uid,
        path.display(),
        entry.length,
        entry.offset
    );

    file.seek(SeekFrom::Start(entry.offset))?;
    let mut bytes = vec![0u8; entry.length as usize];
    file.read_exact(&mut bytes)?;

    let mut package = parse_package_bytes(&bytes, path.parent(), options)?;
    package.path = Some(path);
    Ok(package)
}

/// Group entries by container, each group ordered by offset
#[must_use]
pub fn group_by_container(entries: Vec<CompositeEntry>) -> BTreeMap<String, Vec<CompositeEntry>> {
    let mut groups: BTreeMap<String, Vec<CompositeEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.container.clone()).or_default().push(entry);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|e| e.offset);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::sample_package;
    use crate::package::write_package;
    use std::io::Write;

    #[test]
    fn test_read_entries_from_container() {
        let temp = tempfile::tempdir().unwrap();
        let sub = write_package(&sample_package()).unwrap();

        let mut file = File::create(temp.path().join("Zone_01.gmp")).unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        file.write_all(&sub).unwrap();
        file.write_all(&sub).unwrap();
        drop(file);

        let options = PackageReadOptions::new();
        for offset in [100, 100 + sub.len() as u64] {
            let entry = CompositeEntry::new("Rock", "Zone_01.gmp", offset, sub.len() as u64);
            let package = read_composite_entry(temp.path(), &entry, &options).unwrap();
            assert_eq!(package.exports.len(), 2);
        }
    }

    #[test]
    fn test_missing_container() {
        let temp = tempfile::tempdir().unwrap();
        let entry = CompositeEntry::new("Rock", "Nope.gmp", 0, 10);
        assert!(matches!(
            read_composite_entry(temp.path(), &entry, &PackageReadOptions::new()),
            Err(Error::CompositeContainerNotFound { .. })
        ));
    }

    #[test]
    fn test_range_past_end() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("Small.gmp"), [0u8; 50]).unwrap();
        let entry = CompositeEntry::new("Rock", "Small.gmp", 40, 20);
        assert!(matches!(
            read_composite_entry(temp.path(), &entry, &PackageReadOptions::new()),
            Err(Error::CompositeRangeOutOfBounds { container_len: 50, .. })
        ));
    }

    #[test]
    fn test_grouping_orders_by_offset() {
        let groups = group_by_container(vec![
            CompositeEntry::new("b", "B.gmp", 50, 1),
            CompositeEntry::new("a2", "A.gmp", 90, 1),
            CompositeEntry::new("a1", "A.gmp", 10, 1),
        ]);
        let a: Vec<&str> = groups["A.gmp"].iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(a, vec!["a1", "a2"]);
        assert_eq!(groups.len(), 2);
    }
}
