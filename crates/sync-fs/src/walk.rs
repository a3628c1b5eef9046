//! Repository tree walk
//!
//! Every regular file below the registry root is a candidate definition.
//! Entries are produced in a deterministic order (file names sorted per
//! directory) so scans and therefore runs are reproducible.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::{Error, Result, location_of};

/// A regular file found below the registry root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Registry location (`/project/orders.table`)
    pub location: String,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Walk the registry root and collect every regular file below it.
///
/// Hidden entries (names starting with `.`) are skipped, which keeps the
/// engine's own state directory out of the scan. Entries that cannot be
/// read are logged and skipped; they never abort the walk.
///
/// # Errors
///
/// Returns [`Error::RootUnreachable`] if `root` does not exist or is not a
/// directory.
pub fn walk_files(root: &Path) -> Result<Vec<WalkedFile>> {
    if !root.is_dir() {
        return Err(Error::RootUnreachable {
            path: root.to_path_buf(),
        });
    }
    let root = dunce::canonicalize(root).map_err(|e| Error::io(root, e))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable registry entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let location = location_of(&root, &path)?;
        files.push(WalkedFile { path, location });
    }

    tracing::trace!(root = %root.display(), count = files.len(), "Registry walk done");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn walk_is_sorted_and_skips_hidden_entries() {
        let td = TempDir::new().unwrap();
        fs::create_dir_all(td.path().join("project")).unwrap();
        fs::create_dir_all(td.path().join(".artefacts")).unwrap();
        fs::write(td.path().join("project/views.view"), "{}").unwrap();
        fs::write(td.path().join("project/accounts.table"), "{}").unwrap();
        fs::write(td.path().join(".artefacts/definitions.toml"), "").unwrap();
        fs::write(td.path().join("project/.swap"), "").unwrap();

        let files = walk_files(td.path()).unwrap();
        let locations: Vec<_> = files.iter().map(|f| f.location.as_str()).collect();

        assert_eq!(
            locations,
            vec!["/project/accounts.table", "/project/views.view"]
        );
    }

    #[test]
    fn missing_root_is_unreachable() {
        let td = TempDir::new().unwrap();
        let missing = td.path().join("nope");
        assert!(matches!(
            walk_files(&missing),
            Err(Error::RootUnreachable { .. })
        ));
    }
}
