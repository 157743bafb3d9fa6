//! Change-set summaries of captured trees

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// What a change-capture tree says happened, relative to its root.
///
/// Paths below a deleted-and-recreated folder are reported under the real
/// folder name. Bookkeeping in the meta folder only contributes deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files, symlinks and empty folders that were created or modified.
    pub changed: BTreeSet<PathBuf>,
    /// Paths recorded as deleted.
    pub deleted: BTreeSet<PathBuf>,
}

impl ChangeSet {
    /// Scan `dir` using the default meta folder name.
    pub fn scan(dir: &Path, marker: &str) -> Result<Self> {
        Self::scan_with_meta(dir, marker, crate::defaults::META_FILES_LOCATION)
    }

    pub fn scan_with_meta(dir: &Path, marker: &str, meta_folder: &str) -> Result<Self> {
        let mut set = ChangeSet::default();
        if !dir.exists() {
            return Ok(set);
        }

        for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| Error::Filesystem {
                operation: "walk".to_string(),
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };

            let (relative, in_meta) = match relative.strip_prefix(meta_folder) {
                Ok(inner) if !meta_folder.is_empty() => (inner, true),
                _ => (relative, false),
            };
            if relative.as_os_str().is_empty() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if !marker.is_empty() && name.ends_with(marker) && name.len() > marker.len() {
                set.deleted.insert(strip_markers(relative, marker, true));
                continue;
            }
            if in_meta {
                continue;
            }
            let file_type = entry.file_type();
            if !file_type.is_dir() || is_empty_dir(entry.path())? {
                set.changed.insert(strip_markers(relative, marker, false));
            }
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changed.len() + self.deleted.len()
    }
}

/// Map marked folder components back to their real names.
fn strip_markers(relative: &Path, marker: &str, include_last: bool) -> PathBuf {
    let count = relative.components().count();
    relative
        .components()
        .enumerate()
        .map(|(i, component)| match component {
            Component::Normal(part) if include_last || i + 1 < count => {
                let text = part.to_string_lossy();
                match text.strip_suffix(marker) {
                    Some(real) if !real.is_empty() => PathBuf::from(real),
                    _ => PathBuf::from(part),
                }
            }
            other => PathBuf::from(other.as_os_str()),
        })
        .collect()
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).map_err(|e| Error::Filesystem {
        operation: "read directory".to_string(),
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(entries.next().is_none())
}
