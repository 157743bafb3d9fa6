//! Collecting the entries a source tree contributes to a merge
//!
//! A source tree is read once into a flat list of [`Entry`] values before
//! anything is moved. Each entry knows where it lives on disk and where it
//! lands relative to the target, which lets the meta folder be flattened
//! without rewriting the source tree and keeps dry runs free of side effects.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::trace;
use walkdir::WalkDir;

use super::options::MergeOptions;
use crate::error::{Error, Result};
use crate::path::{to_location, PathFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Dir,
    Symlink,
}

impl EntryKind {
    pub(crate) fn from_file_type(file_type: std::fs::FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    /// Position relative to the target root
    pub relative: PathBuf,
    /// Absolute location on disk
    pub source: PathBuf,
    pub kind: EntryKind,
    pub from_meta: bool,
}

/// Read the entries `source_root` contributes under `options` and `filter`.
///
/// The result is ordered so every directory precedes its contents. A missing
/// source contributes nothing.
pub(crate) fn collect(
    source_root: &Path,
    options: &MergeOptions,
    filter: &PathFilter,
) -> Result<Vec<Entry>> {
    if !source_root.exists() {
        trace!("Source '{}' does not exist, nothing to merge", source_root.display());
        return Ok(Vec::new());
    }

    let meta_root = source_root.join(&options.meta_files_location);
    let mut layer: BTreeMap<PathBuf, Entry> = BTreeMap::new();

    for entry in scan(source_root, options.merge_meta_files_folder.then_some(&meta_root))? {
        layer.insert(entry.relative.clone(), entry);
    }

    if options.merge_meta_files_folder && meta_root.is_dir() {
        for mut entry in scan(&meta_root, None)? {
            entry.from_meta = true;
            match layer.get(&entry.relative) {
                Some(existing) if existing.kind == EntryKind::Dir && entry.kind == EntryKind::Dir => {}
                Some(existing) if options.block_overwrite => {
                    return Err(Error::OverwriteBlocked {
                        source_path: entry.source,
                        conflicting_path: existing.source.clone(),
                    });
                }
                _ => {
                    layer.insert(entry.relative.clone(), entry);
                }
            }
        }
    }

    let layer = sanitize(layer, options)?;

    let mut entries = Vec::with_capacity(layer.len());
    for entry in layer.into_values() {
        let location = to_location(&entry.relative);
        if filter.should_skip(&location, &options.deleted_marker) {
            trace!("Skipping '{}' due to being excluded or not included", location);
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn scan(root: &Path, skip: Option<&PathBuf>) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| skip.map(|s| e.path() != s.as_path()).unwrap_or(true));

    for dir_entry in walker {
        let dir_entry = dir_entry.map_err(|e| walk_error(root, e))?;
        let relative = dir_entry
            .path()
            .strip_prefix(root)
            .map_err(|_| Error::InvariantViolation {
                message: format!(
                    "walked path '{}' is outside of '{}'",
                    dir_entry.path().display(),
                    root.display()
                ),
            })?
            .to_path_buf();
        entries.push(Entry {
            relative,
            source: dir_entry.path().to_path_buf(),
            kind: EntryKind::from_file_type(dir_entry.file_type()),
            from_meta: false,
        });
    }
    Ok(entries)
}

/// Resolve tombstones that coexist with their real counterpart in one layer.
///
/// A recreated file supersedes its own tombstone. A directory that was
/// deleted and recreated becomes an opaque directory: its contents move under
/// the tombstone name so applying the deletion later replaces the old tree.
fn sanitize(
    mut layer: BTreeMap<PathBuf, Entry>,
    options: &MergeOptions,
) -> Result<BTreeMap<PathBuf, Entry>> {
    let tombstones: Vec<PathBuf> = layer
        .keys()
        .filter(|rel| options.real_of(rel).is_some())
        .cloned()
        .collect();

    for tombstone in tombstones {
        let Some(real) = options.real_of(&tombstone) else {
            continue;
        };
        let Some(real_entry) = layer.get(&real).cloned() else {
            continue;
        };
        let Some(tomb_entry) = layer.get(&tombstone).cloned() else {
            continue;
        };

        if tomb_entry.kind == EntryKind::Dir && has_descendants(&layer, &tombstone) {
            return Err(Error::InvariantViolation {
                message: format!(
                    "deleted folder '{}' is not empty while '{}' exists",
                    tomb_entry.source.display(),
                    real_entry.source.display()
                ),
            });
        }

        if real_entry.kind != EntryKind::Dir {
            trace!("'{}' was recreated, dropping its deletion marker", real.display());
            layer.remove(&tombstone);
            continue;
        }

        if options.block_overwrite {
            return Err(Error::OverwriteBlocked {
                source_path: tomb_entry.source,
                conflicting_path: real_entry.source,
            });
        }

        trace!("'{}' was deleted and recreated, marking it opaque", real.display());
        layer.remove(&tombstone);
        let moved: Vec<PathBuf> = layer
            .range(real.clone()..)
            .take_while(|(rel, _)| rel.starts_with(&real))
            .map(|(rel, _)| rel.clone())
            .collect();
        for rel in moved {
            if let Some(mut entry) = layer.remove(&rel) {
                let suffix = rel.strip_prefix(&real).unwrap_or(Path::new(""));
                entry.relative = if suffix.as_os_str().is_empty() {
                    tombstone.clone()
                } else {
                    tombstone.join(suffix)
                };
                layer.insert(entry.relative.clone(), entry);
            }
        }
    }

    Ok(layer)
}

fn has_descendants(layer: &BTreeMap<PathBuf, Entry>, dir: &Path) -> bool {
    layer
        .range(dir.to_path_buf()..)
        .skip(1)
        .take_while(|(rel, _)| rel.starts_with(dir))
        .next()
        .is_some()
}

pub(crate) fn walk_error(root: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(root).to_path_buf();
    match err.into_io_error() {
        Some(source) => Error::Filesystem {
            operation: "walk".to_string(),
            path,
            source,
        },
        None => Error::InvariantViolation {
            message: format!("filesystem loop detected under '{}'", path.display()),
        },
    }
}
