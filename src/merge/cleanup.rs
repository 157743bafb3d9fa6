//! Post-merge passes over the target tree

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::engine::remove_path;
use super::entries::walk_error;
use super::options::MergeOptions;
use crate::error::{fs_error, Result};
use crate::path::depth;

/// Make every recorded deletion under `target` permanent.
///
/// A deleted file removes its real counterpart and then itself. A deleted
/// folder that carries contents replaces its real counterpart. Deeper
/// markers are resolved before shallower ones.
pub fn remove_marked_as_deleted_paths(target: &Path, options: &MergeOptions) -> Result<()> {
    if !target.exists() {
        return Ok(());
    }

    let mut deleted = Vec::new();
    for entry in WalkDir::new(target).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(target, e))?;
        let name = entry.file_name().to_string_lossy();
        if !options.is_marked_as_deleted(&name) || name.len() <= options.deleted_marker.len() {
            continue;
        }
        let relative = entry.path().strip_prefix(target).unwrap_or(entry.path());
        if let Some(real) = options.real_of(relative) {
            deleted.push(real);
        }
    }
    apply_deletions(target, &deleted, options)
}

/// Resolve the markers of the given deleted paths, relative to `target`.
///
/// Only these markers are visited, so callers that already know the
/// deletions avoid walking a large target.
pub fn apply_deletions(target: &Path, deleted: &[PathBuf], options: &MergeOptions) -> Result<()> {
    let mut ordered: Vec<&PathBuf> = deleted.iter().collect();
    ordered.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| a.cmp(b)));
    ordered.dedup();

    for relative in ordered {
        let real = target.join(relative);
        let tombstone = target.join(options.tombstone_of(relative));
        let tombstone_is_dir = match fs::symlink_metadata(&tombstone) {
            Ok(metadata) => metadata.is_dir(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No marker left for '{}'", real.display());
                continue;
            }
            Err(e) => return Err(fs_error("inspect", &tombstone)(e)),
        };

        debug!("Applying deletion of '{}'", real.display());
        remove_path(&real)?;
        if tombstone_is_dir && has_children(&tombstone)? {
            fs::rename(&tombstone, &real).map_err(fs_error("rename", &tombstone))?;
        } else {
            remove_path(&tombstone)?;
        }
    }
    Ok(())
}

/// Remove every empty directory below `target`, never `target` itself.
pub fn remove_empty_folders(target: &Path) -> Result<()> {
    if !target.exists() {
        return Ok(());
    }

    for entry in WalkDir::new(target)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
    {
        let entry = entry.map_err(|e| walk_error(target, e))?;
        if entry.file_type().is_dir() && !has_children(entry.path())? {
            debug!("Removing empty folder '{}'", entry.path().display());
            fs::remove_dir(entry.path()).map_err(fs_error("remove directory", entry.path()))?;
        }
    }
    Ok(())
}

fn has_children(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).map_err(fs_error("read directory", dir))?;
    Ok(entries.next().is_some())
}
