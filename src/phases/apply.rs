//! Applying a final change-set to the real root
//!
//! This is the only phase that writes outside the run's own locations. The
//! change-set is moved into the root with overwriting allowed, then each
//! recorded deletion is made permanent. Only the markers the change-set
//! carried are visited, never the whole root.

use std::path::Path;

use log::info;

use crate::error::Result;
use crate::filesystem::ChangeSet;
use crate::merge::{apply_deletions, merge_folders, MergeEntity, MergeOptions};

/// Options used when applying: move mode with overwriting allowed.
pub fn default_options() -> MergeOptions {
    MergeOptions::default()
}

/// Merge `final_changes` into `root` and carry out its deletions.
///
/// With `options.dry_run` only the conflict checks run. Returns the change
/// summary of what was applied.
pub fn execute(final_changes: &Path, root: &Path, options: &MergeOptions) -> Result<ChangeSet> {
    let changes = ChangeSet::scan_with_meta(
        final_changes,
        &options.deleted_marker,
        &options.meta_files_location,
    )?;
    info!(
        "Applying {} change(s) and {} deletion(s) to '{}'",
        changes.changed.len(),
        changes.deleted.len(),
        root.display()
    );

    let mut merge_options = options.clone();
    merge_options.delete_marked_as_deleted_paths = false;
    merge_folders(&[MergeEntity::new(final_changes)], root, &merge_options)?;

    if !options.dry_run {
        let deleted: Vec<_> = changes.deleted.iter().cloned().collect();
        apply_deletions(root, &deleted, options)?;
    }
    Ok(changes)
}
