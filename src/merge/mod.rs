//! Change-set merge engine
//!
//! This module reconciles change-sets captured by sandboxed steps. A
//! change-set is an ordinary directory tree in which a path carrying the
//! deletion marker (default `_HIDDEN~`) records that the real path was
//! deleted in that layer. Union mounts additionally keep such markers in a
//! meta folder (default `.unionfs-fuse`) that mirrors the real tree.
//!
//! ## Rules
//!
//! - Incoming real paths collide with an existing real path or with its
//!   deletion marker; incoming markers collide with the real path.
//! - With `block_overwrite` any collision fails the call with
//!   [`Error::OverwriteBlocked`]; otherwise the existing counterpart is removed
//!   and the incoming path wins.
//! - Directories merge into existing directories without colliding.
//! - `copy_mode` hard-links (or copies) files and leaves the source in place;
//!   otherwise files are renamed and the consumed source tree is removed.
//! - `dry_run` performs every check against a virtual view of the target and
//!   changes nothing on disk.
//!
//! ## Example
//!
//! ```no_run
//! use isorun::merge::{merge_folders, MergeEntity, MergeOptions};
//! use std::path::Path;
//!
//! let options = MergeOptions {
//!     block_overwrite: true,
//!     ..Default::default()
//! };
//! merge_folders(
//!     &[MergeEntity::new("/tmp/changes-a"), MergeEntity::new("/tmp/changes-b")],
//!     Path::new("/tmp/merged"),
//!     &options,
//! )?;
//! # Ok::<(), isorun::error::Error>(())
//! ```

mod cleanup;
mod engine;
mod entries;
mod options;

use std::path::Path;

use log::{debug, info};

pub use cleanup::{apply_deletions, remove_empty_folders, remove_marked_as_deleted_paths};
pub(crate) use engine::{create_dirs, remove_path};
pub use options::{MergeEntity, MergeOptions};

use crate::error::{Error, Result};
use engine::TargetView;

/// Merge every entity's source tree into `target` under `options`.
///
/// Entities are merged in order, so with overwriting allowed a later entity
/// wins over an earlier one. The target is created unless this is a dry run.
pub fn merge_folders(entities: &[MergeEntity], target: &Path, options: &MergeOptions) -> Result<()> {
    if !options.dry_run {
        create_dirs(target, options.folder_permission)?;
    }

    let mut view = TargetView::new(target, options.dry_run);
    for entity in entities {
        merge_entity(entity, &mut view, options).map_err(|inner| Error::Merge {
            source_folder: entity.source.clone(),
            target_folder: target.to_path_buf(),
            inner: Box::new(inner),
        })?;
    }

    if options.dry_run {
        return Ok(());
    }
    if options.delete_marked_as_deleted_paths {
        remove_marked_as_deleted_paths(target, options)?;
    }
    if options.delete_empty_folders {
        remove_empty_folders(target)?;
    }
    Ok(())
}

/// Report whether [`merge_folders`] would succeed without overwrite conflicts.
///
/// Runs a dry run on a private copy of `options`; the caller's value is
/// left untouched. Failures other than conflicts are returned as errors.
pub fn are_mergeable(entities: &[MergeEntity], target: &Path, options: &MergeOptions) -> Result<bool> {
    let mut check = options.clone();
    check.dry_run = true;
    check.delete_empty_folders = false;
    check.delete_marked_as_deleted_paths = false;

    match merge_folders(entities, target, &check) {
        Ok(()) => Ok(true),
        Err(e) if e.is_overwrite_blocked() => {
            info!("Merge into '{}' is blocked: {}", target.display(), e.root_cause());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn merge_entity(entity: &MergeEntity, view: &mut TargetView<'_>, options: &MergeOptions) -> Result<()> {
    let filter = options.filter_for(entity);
    let collected = entries::collect(&entity.source, options, &filter)?;
    debug!(
        "Merging {} entries from '{}' into '{}'",
        collected.len(),
        entity.source.display(),
        view.root().display()
    );
    engine::apply(&collected, view, options)?;

    if !options.dry_run && !options.copy_mode && entity.source.exists() {
        if view.root().starts_with(&entity.source) {
            debug!(
                "Keeping '{}' because it contains the merge target",
                entity.source.display()
            );
        } else {
            remove_path(&entity.source)?;
        }
    }
    Ok(())
}
