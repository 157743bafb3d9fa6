//! Applying collected entries onto a target tree

use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::{Path, PathBuf};

use log::{debug, trace};

use super::entries::{Entry, EntryKind};
use super::options::MergeOptions;
use crate::error::{fs_error, Error, Result};

/// What currently occupies a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Presence {
    pub kind: EntryKind,
    /// Device and inode, when known
    pub identity: Option<(u64, u64)>,
    /// Directory created during this merge on top of nothing
    pub fresh: bool,
}

/// The target as the merge sees it.
///
/// A real run reads the disk directly. A dry run layers the placements and
/// removals it would have made over the on-disk state, so later entries see
/// the same conflicts they would see in a real run.
pub(crate) struct TargetView<'a> {
    root: &'a Path,
    dry_run: bool,
    overlay: HashMap<PathBuf, Option<Presence>>,
}

impl<'a> TargetView<'a> {
    pub(crate) fn new(root: &'a Path, dry_run: bool) -> Self {
        Self {
            root,
            dry_run,
            overlay: HashMap::new(),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.root
    }

    fn lookup(&self, relative: &Path) -> Result<Option<Presence>> {
        if self.dry_run {
            if let Some(state) = self.overlay.get(relative) {
                return Ok(*state);
            }
            for ancestor in relative.ancestors().skip(1) {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                match self.overlay.get(ancestor) {
                    None => continue,
                    Some(None) => return Ok(None),
                    Some(Some(p)) if p.kind != EntryKind::Dir || p.fresh => return Ok(None),
                    Some(Some(_)) => break,
                }
            }
        }
        disk_presence(&self.root.join(relative))
    }

    fn remove(&mut self, relative: &Path) -> Result<()> {
        if self.dry_run {
            self.overlay.insert(relative.to_path_buf(), None);
            return Ok(());
        }
        remove_path(&self.root.join(relative))
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        if self.dry_run {
            let moved = self.lookup(from)?;
            self.overlay.insert(from.to_path_buf(), None);
            self.overlay.insert(
                to.to_path_buf(),
                moved.map(|p| Presence { fresh: true, ..p }),
            );
            return Ok(());
        }
        let source = self.root.join(from);
        let target = self.root.join(to);
        fs::rename(&source, &target).map_err(fs_error("rename", &source))
    }

    fn record(&mut self, relative: &Path, presence: Presence) {
        if self.dry_run {
            self.overlay.insert(relative.to_path_buf(), Some(presence));
        }
    }
}

fn disk_presence(path: &Path) -> Result<Option<Presence>> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(Some(Presence {
            kind: EntryKind::from_file_type(metadata.file_type()),
            identity: Some((metadata.dev(), metadata.ino())),
            fresh: false,
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.raw_os_error() == Some(libc::ENOTDIR) => Ok(None),
        Err(e) => Err(Error::Filesystem {
            operation: "inspect".to_string(),
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Remove a file, symlink or whole directory tree. Missing paths are fine.
pub(crate) fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(fs_error("inspect", path)(e)),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(fs_error("remove", path)(e)),
        _ => Ok(()),
    }
}

/// Create `path` and any missing parents with the configured mode.
pub(crate) fn create_dirs(path: &Path, mode: u32) -> Result<()> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(fs_error("create directory", path))
}

/// Merge one collected source layer into the target view.
pub(crate) fn apply(entries: &[Entry], view: &mut TargetView<'_>, options: &MergeOptions) -> Result<()> {
    for entry in entries {
        if options.real_of(&entry.relative).is_some() {
            apply_tombstone(entry, view, options)?;
        } else {
            apply_real(entry, view, options)?;
        }
    }
    Ok(())
}

fn apply_real(entry: &Entry, view: &mut TargetView<'_>, options: &MergeOptions) -> Result<()> {
    let relative = &entry.relative;
    let tombstone = options.tombstone_of(relative);
    let existing = view.lookup(relative)?;
    let existing_tombstone = view.lookup(&tombstone)?;

    if entry.kind == EntryKind::Dir {
        let dir_conflict = existing_tombstone.is_some()
            || existing.map(|p| p.kind != EntryKind::Dir).unwrap_or(false);
        if dir_conflict {
            let conflicting = if existing_tombstone.is_some() {
                &tombstone
            } else {
                relative
            };
            blocked(entry, view, conflicting, options)?;

            match existing_tombstone {
                Some(p) if p.kind == EntryKind::Dir => {
                    // Opaque folder: its contents become the base of the new folder
                    view.remove(relative)?;
                    view.rename(&tombstone, relative)?;
                }
                Some(_) => view.remove(&tombstone)?,
                None => {}
            }
            if existing.map(|p| p.kind != EntryKind::Dir).unwrap_or(false) {
                view.remove(relative)?;
            }
        }
        return place_dir(entry, view, options);
    }

    if let Some(existing) = existing {
        if same_identity(entry, existing) && existing_tombstone.is_none() {
            trace!("'{}' is already in place", relative.display());
            return Ok(());
        }
    }

    if existing.is_some() || existing_tombstone.is_some() {
        let conflicting = if existing_tombstone.is_some() {
            &tombstone
        } else {
            relative
        };
        blocked(entry, view, conflicting, options)?;
        view.remove(&tombstone)?;
        view.remove(relative)?;
    }
    place_file(entry, view, options)
}

fn apply_tombstone(entry: &Entry, view: &mut TargetView<'_>, options: &MergeOptions) -> Result<()> {
    let relative = &entry.relative;
    let Some(real) = options.real_of(relative) else {
        return Err(Error::InvariantViolation {
            message: format!("'{}' is not marked as deleted", relative.display()),
        });
    };

    if view.lookup(&real)?.is_some() {
        blocked(entry, view, &real, options)?;
        view.remove(&real)?;
    }

    match view.lookup(relative)? {
        Some(existing) if existing.kind == entry.kind => {
            if entry.kind == EntryKind::Dir {
                return place_dir(entry, view, options);
            }
            trace!("'{}' is already marked as deleted", real.display());
            Ok(())
        }
        Some(_) => {
            blocked(entry, view, relative, options)?;
            view.remove(relative)?;
            place(entry, view, options)
        }
        None => place(entry, view, options),
    }
}

fn blocked(entry: &Entry, view: &TargetView<'_>, conflicting: &Path, options: &MergeOptions) -> Result<()> {
    if options.block_overwrite {
        return Err(Error::OverwriteBlocked {
            source_path: entry.source.clone(),
            conflicting_path: view.root().join(conflicting),
        });
    }
    debug!(
        "Overwriting '{}' with '{}'",
        view.root().join(conflicting).display(),
        entry.source.display()
    );
    Ok(())
}

fn same_identity(entry: &Entry, existing: Presence) -> bool {
    let Some(identity) = existing.identity else {
        return false;
    };
    fs::symlink_metadata(&entry.source)
        .map(|m| (m.dev(), m.ino()) == identity)
        .unwrap_or(false)
}

fn place(entry: &Entry, view: &mut TargetView<'_>, options: &MergeOptions) -> Result<()> {
    if entry.kind == EntryKind::Dir {
        place_dir(entry, view, options)
    } else {
        place_file(entry, view, options)
    }
}

fn place_dir(entry: &Entry, view: &mut TargetView<'_>, options: &MergeOptions) -> Result<()> {
    let existing = view.lookup(&entry.relative)?;
    if view.dry_run {
        if existing.is_none() {
            view.record(
                &entry.relative,
                Presence {
                    kind: EntryKind::Dir,
                    identity: None,
                    fresh: true,
                },
            );
        }
        return Ok(());
    }
    if existing.is_none() {
        create_dirs(&view.root.join(&entry.relative), options.folder_permission)?;
    }
    Ok(())
}

fn place_file(entry: &Entry, view: &mut TargetView<'_>, options: &MergeOptions) -> Result<()> {
    if view.dry_run {
        let identity = fs::symlink_metadata(&entry.source)
            .ok()
            .map(|m| (m.dev(), m.ino()));
        view.record(
            &entry.relative,
            Presence {
                kind: entry.kind,
                identity,
                fresh: false,
            },
        );
        return Ok(());
    }

    let target = view.root.join(&entry.relative);
    if let Some(parent) = target.parent() {
        create_dirs(parent, options.folder_permission)?;
    }
    if options.copy_mode {
        link_or_copy(&entry.source, &target, entry.kind)
    } else {
        move_file(&entry.source, &target, entry.kind)
    }
}

fn link_or_copy(source: &Path, target: &Path, kind: EntryKind) -> Result<()> {
    match fs::hard_link(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) || e.raw_os_error() == Some(libc::EPERM) => {
            trace!("Cannot link '{}', copying instead", source.display());
            copy_entry(source, target, kind)
        }
        Err(e) => Err(fs_error("link", source)(e)),
    }
}

fn move_file(source: &Path, target: &Path, kind: EntryKind) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            trace!("'{}' is on another device, copying instead", source.display());
            copy_entry(source, target, kind)?;
            fs::remove_file(source).map_err(fs_error("remove", source))
        }
        Err(e) => Err(fs_error("move", source)(e)),
    }
}

fn copy_entry(source: &Path, target: &Path, kind: EntryKind) -> Result<()> {
    if kind == EntryKind::Symlink {
        let link = fs::read_link(source).map_err(fs_error("read link", source))?;
        return std::os::unix::fs::symlink(&link, target).map_err(fs_error("create symlink", target));
    }
    fs::copy(source, target)
        .map(|_| ())
        .map_err(fs_error("copy", source))
}
