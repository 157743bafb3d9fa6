//! Merge policy and merge entities

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::Result;
use crate::path::{PathFilter, WildcardPath};

/// Policy for one merge call.
///
/// Passed by reference into the engine, which never mutates it; callers that
/// need a variant clone it first (see [`super::are_mergeable`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Perform every check but touch nothing on disk.
    pub dry_run: bool,
    /// Treat any path collision as a hard error.
    pub block_overwrite: bool,
    /// Relocate the entries of the meta folder onto their real paths.
    pub merge_meta_files_folder: bool,
    /// Prune empty directories from the target afterwards.
    pub delete_empty_folders: bool,
    /// Make recorded deletions permanent in the target afterwards.
    pub delete_marked_as_deleted_paths: bool,
    /// Link or copy instead of moving, leaving sources intact.
    pub copy_mode: bool,
    pub meta_files_location: String,
    pub deleted_marker: String,
    pub folder_permission: u32,
    pub inclusions: Vec<WildcardPath>,
    pub exclusions: Vec<WildcardPath>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            block_overwrite: false,
            merge_meta_files_folder: false,
            delete_empty_folders: false,
            delete_marked_as_deleted_paths: false,
            copy_mode: false,
            meta_files_location: defaults::META_FILES_LOCATION.to_string(),
            deleted_marker: defaults::DELETED_MARKER.to_string(),
            folder_permission: defaults::FOLDER_PERMISSION,
            inclusions: Vec::new(),
            exclusions: Vec::new(),
        }
    }
}

impl MergeOptions {
    /// Filter made of the option-level inclusions and exclusions plus the
    /// entity's own ones.
    pub(crate) fn filter_for(&self, entity: &MergeEntity) -> PathFilter {
        let mut filter = PathFilter {
            inclusions: self.inclusions.clone(),
            exclusions: self.exclusions.clone(),
        };
        filter
            .inclusions
            .extend(entity.filter.inclusions.iter().cloned());
        filter
            .exclusions
            .extend(entity.filter.exclusions.iter().cloned());
        filter
    }

    /// True if `name` carries the deletion marker.
    pub fn is_marked_as_deleted(&self, name: &str) -> bool {
        !self.deleted_marker.is_empty() && name.ends_with(&self.deleted_marker)
    }

    /// Append the deletion marker to a relative path.
    pub(crate) fn tombstone_of(&self, relative: &Path) -> PathBuf {
        let mut raw = relative.as_os_str().to_os_string();
        raw.push(&self.deleted_marker);
        PathBuf::from(raw)
    }

    /// Strip the deletion marker from a relative path, if present.
    pub(crate) fn real_of(&self, relative: &Path) -> Option<PathBuf> {
        let raw = relative.to_str()?;
        if self.deleted_marker.is_empty() {
            return None;
        }
        raw.strip_suffix(self.deleted_marker.as_str())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }
}

/// A source tree together with the filter restricting what it contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEntity {
    pub source: PathBuf,
    pub filter: PathFilter,
}

impl MergeEntity {
    /// An entity that contributes everything under `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            filter: PathFilter::default(),
        }
    }

    /// An entity restricted to the given include/exclude patterns.
    pub fn with_patterns<I, E>(source: impl Into<PathBuf>, include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Ok(Self {
            source: source.into(),
            filter: PathFilter::from_patterns(include, exclude)?,
        })
    }

    /// An entity using an already compiled filter.
    pub fn with_filter(source: impl Into<PathBuf>, filter: PathFilter) -> Self {
        Self {
            source: source.into(),
            filter,
        }
    }
}
