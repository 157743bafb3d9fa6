//! Default values for isorun configuration.
//!
//! This module provides centralized default values used across the library
//! and the commands, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Name of the hidden meta directory a union mount keeps its bookkeeping in.
pub const META_FILES_LOCATION: &str = ".unionfs-fuse";

/// Suffix marking a path as deleted inside a change-set.
pub const DELETED_MARKER: &str = "_HIDDEN~";

/// Mode used for every directory the merge engine creates.
pub const FOLDER_PERMISSION: u32 = 0o755;

/// Mount helper paths.
pub const MERGERFS_BINARY: &str = "/usr/bin/mergerfs";
pub const UNIONFS_BINARY: &str = "/usr/bin/unionfs-fuse";
pub const FUSERMOUNT_BINARY: &str = "fusermount";

/// Shell used to run work item commands inside the sandbox.
pub const SHELL: &str = "/bin/sh";

/// PATH handed to commands inside the sandbox.
pub const SANDBOX_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Returns the default root for per-step scratch directories.
///
/// This can be overridden by the `--operation-root` CLI flag or the
/// `ISORUN_OPERATION_ROOT` environment variable.
pub fn default_operation_root() -> PathBuf {
    std::env::temp_dir().join("isorun")
}

/// Returns the default root for captured change-sets.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/isorun/changes` (XDG Base Directory)
/// - macOS: `~/Library/Caches/isorun/changes`
///
/// Falls back to `.isorun-changes` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--change-root` CLI flag or the
/// `ISORUN_CHANGE_ROOT` environment variable.
pub fn default_change_capture_root() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("isorun").join("changes"))
        .unwrap_or_else(|| PathBuf::from(".isorun-changes"))
}

/// Returns the default filesystem root the sandbox exposes to commands.
pub fn default_root() -> PathBuf {
    PathBuf::from("/")
}
