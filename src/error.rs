//! # Error Handling
//!
//! This module defines the centralized error type for `isorun`. It uses the
//! `thiserror` library to build a single `Error` enum covering every failure
//! mode of the leveler, the merge engine, the sandbox and the orchestration
//! phases.
//!
//! ## Taxonomy
//!
//! - **`CyclicDependency`**: the work-item graph contains a cycle. Fatal and
//!   reported before anything executes.
//! - **`OverwriteBlocked`**: two change-sets touch the same path while the
//!   merge runs with overwrite blocking enabled.
//! - **`ExternalToolFailure`**: a mount helper or other external program
//!   failed. Carries the full command line and its captured output.
//! - **`Filesystem`**: an unexpected OS-level failure while managing scratch
//!   directories, mounts or merge targets, wrapped with operation and path.
//! - **`InvariantViolation`**: a programming-logic bug, never a user error.
//! - **`Cleanup`**: cleanup failures accumulated on an exit path, reported
//!   next to the error that triggered the unwind instead of masking it.
//! - **`Multiple`**: independent failures of one operation, such as
//!   publishing to several dependents, all reported together.
//!
//! `Result<T>` is an alias for `std::result::Result<T, Error>` and is used
//! throughout the library.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for isorun operations
#[derive(Error, Debug)]
pub enum Error {
    /// The dependency relation between work items contains a cycle.
    #[error("Cyclic dependency detected at work item '{item}': {cycle}")]
    CyclicDependency {
        /// A work item that lies on the cycle
        item: String,
        /// Human readable rendering of the cycle, e.g. `a -> b -> a`
        cycle: String,
    },

    /// A merge found a path collision while overwriting was blocked.
    #[error(
        "Overwrite blocked: cannot merge '{}' because '{}' already exists",
        source_path.display(),
        conflicting_path.display()
    )]
    OverwriteBlocked {
        source_path: PathBuf,
        conflicting_path: PathBuf,
    },

    /// An external program (mount helper, shell) failed.
    #[error("External tool failed: {command}{}", if output.is_empty() { String::new() } else { format!("\n  output: {}", output.trim_end()) })]
    ExternalToolFailure { command: String, output: String },

    /// An OS-level failure while touching the filesystem.
    #[error("Filesystem operation error: {operation} '{}': {source}", path.display())]
    Filesystem {
        operation: String,
        path: PathBuf,
        source: io::Error,
    },

    /// Internal state that should be impossible was observed.
    #[error("Invariant violated: {message}")]
    InvariantViolation { message: String },

    /// The resolved work-item plan could not be loaded.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the plan
        hint: Option<String>,
    },

    /// The namespace boundary or the parent/child protocol failed.
    #[error("Isolation error: {message}")]
    Isolation { message: String },

    /// A merge of one source tree into a target failed.
    #[error("Failed to merge '{}' into '{}': {inner}", source_folder.display(), target_folder.display())]
    Merge {
        source_folder: PathBuf,
        target_folder: PathBuf,
        #[source]
        inner: Box<Error>,
    },

    /// A pipeline step failed.
    #[error("Step '{step}' failed during {stage}: {inner}")]
    Step {
        step: String,
        stage: String,
        #[source]
        inner: Box<Error>,
    },

    /// Cleanup failed; the optional original error is reported alongside.
    #[error("{}", cleanup_message(original.as_deref(), errors))]
    Cleanup {
        original: Option<Box<Error>>,
        errors: Vec<Error>,
    },

    /// Several independent failures, reported together.
    #[error("{} failures:{}", errors.len(), list_errors(errors))]
    Multiple { errors: Vec<Error> },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A system call failure, wrapped from `nix::errno::Errno`.
    #[error("System call failed: {0}")]
    Nix(#[from] nix::errno::Errno),
}

impl Error {
    /// Returns true if this error, or any error it wraps, is an overwrite conflict.
    pub fn is_overwrite_blocked(&self) -> bool {
        match self {
            Error::OverwriteBlocked { .. } => true,
            Error::Merge { inner, .. } | Error::Step { inner, .. } => inner.is_overwrite_blocked(),
            Error::Cleanup { original, .. } => original
                .as_deref()
                .map(Error::is_overwrite_blocked)
                .unwrap_or(false),
            Error::Multiple { errors } => errors.iter().any(Error::is_overwrite_blocked),
            _ => false,
        }
    }

    /// Returns the innermost error that is not a context wrapper.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Merge { inner, .. } | Error::Step { inner, .. } => inner.root_cause(),
            Error::Cleanup {
                original: Some(original),
                ..
            } => original.root_cause(),
            Error::Multiple { errors } => match errors.first() {
                Some(first) => first.root_cause(),
                None => self,
            },
            other => other,
        }
    }

    /// Combines an optional original error with accumulated cleanup errors.
    ///
    /// Returns `Ok(())` when both are empty, the original error unchanged when
    /// cleanup succeeded, and an `Error::Cleanup` otherwise.
    pub fn combine(original: Option<Error>, cleanup: Vec<Error>) -> Result<()> {
        match (original, cleanup.is_empty()) {
            (None, true) => Ok(()),
            (Some(err), true) => Err(err),
            (original, false) => Err(Error::Cleanup {
                original: original.map(Box::new),
                errors: cleanup,
            }),
        }
    }

    /// Folds independent failures into one result.
    ///
    /// No errors is `Ok(())`, a single error is returned as is.
    pub fn collect(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple { errors }),
        }
    }
}

fn list_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("\n  - {}", e))
        .collect()
}

fn cleanup_message(original: Option<&Error>, errors: &[Error]) -> String {
    let details = list_errors(errors);
    match original {
        Some(original) => format!("{}\n  cleanup also failed:{}", original, details),
        None => format!("Cleanup failed:{}", details),
    }
}

/// Builds a closure that wraps an `io::Error` with the operation and path.
///
/// ```
/// use isorun::error::fs_error;
/// use std::path::Path;
///
/// let err = std::fs::read_dir("/definitely/missing")
///     .map_err(fs_error("read directory", Path::new("/definitely/missing")))
///     .unwrap_err();
/// assert!(err.to_string().contains("read directory"));
/// ```
pub fn fs_error<'a>(operation: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> Error + 'a {
    move |source| Error::Filesystem {
        operation: operation.to_string(),
        path: path.to_path_buf(),
        source,
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
