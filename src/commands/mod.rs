//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `isorun`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Library errors are turned into hinted user errors with
//! [`isorun::suggestions::for_error`] at this layer.

pub mod apply;
pub mod completions;
pub mod isolate_child;
pub mod merge;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::Result;
use isorun::config::{self, RunPlan};
use isorun::filesystem::ChangeSet;
use isorun::output::{paint, OutputConfig, Tone};
use isorun::suggestions;

/// Load and validate a plan file, with hints for the common mistakes.
pub fn load_plan(path: &Path) -> Result<RunPlan> {
    if !path.exists() {
        return Err(suggestions::plan_not_found(path));
    }
    config::from_file(path).map_err(suggestions::for_error)
}

/// Print the paths of a change-set, one per line.
pub fn print_changes(out: &OutputConfig, changes: &ChangeSet) {
    for path in &changes.changed {
        println!("   {}", paint(out, &format!("+ {}", path.display()), Tone::Added));
    }
    for path in &changes.deleted {
        println!("   {}", paint(out, &format!("- {}", path.display()), Tone::Deleted));
    }
}
