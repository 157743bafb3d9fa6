//! # Apply Command Implementation
//!
//! Applies a final change-set (usually the `final` folder a `run` leaves in
//! the change root) to a root folder: changed paths overwrite the root and
//! recorded deletions are carried out.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use isorun::output::{emoji, OutputConfig};
use isorun::phases::apply;
use isorun::suggestions;

use super::print_changes;

/// Apply a final change-set to a root folder
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Folder holding the change-set to apply
    #[arg(value_name = "CHANGES")]
    pub changes: PathBuf,

    /// Root folder the changes are applied to
    #[arg(short, long, value_name = "DIR")]
    pub root: PathBuf,

    /// Show what would change without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Keep the change-set folder intact instead of moving its contents
    #[arg(long)]
    pub copy: bool,
}

/// Execute the `apply` command.
pub fn execute(args: ApplyArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    if !args.changes.is_dir() {
        anyhow::bail!(
            "Change-set folder not found: {}\n\nhint: Pass the 'final' folder a run left in its change root",
            args.changes.display()
        );
    }

    let mut options = apply::default_options();
    options.dry_run = args.dry_run;
    options.copy_mode = args.copy;

    let changes =
        apply::execute(&args.changes, &args.root, &options).map_err(suggestions::for_error)?;

    let verb = if args.dry_run { "Would apply" } else { "Applied" };
    println!(
        "{} {} {} change(s) and {} deletion(s) to {}",
        emoji(&out, "📝", "[APPLY]"),
        verb,
        changes.changed.len(),
        changes.deleted.len(),
        args.root.display()
    );
    print_changes(&out, &changes);
    Ok(())
}
