//! # Merge Command Implementation
//!
//! Exposes the change-set merge engine directly: merge one or more source
//! folders into a target folder under the chosen policy. With `--dry-run`
//! nothing is written and the command only reports whether the merge would
//! succeed without overwrite conflicts; a conflicting merge exits non-zero.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use isorun::defaults;
use isorun::merge::{are_mergeable, merge_folders, MergeEntity, MergeOptions};
use isorun::output::{emoji, OutputConfig};
use isorun::path::PathFilter;
use isorun::suggestions;

/// Merge change-set folders into a target folder
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Source folders, merged in order
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Folder to merge into (created if missing)
    #[arg(short, long, value_name = "DIR")]
    pub target: PathBuf,

    /// Check for conflicts without touching the disk
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Fail on any path collision instead of overwriting
    #[arg(long)]
    pub block_overwrite: bool,

    /// Leave the sources in place (hard-link or copy instead of moving)
    #[arg(long)]
    pub copy: bool,

    /// Relocate the meta folder's deletion markers onto their real paths
    #[arg(long)]
    pub merge_meta: bool,

    /// Prune empty folders from the target afterwards
    #[arg(long)]
    pub delete_empty_folders: bool,

    /// Make recorded deletions permanent in the target afterwards
    #[arg(long)]
    pub delete_marked: bool,

    /// Only merge paths matching this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Skip paths matching this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Suffix marking a path as deleted
    #[arg(long, value_name = "SUFFIX", default_value = defaults::DELETED_MARKER)]
    pub marker: String,

    /// Name of the meta folder holding union-mount deletion markers
    #[arg(long, value_name = "NAME", default_value = defaults::META_FILES_LOCATION)]
    pub meta_folder: String,
}

impl MergeArgs {
    fn options(&self) -> Result<MergeOptions> {
        let filter =
            PathFilter::from_patterns(&self.include, &self.exclude).map_err(suggestions::for_error)?;
        Ok(MergeOptions {
            dry_run: self.dry_run,
            block_overwrite: self.block_overwrite,
            merge_meta_files_folder: self.merge_meta,
            delete_empty_folders: self.delete_empty_folders,
            delete_marked_as_deleted_paths: self.delete_marked,
            copy_mode: self.copy,
            meta_files_location: self.meta_folder.clone(),
            deleted_marker: self.marker.clone(),
            inclusions: filter.inclusions,
            exclusions: filter.exclusions,
            ..MergeOptions::default()
        })
    }
}

/// Execute the `merge` command.
pub fn execute(args: MergeArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let options = args.options()?;
    let entities: Vec<MergeEntity> = args.sources.iter().map(MergeEntity::new).collect();

    if args.dry_run {
        let mergeable =
            are_mergeable(&entities, &args.target, &options).map_err(suggestions::for_error)?;
        if !mergeable {
            println!(
                "{} {} source(s) conflict with each other or with {}",
                emoji(&out, "❌", "[CONFLICT]"),
                entities.len(),
                args.target.display()
            );
            anyhow::bail!("Merge into '{}' would be blocked", args.target.display());
        }
        println!(
            "{} {} source(s) can be merged into {}",
            emoji(&out, "✅", "[OK]"),
            entities.len(),
            args.target.display()
        );
        return Ok(());
    }

    merge_folders(&entities, &args.target, &options).map_err(suggestions::for_error)?;
    println!(
        "{} Merged {} source(s) into {}",
        emoji(&out, "✅", "[OK]"),
        entities.len(),
        args.target.display()
    );
    Ok(())
}
