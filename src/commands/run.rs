//! # Run Command Implementation
//!
//! This module implements the `run` subcommand: it loads a plan, executes
//! every work item in its own sandbox and reconciles the captured changes.
//!
//! The real root is left untouched unless `--apply` is given; otherwise the
//! reconciled changes stay in the change root for inspection or a later
//! `isorun apply`.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;

use isorun::isolation::StrategyKind;
use isorun::output::{emoji, paint, OutputConfig, Tone};
use isorun::phases::{self, IsolatedRunner};
use isorun::suggestions;

use super::{load_plan, print_changes};

/// Execute a plan in isolated sandboxes
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the plan file (YAML, or JSON by extension)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "ISORUN_PLAN",
        default_value = "isorun.yaml"
    )]
    pub plan: PathBuf,

    /// Filesystem root the work items refactor
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Root for per-step scratch directories and mount points
    #[arg(long, value_name = "DIR", env = "ISORUN_OPERATION_ROOT")]
    pub operation_root: Option<PathBuf>,

    /// Root for captured change-sets and the final output
    #[arg(long, value_name = "DIR", env = "ISORUN_CHANGE_ROOT")]
    pub change_root: Option<PathBuf>,

    /// Mount backend used for the sandboxes (overlay or union)
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<StrategyKind>,

    /// Run the steps of an execution group concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Keep the host network visible inside the sandboxes
    #[arg(long)]
    pub share_network: bool,

    /// Apply the reconciled changes to the root when the run succeeds
    #[arg(long)]
    pub apply: bool,
}

/// Execute the `run` command.
pub fn execute(args: RunArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let start_time = Instant::now();

    let mut plan = load_plan(&args.plan)?;
    let settings = &mut plan.settings;
    if let Some(root) = args.root {
        settings.root = root;
    }
    if let Some(operation_root) = args.operation_root {
        settings.operation_root = operation_root;
    }
    if let Some(change_root) = args.change_root {
        settings.change_capture_root = change_root;
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    settings.parallel |= args.parallel;
    if args.share_network {
        settings.isolate_network = false;
    }

    println!(
        "{} Running {} work item(s) with the {} strategy",
        emoji(&out, "🚀", "[RUN]"),
        plan.items.len(),
        plan.settings.strategy
    );

    let report = phases::execute_pipeline(&plan, &IsolatedRunner).map_err(suggestions::for_error)?;

    println!(
        "{} {} finished in {:.2?}",
        emoji(&out, "✅", "[OK]"),
        paint(&out, &report.pipeline_id, Tone::Heading),
        start_time.elapsed()
    );
    println!(
        "   {} changed, {} deleted in {}",
        report.changes.changed.len(),
        report.changes.deleted.len(),
        report.final_changes.display()
    );
    print_changes(&out, &report.changes);

    if args.apply {
        println!(
            "\n{} Applying changes to {}",
            emoji(&out, "📝", "[APPLY]"),
            plan.settings.root.display()
        );
        phases::apply::execute(
            &report.final_changes,
            &plan.settings.root,
            &phases::apply::default_options(),
        )
        .map_err(suggestions::for_error)?;
        println!("{} Changes applied", emoji(&out, "✅", "[OK]"));
    }
    Ok(())
}
