//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand. It checks a plan without
//! running anything:
//!
//! - **Plan validation**: ids are unique and non-empty, every item has a
//!   command and every include/exclude pattern parses.
//! - **Dependency check**: dependencies on unknown ids are reported (they are
//!   ignored at run time), and cycles fail validation.
//! - **Execution groups**: the levels a `run` would execute are printed.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use isorun::ordering;
use isorun::output::{emoji, paint, OutputConfig, Tone};
use isorun::suggestions;

use super::load_plan;

/// Validate a plan and print its execution groups
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the plan file to validate
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "ISORUN_PLAN",
        default_value = "isorun.yaml"
    )]
    pub plan: PathBuf,

    /// Fail when a dependency names an unknown work item
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Validating plan: {}",
        emoji(&out, "🔍", "[SCAN]"),
        args.plan.display()
    );

    let plan = load_plan(&args.plan)?;
    println!(
        "{} Plan parsed successfully ({} work item(s))",
        emoji(&out, "✅", "[OK]"),
        plan.items.len()
    );

    let known: Vec<&str> = plan.items.iter().map(|item| item.id.as_str()).collect();
    let mut unknown = 0;
    for item in &plan.items {
        for dependency in &item.dependencies {
            if !known.contains(&dependency.as_str()) {
                unknown += 1;
                println!(
                    "{} {}",
                    emoji(&out, "⚠️", "[WARN]"),
                    suggestions::unknown_dependency(&item.id, dependency, &known)
                );
            }
        }
    }

    if let Some(cycle) = ordering::find_cycle(&plan.items).map_err(suggestions::for_error)? {
        let first = cycle.first().cloned().unwrap_or_default();
        println!("{} Dependency cycle found", emoji(&out, "❌", "[ERR]"));
        return Err(suggestions::cycle_detected(&first, &cycle.join(" -> ")));
    }

    let order = ordering::build_execution_order(&plan.items).map_err(suggestions::for_error)?;
    println!("\n{}", paint(&out, "Execution groups:", Tone::Heading));
    for (level, group) in order.iter().enumerate() {
        let ids: Vec<&str> = group.iter().map(|item| item.id.as_str()).collect();
        println!("   {}: {}", level, ids.join(", "));
    }

    if args.strict && unknown > 0 {
        anyhow::bail!("{unknown} unknown dependency reference(s) with --strict");
    }

    println!("\n{} Plan is valid", emoji(&out, "✅", "[OK]"));
    Ok(())
}
