//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// isorun - Run refactoring commands in isolated sandboxes
#[derive(Parser, Debug)]
#[command(name = "isorun")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a plan and leave the reconciled changes in the change root
    Run(commands::run::RunArgs),

    /// Validate a plan and print its execution groups
    Validate(commands::validate::ValidateArgs),

    /// Merge change-set folders into a target folder
    Merge(commands::merge::MergeArgs),

    /// Apply a final change-set to a root folder
    Apply(commands::apply::ApplyArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),

    /// Sandbox child, started by isorun itself
    #[command(name = "isolate-child", hide = true)]
    IsolateChild,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // The child sets up logging from the level its parent hands over
        if !matches!(self.command, Commands::IsolateChild) {
            init_logging(&self.log_level);
        }

        match self.command {
            Commands::Run(args) => commands::run::execute(args, &self.color),
            Commands::Validate(args) => commands::validate::execute(args, &self.color),
            Commands::Merge(args) => commands::merge::execute(args, &self.color),
            Commands::Apply(args) => commands::apply::execute(args, &self.color),
            Commands::Completions(args) => commands::completions::execute(args),
            Commands::IsolateChild => commands::isolate_child::execute(),
        }
    }
}

/// Install the process-wide logger. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second initialisation in the same process is harmless
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
