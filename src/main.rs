//! # isorun CLI
//!
//! This is the binary entry point for the `isorun` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Owning the logger: it is installed here, never by the library.
//! - Executing the appropriate command, including the hidden sandbox child
//!   the tool re-executes itself as.
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
