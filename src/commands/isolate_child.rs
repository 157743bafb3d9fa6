//! # Sandbox Child
//!
//! Entry point of the process `isorun` re-executes itself as inside the new
//! user and mount namespaces. The isolation context arrives as JSON on a
//! pipe at a fixed descriptor; the child sets up logging at the level the
//! parent passed, builds the sandbox, runs the commands and tears the
//! sandbox down again.

use anyhow::Result;

use isorun::isolation;
use isorun::suggestions;

use crate::cli::init_logging;

/// Execute the hidden `isolate-child` command.
pub fn execute() -> Result<()> {
    let context = isolation::read_context().map_err(suggestions::for_error)?;
    init_logging(&context.log_level);
    isolation::run_child(&context).map_err(suggestions::for_error)
}
