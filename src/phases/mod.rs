//! Implementation of the phases of an isolated run.
//!
//! ## Overview
//!
//! A run walks the pipeline's execution groups in order:
//! 1. Execution - run every step of the group in its own sandbox
//! 2. Step post-processing - flatten each step's capture, merge in what its
//!    dependencies handed over, and publish the result to its dependents
//! 3. Pipeline post-processing - merge the outputs of the final steps into
//!    the pipeline's final change-capture location
//! 4. Cleanup - remove scratch and temporary locations, on every exit path
//!
//! Applying the final changes to the real root is a separate, explicit
//! phase ([`apply`]).
//!
//! Step post-processing of a group only starts after every step of that
//! group finished executing, so a dependent's inbox is complete before it is
//! read.

use crate::error::Result;
use crate::isolation::{self, IsolationContext};

pub mod apply;
pub mod cleanup;
pub mod execute;
pub mod orchestrator;
pub mod pipeline_post;
pub mod step_post;

pub use orchestrator::{execute_pipeline, RunReport};

/// Runs one step's commands against its isolation context.
///
/// The sandbox is the only production implementation; tests substitute
/// runners that write straight into the change-capture folder.
pub trait StepRunner: Send + Sync {
    fn run(&self, context: &IsolationContext) -> Result<()>;
}

/// Runs each step in a namespace sandbox.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsolatedRunner;

impl StepRunner for IsolatedRunner {
    fn run(&self, context: &IsolationContext) -> Result<()> {
        isolation::run_isolated(context)
    }
}
