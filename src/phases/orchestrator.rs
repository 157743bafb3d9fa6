//! Orchestrator for a complete run
//!
//! This module coordinates all phases to provide a clean API for running a
//! plan end to end.

use std::path::PathBuf;

use log::info;

use super::{cleanup, execute, pipeline_post, step_post, StepRunner};
use crate::config::RunPlan;
use crate::defaults;
use crate::error::{Error, Result};
use crate::filesystem::ChangeSet;
use crate::pipeline::Pipeline;

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline_id: String,
    /// Number of steps that were executed.
    pub steps: usize,
    /// Where the reconciled changes of the run were left.
    pub final_changes: PathBuf,
    pub changes: ChangeSet,
}

/// Execute the complete run
///
/// This orchestrates the whole pipeline:
/// 1. Level the work items and lay out the pipeline
/// 2. For each execution group, run its steps, then post-process them
/// 3. Merge the outputs of the final steps
/// 4. Remove every temporary location, whether or not the run succeeded
///
/// The real root is never written; see [`super::apply`] for that.
pub fn execute_pipeline(plan: &RunPlan, runner: &dyn StepRunner) -> Result<RunReport> {
    let pipeline = Pipeline::build(&plan.items, &plan.settings)?;
    info!(
        "Starting pipeline {} with {} step(s) in {} group(s)",
        pipeline.id(),
        plan.items.len(),
        pipeline.groups().len()
    );

    let outcome = run_groups(&pipeline, plan, runner).and_then(|()| pipeline_post::execute(&pipeline));
    let cleanup_errors = match cleanup::cleanup_pipeline(&pipeline) {
        Ok(()) => Vec::new(),
        Err(Error::Cleanup {
            original: None,
            errors,
        }) => errors,
        Err(e) => vec![e],
    };

    let (final_changes, original) = match outcome {
        Ok(path) => (Some(path), None),
        Err(e) => (None, Some(e)),
    };
    Error::combine(original, cleanup_errors)?;
    let final_changes = final_changes.ok_or_else(|| Error::InvariantViolation {
        message: "pipeline finished without an output location".to_string(),
    })?;

    let changes = ChangeSet::scan(&final_changes, defaults::DELETED_MARKER)?;
    info!(
        "Pipeline {} finished: {} changed, {} deleted",
        pipeline.id(),
        changes.changed.len(),
        changes.deleted.len()
    );
    Ok(RunReport {
        pipeline_id: pipeline.id().to_string(),
        steps: plan.items.len(),
        final_changes,
        changes,
    })
}

fn run_groups(pipeline: &Pipeline, plan: &RunPlan, runner: &dyn StepRunner) -> Result<()> {
    for group in pipeline.groups() {
        execute::execute(pipeline, group, &plan.settings, runner)?;
        for &id in group.steps() {
            step_post::execute(pipeline, id)?;
        }
    }
    Ok(())
}
