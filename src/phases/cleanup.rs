//! Phase 4: Cleanup
//!
//! Removal of scratch locations. Failures are collected so that one stuck
//! directory does not keep the others around.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::merge::remove_path;
use crate::pipeline::{Pipeline, Step};

/// Remove a step's operation, inbox, staging and overlay work locations.
///
/// The change capture stays: dependents still mount it as a layer.
pub fn cleanup_step(step: &Step) -> Result<()> {
    let locations = step.locations();
    remove_all(&[
        &locations.operation,
        &locations.previous_changes,
        &locations.staging,
        &locations.overlay_work,
    ])
}

/// Remove the temporary change-capture area and the operation location.
///
/// Only the final change-capture location of the pipeline survives.
pub fn cleanup_pipeline(pipeline: &Pipeline) -> Result<()> {
    debug!("Cleaning up pipeline {}", pipeline.id());
    remove_all(&[
        &pipeline.temporary_change_capture_location(),
        pipeline.operation_location(),
    ])
}

fn remove_all(paths: &[&Path]) -> Result<()> {
    let errors: Vec<Error> = paths
        .iter()
        .filter_map(|path| remove_path(path).err())
        .collect();
    Error::combine(None, errors)
}
