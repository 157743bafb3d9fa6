//! Phase 2: Step post-processing
//!
//! After its group finished executing, every step reconciles its change-sets
//! in a fixed order:
//!
//! 1.  **Stage**: the raw capture is linked into the staging location with
//!     the meta folder flattened and the step's path filter applied. Overlay
//!     whiteouts in the staged copy become deletion markers. The capture
//!     itself stays raw, since later steps mount it as a layer.
//!
//! 2.  **Inherit**: the changes dependencies published into this step's
//!     inbox move into its final location. Collisions are errors.
//!
//! 3.  **Own changes**: staged changes move into the final location on top
//!     of the inherited ones and win every collision.
//!
//! 4.  **Publish**: the final changes are linked into every dependent's
//!     inbox; the last dependent receives them by move. A final step keeps
//!     them for pipeline post-processing.
//!
//! 5.  **Cleanup**: the step's operation, inbox and staging locations go.

use log::debug;

use super::cleanup;
use crate::defaults;
use crate::error::{Error, Result};
use crate::isolation::convert_whiteouts;
use crate::merge::{merge_folders, MergeEntity, MergeOptions};
use crate::pipeline::{Pipeline, StepId};

/// Post-process one step, see the module documentation for the order.
pub fn execute(pipeline: &Pipeline, id: StepId) -> Result<()> {
    let step = pipeline.step(id);
    let locations = step.locations();
    let wrap = |stage: &str| {
        let step = step.id().to_string();
        let stage = stage.to_string();
        move |inner: Error| Error::Step {
            step,
            stage,
            inner: Box::new(inner),
        }
    };

    debug!("Staging changes of '{}'", step.id());
    merge_folders(
        &[MergeEntity::with_filter(
            &locations.change_capture,
            step.filter().clone(),
        )],
        &locations.staging,
        &MergeOptions {
            copy_mode: true,
            merge_meta_files_folder: true,
            ..Default::default()
        },
    )
    .map_err(wrap("staging"))?;
    let whiteouts =
        convert_whiteouts(&locations.staging, defaults::DELETED_MARKER).map_err(wrap("staging"))?;
    if whiteouts > 0 {
        debug!("Converted {} whiteout(s) of '{}'", whiteouts, step.id());
    }

    merge_folders(
        &[MergeEntity::with_filter(
            &locations.previous_changes,
            step.filter().clone(),
        )],
        &locations.final_changes,
        &MergeOptions {
            block_overwrite: true,
            ..Default::default()
        },
    )
    .map_err(wrap("merging inherited changes"))?;

    merge_folders(
        &[MergeEntity::new(&locations.staging)],
        &locations.final_changes,
        &MergeOptions::default(),
    )
    .map_err(wrap("merging own changes"))?;

    publish(pipeline, id).map_err(wrap("publishing"))?;
    cleanup::cleanup_step(step).map_err(wrap("cleanup"))
}

/// Hand the step's final changes to each dependent's inbox.
///
/// Every dependent is attempted and all failures are returned together.
pub fn publish(pipeline: &Pipeline, id: StepId) -> Result<()> {
    let step = pipeline.step(id);
    let dependents = step.dependents();
    let mut errors = Vec::new();

    for (index, &dependent) in dependents.iter().enumerate() {
        let inbox = &pipeline.step(dependent).locations().previous_changes;
        let options = MergeOptions {
            block_overwrite: true,
            copy_mode: index + 1 < dependents.len(),
            ..Default::default()
        };
        debug!(
            "Publishing '{}' to '{}' ({})",
            step.id(),
            pipeline.step(dependent).id(),
            if options.copy_mode { "link" } else { "move" }
        );
        if let Err(e) = merge_folders(
            &[MergeEntity::new(&step.locations().final_changes)],
            inbox,
            &options,
        ) {
            errors.push(e);
        }
    }

    Error::collect(errors)
}
