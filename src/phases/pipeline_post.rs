//! Phase 3: Pipeline post-processing
//!
//! The final changes of every step without dependents are merged into the
//! pipeline's final change-capture location. Two final steps touching the
//! same path is a conflict: neither was built on the other, so there is no
//! order in which one could win.

use std::path::PathBuf;

use log::info;

use crate::error::Result;
use crate::merge::{merge_folders, MergeEntity, MergeOptions};
use crate::pipeline::Pipeline;

/// Merge the final steps' outputs and return where they ended up.
pub fn execute(pipeline: &Pipeline) -> Result<PathBuf> {
    let target = pipeline.final_change_capture_location();
    let entities: Vec<MergeEntity> = pipeline
        .final_steps()
        .into_iter()
        .map(|id| MergeEntity::new(&pipeline.step(id).locations().final_changes))
        .collect();

    info!(
        "Merging {} final step output(s) into '{}'",
        entities.len(),
        target.display()
    );
    merge_folders(
        &entities,
        &target,
        &MergeOptions {
            block_overwrite: true,
            merge_meta_files_folder: true,
            ..Default::default()
        },
    )?;
    Ok(target)
}
