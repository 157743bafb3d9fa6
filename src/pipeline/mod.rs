//! In-memory pipeline model
//!
//! A [`Pipeline`] is built once per invocation from leveled work items. It
//! owns ordered [`ExecutionGroup`]s of [`Step`]s and derives every on-disk
//! location a step uses from its own roots, namespaced by group and step, so
//! no two steps ever share a path.
//!
//! ## Layout
//!
//! ```text
//! <operation root>/<pipeline id>/<group>/<step>/          scratch and mount points
//! <change root>/<pipeline id>/tmp/<group>/<step>/capture  raw sandbox output
//!                                               /staging  flattened own changes
//!                                               /previous inbox from dependencies
//!                                               /final    outbox to dependents
//!                                               /overlay-work  kernel overlay workdir
//! <change root>/<pipeline id>/final/                      pipeline output
//! ```
//!
//! Steps live in an arena owned by the pipeline and refer to each other by
//! [`StepId`], which keeps the bidirectional dependency links plain data.

mod builder;

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::config::WorkItem;
use crate::path::PathFilter;

/// Index of a step inside its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub(crate) usize);

/// Filesystem locations owned by one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLocations {
    pub operation: PathBuf,
    pub change_capture: PathBuf,
    pub staging: PathBuf,
    pub previous_changes: PathBuf,
    pub final_changes: PathBuf,
    /// Overlay work directory, kept beside the capture on the same mount.
    pub overlay_work: PathBuf,
}

impl StepLocations {
    fn new(operation: PathBuf, step_root: PathBuf) -> Self {
        Self {
            operation,
            change_capture: step_root.join("capture"),
            staging: step_root.join("staging"),
            previous_changes: step_root.join("previous"),
            final_changes: step_root.join("final"),
            overlay_work: step_root.join("overlay-work"),
        }
    }
}

/// The execution record of one work item.
#[derive(Debug, Clone)]
pub struct Step {
    id: String,
    key: String,
    group: usize,
    item: WorkItem,
    filter: PathFilter,
    dependencies: Vec<StepId>,
    dependents: Vec<StepId>,
    locations: StepLocations,
}

impl Step {
    /// The work item id this step executes.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Filesystem-safe name used in this step's locations.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn group_index(&self) -> usize {
        self.group
    }

    pub fn work_item(&self) -> &WorkItem {
        &self.item
    }

    /// Compiled include/exclude filter of the work item.
    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn dependencies(&self) -> &[StepId] {
        &self.dependencies
    }

    pub fn dependents(&self) -> &[StepId] {
        &self.dependents
    }

    pub fn locations(&self) -> &StepLocations {
        &self.locations
    }

    /// A step nothing depends on feeds the pipeline output directly.
    pub fn is_final_step(&self) -> bool {
        self.dependents.is_empty()
    }
}

/// Steps without a dependency relation among each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionGroup {
    id: String,
    steps: Vec<StepId>,
}

impl ExecutionGroup {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn steps(&self) -> &[StepId] {
        &self.steps
    }
}

/// The root aggregate of one run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: String,
    root: PathBuf,
    operation_location: PathBuf,
    change_capture_location: PathBuf,
    groups: Vec<ExecutionGroup>,
    steps: Vec<Step>,
}

impl Pipeline {
    /// Unique id of this run, `PIPELINE-<uuid>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The filesystem root being refactored.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch root of this run.
    pub fn operation_location(&self) -> &Path {
        &self.operation_location
    }

    /// Change-capture root of this run.
    pub fn change_capture_location(&self) -> &Path {
        &self.change_capture_location
    }

    /// Area holding every step's captures and intermediate trees.
    pub fn temporary_change_capture_location(&self) -> PathBuf {
        self.change_capture_location.join("tmp")
    }

    /// Where the reconciled output of the whole run ends up.
    pub fn final_change_capture_location(&self) -> PathBuf {
        self.change_capture_location.join("final")
    }

    pub fn groups(&self) -> &[ExecutionGroup] {
        &self.groups
    }

    pub fn step(&self, id: StepId) -> &Step {
        &self.steps[id.0]
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Look a step up by its work item id.
    pub fn find_step(&self, id: &str) -> Option<StepId> {
        self.steps.iter().position(|s| s.id == id).map(StepId)
    }

    /// Steps without dependents, in execution order.
    pub fn final_steps(&self) -> Vec<StepId> {
        self.groups
            .iter()
            .flat_map(|g| g.steps.iter().copied())
            .filter(|&id| self.step(id).is_final_step())
            .collect()
    }

    /// Change captures of every transitive dependency, most recent first.
    ///
    /// Later execution groups come first, so each layer sits above the
    /// layers it was built on. Each capture appears once.
    pub fn previous_change_capture_locations(&self, id: StepId) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut queue: VecDeque<StepId> = self.step(id).dependencies.iter().copied().collect();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            found.push(next);
            queue.extend(self.step(next).dependencies.iter().copied());
        }

        // Stable sort keeps discovery order within a group
        found.sort_by(|a, b| self.step(*b).group.cmp(&self.step(*a).group));
        found
            .into_iter()
            .map(|s| self.step(s).locations.change_capture.clone())
            .collect()
    }
}
